//! Parser for the Python literal subset produced by [`Value::py_repr`].
//!
//! Accepts `None`, `True`, `False`, integers, floats (including `float('inf')` and
//! `float('nan')`), single- or double-quoted strings with backslash escapes, lists,
//! tuples and dicts.

use std::fmt;

use crate::value::{DictPairs, Value};

/// A literal that failed to parse, with the byte offset of the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralError {
    pub position: usize,
    pub message: String,
}

impl LiteralError {
    fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

impl fmt::Display for LiteralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid literal at offset {}: {}", self.position, self.message)
    }
}

impl std::error::Error for LiteralError {}

/// Parses one Python literal; trailing input other than whitespace is an error.
pub fn parse_literal(source: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser { source, pos: 0 };
    let value = parser.value()?;
    parser.skip_whitespace();
    if parser.pos < source.len() {
        return Err(LiteralError::new(parser.pos, "unexpected trailing input"));
    }
    Ok(value)
}

struct Parser<'a> {
    source: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn rest(&self) -> &str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<(), LiteralError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(LiteralError::new(self.pos, format!("expected '{token}'")))
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(LiteralError::new(self.pos, "unexpected end of input")),
            Some('[') => {
                self.pos += 1;
                Ok(Value::List(self.items(']')?.0))
            }
            Some('(') => {
                self.pos += 1;
                let (items, trailing_comma) = self.items(')')?;
                if items.len() == 1 && !trailing_comma {
                    // parenthesized expression, not a tuple
                    Ok(items.into_iter().next().unwrap_or(Value::None))
                } else {
                    Ok(Value::Tuple(items))
                }
            }
            Some('{') => {
                self.pos += 1;
                self.dict()
            }
            Some(quote @ ('\'' | '"')) => {
                self.pos += 1;
                self.string(quote).map(Value::Text)
            }
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            Some(_) => self.word(),
        }
    }

    /// Comma-separated values up to `close`; also reports whether a trailing comma was seen.
    fn items(&mut self, close: char) -> Result<(Vec<Value>, bool), LiteralError> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            self.skip_whitespace();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok((items, trailing_comma));
            }
            items.push(self.value()?);
            self.skip_whitespace();
            match self.bump() {
                Some(',') => trailing_comma = true,
                Some(c) if c == close => return Ok((items, false)),
                _ => return Err(LiteralError::new(self.pos, format!("expected ',' or '{close}'"))),
            }
        }
    }

    fn dict(&mut self) -> Result<Value, LiteralError> {
        let mut pairs = DictPairs::new();
        loop {
            self.skip_whitespace();
            if self.eat("}") {
                return Ok(Value::Dict(pairs));
            }
            let key = self.value()?;
            self.skip_whitespace();
            self.expect(":")?;
            let value = self.value()?;
            pairs.insert(key, value);
            self.skip_whitespace();
            match self.bump() {
                Some(',') => {}
                Some('}') => return Ok(Value::Dict(pairs)),
                _ => return Err(LiteralError::new(self.pos, "expected ',' or '}'")),
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<String, LiteralError> {
        let start = self.pos;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(LiteralError::new(start, "unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => {
                    let escape_at = self.pos;
                    match self.bump() {
                        Some('n') => out.push('\n'),
                        Some('r') => out.push('\r'),
                        Some('t') => out.push('\t'),
                        Some('0') => out.push('\0'),
                        Some('x') => out.push(self.code_point(2, escape_at)?),
                        Some('u') => out.push(self.code_point(4, escape_at)?),
                        Some('U') => out.push(self.code_point(8, escape_at)?),
                        Some(c @ ('\\' | '\'' | '"')) => out.push(c),
                        Some('\n') => {}
                        Some(c) => {
                            // unknown escapes are kept verbatim, as Python does
                            out.push('\\');
                            out.push(c);
                        }
                        None => return Err(LiteralError::new(start, "unterminated string")),
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn code_point(&mut self, digits: usize, escape_at: usize) -> Result<char, LiteralError> {
        let hex = self
            .rest()
            .get(..digits)
            .filter(|hex| hex.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| LiteralError::new(escape_at, format!("expected {digits} hex digits")))?;
        let code = u32::from_str_radix(hex, 16).map_err(|e| LiteralError::new(escape_at, e.to_string()))?;
        self.pos += digits;
        char::from_u32(code).ok_or_else(|| LiteralError::new(escape_at, "invalid code point"))
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        let negative = match self.peek() {
            Some('-') => {
                self.pos += 1;
                true
            }
            Some('+') => {
                self.pos += 1;
                false
            }
            _ => false,
        };
        self.skip_whitespace();
        if self.rest().starts_with("float(") {
            let value = self.value()?;
            return match value {
                Value::Float(f) if negative => Ok(Value::Float(-f)),
                Value::Float(_) => Ok(value),
                _ => Err(LiteralError::new(start, "expected a number")),
            };
        }
        let digits_start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || ((c == '-' || c == '+') && self.after_exponent()))
        {
            self.pos += 1;
        }
        let text: String = self.source[digits_start..self.pos].chars().filter(|c| *c != '_').collect();
        if text.is_empty() {
            return Err(LiteralError::new(start, "expected a number"));
        }
        let signed = if negative { format!("-{text}") } else { text.clone() };
        let is_float = text.contains(['.', 'e', 'E']) && !text.starts_with("0x");
        if is_float {
            signed
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| LiteralError::new(start, e.to_string()))
        } else {
            signed
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| LiteralError::new(start, e.to_string()))
        }
    }

    /// True if the previous character is an exponent marker of a decimal literal.
    fn after_exponent(&self) -> bool {
        self.source[..self.pos].ends_with(['e', 'E'])
    }

    fn word(&mut self) -> Result<Value, LiteralError> {
        if self.eat("None") {
            return Ok(Value::None);
        }
        if self.eat("True") {
            return Ok(Value::Bool(true));
        }
        if self.eat("False") {
            return Ok(Value::Bool(false));
        }
        if self.eat("float(") {
            self.skip_whitespace();
            let start = self.pos;
            let argument = match self.bump() {
                Some(quote @ ('\'' | '"')) => self.string(quote)?,
                _ => return Err(LiteralError::new(start, "expected a quoted float name")),
            };
            self.skip_whitespace();
            self.expect(")")?;
            let value = match argument.trim().to_ascii_lowercase().as_str() {
                "inf" | "+inf" | "infinity" => f64::INFINITY,
                "-inf" | "-infinity" => f64::NEG_INFINITY,
                "nan" | "+nan" | "-nan" => f64::NAN,
                other => other
                    .parse::<f64>()
                    .map_err(|e| LiteralError::new(start, e.to_string()))?,
            };
            return Ok(Value::Float(value));
        }
        Err(LiteralError::new(self.pos, "expected a literal"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_containers() {
        let value = parse_literal("{'a': [1, 2.5, (None,)], 'b': (True, False)}").unwrap();
        assert_eq!(value.py_repr(), "{'a': [1, 2.5, (None,)], 'b': (True, False)}");
    }

    #[test]
    fn parenthesized_value_is_not_a_tuple() {
        assert_eq!(parse_literal("(3)").unwrap(), Value::Int(3));
        assert_eq!(parse_literal("()").unwrap(), Value::Tuple(vec![]));
    }

    #[test]
    fn parses_signed_and_special_numbers() {
        assert_eq!(parse_literal("-2").unwrap(), Value::Int(-2));
        assert_eq!(parse_literal("1e3").unwrap(), Value::Float(1000.0));
        assert_eq!(parse_literal("2.5e-1").unwrap(), Value::Float(0.25));
        assert_eq!(parse_literal("float('-inf')").unwrap(), Value::Float(f64::NEG_INFINITY));
        assert_eq!(parse_literal("1_000").unwrap(), Value::Int(1000));
    }

    #[test]
    fn reports_position_of_errors() {
        let err = parse_literal("[1, 2").unwrap_err();
        assert_eq!(err.position, 5);
        let err = parse_literal("'open").unwrap_err();
        assert_eq!(err.position, 1);
        assert!(parse_literal("1 2").is_err());
    }
}
