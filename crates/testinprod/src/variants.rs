//! Argument substitutions for thorough mode.
//!
//! Both generators work on the value model directly; a variant is a new [`Value`], never
//! re-parsed source text.

use crate::value::Value;

/// Which kind of substitution produced a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum VariantKind {
    /// The argument replaced by another primitive type's zero value.
    Fuzz,
    /// The argument transformed by negation, reversal or a case change.
    Metamorphic,
}

/// Zero values of the primitive types, in emission order.
fn zero_values() -> [Value; 4] {
    [
        Value::Bool(false),
        Value::Int(0),
        Value::Float(0.0),
        Value::Text(String::new()),
    ]
}

/// Zero values of every primitive type other than the argument's own.
///
/// Only primitive arguments are fuzzed; anything else yields nothing.
#[must_use]
pub fn fuzz_values(arg: &Value) -> Vec<Value> {
    if !arg.is_primitive() {
        return Vec::new();
    }
    zero_values()
        .into_iter()
        .filter(|zero| zero.type_name() != arg.type_name())
        .collect()
}

/// Relation-preserving transforms of an argument.
///
/// Booleans are negated, numbers negated and doubled, text emptied, lowercased and
/// uppercased, literal sequences emptied and reversed. Transforms that would overflow or
/// that reproduce the argument unchanged are left out.
#[must_use]
pub fn metamorphic_values(arg: &Value) -> Vec<Value> {
    let candidates = match arg {
        Value::Bool(b) => vec![Value::Bool(!b)],
        Value::Int(i) => [i.checked_neg(), i.checked_mul(2)]
            .into_iter()
            .flatten()
            .map(Value::Int)
            .collect(),
        Value::Float(f) => vec![Value::Float(-f), Value::Float(f * 2.0)],
        Value::Text(s) => vec![
            Value::Text(String::new()),
            Value::Text(s.to_lowercase()),
            Value::Text(s.to_uppercase()),
        ],
        Value::List(items) if arg.is_literal() => vec![
            Value::List(Vec::new()),
            Value::List(items.iter().rev().cloned().collect()),
        ],
        Value::Tuple(items) if arg.is_literal() => vec![
            Value::Tuple(Vec::new()),
            Value::Tuple(items.iter().rev().cloned().collect()),
        ],
        _ => Vec::new(),
    };
    let mut variants: Vec<Value> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if candidate != *arg && !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

/// Every variant of `arg`, tagged with the generator that produced it.
#[must_use]
pub fn variants_of(arg: &Value) -> Vec<(VariantKind, Value)> {
    fuzz_values(arg)
        .into_iter()
        .map(|value| (VariantKind::Fuzz, value))
        .chain(
            metamorphic_values(arg)
                .into_iter()
                .map(|value| (VariantKind::Metamorphic, value)),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzz_skips_own_type() {
        assert_eq!(
            fuzz_values(&Value::Int(2)),
            vec![Value::Bool(false), Value::Float(0.0), Value::Text(String::new())]
        );
        assert_eq!(fuzz_values(&Value::None).len(), 4);
        assert!(fuzz_values(&Value::List(vec![])).is_empty());
    }

    #[test]
    fn metamorphic_numbers_negate_and_double() {
        assert_eq!(metamorphic_values(&Value::Int(2)), vec![Value::Int(-2), Value::Int(4)]);
        assert!(metamorphic_values(&Value::Int(0)).is_empty());
        assert_eq!(metamorphic_values(&Value::Int(i64::MIN)), vec![]);
    }

    #[test]
    fn metamorphic_text_changes_case() {
        assert_eq!(
            metamorphic_values(&Value::from("Hi")),
            vec![Value::from(""), Value::from("hi"), Value::from("HI")]
        );
        assert_eq!(metamorphic_values(&Value::from("")), vec![]);
    }

    #[test]
    fn metamorphic_sequences_empty_and_reverse() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(
            metamorphic_values(&list),
            vec![Value::List(vec![]), Value::List(vec![Value::Int(2), Value::Int(1)])]
        );
    }
}
