use std::fmt::{self, Write};

use crate::{
    capability::{Operation, ValueIter},
    exception::{ExcType, Exception},
    object::ObjectRef,
    proxy::Proxy,
};

/// A value that can flow through an instrumented call.
///
/// Classification is exhaustive and mutually exclusive: anything that is not one of the
/// primitive or container shapes is opaque, either as a raw host object ([`Value::Object`])
/// or behind an interception proxy ([`Value::Proxy`]).
///
/// # Opaque values
///
/// `Value` forwards attribute access, invocation and iteration to whichever opaque form it
/// holds, so instrumented method bodies work the same whether or not their arguments are
/// being tracked:
///
/// ```
/// use testinprod::{Record, Value};
///
/// let person = Value::object(Record::new("Person").with_attr("name", "Al"));
/// assert_eq!(person.get_attr("name").unwrap(), Value::from("Al"));
/// ```
///
/// # Equality
///
/// Structural for primitives and containers (floats compare by bit pattern so that
/// equality stays reflexive), identity for opaque values.
#[derive(Debug, Clone)]
pub enum Value {
    /// Python's `None` singleton.
    None,
    /// Python boolean (`True` or `False`).
    Bool(bool),
    /// Python integer (64-bit signed).
    Int(i64),
    /// Python float (64-bit IEEE 754).
    Float(f64),
    /// Python string (UTF-8).
    Text(String),
    /// Python list (mutable sequence).
    List(Vec<Self>),
    /// Python tuple (immutable sequence).
    Tuple(Vec<Self>),
    /// Python dictionary (insertion-ordered mapping).
    Dict(DictPairs),
    /// A host object that is not being tracked.
    Object(ObjectRef),
    /// A host object behind an interception proxy.
    Proxy(Proxy),
}

impl Value {
    /// Wraps a host object as an untracked opaque value.
    pub fn object<T: crate::capability::HostObject + 'static>(object: T) -> Self {
        Self::Object(ObjectRef::new(object))
    }

    /// Creates a `Dict` from something that can be converted into `DictPairs`.
    pub fn dict(dict: impl Into<DictPairs>) -> Self {
        Self::Dict(dict.into())
    }

    /// `None`, `bool`, `int`, `float` and `str`: the values that render as a bare literal.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::None | Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Text(_)
        )
    }

    #[must_use]
    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Proxy(_))
    }

    /// Returns true if the value contains no opaque value at any depth.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        match self {
            Self::List(items) | Self::Tuple(items) => items.iter().all(Self::is_literal),
            Self::Dict(pairs) => pairs.iter().all(|(k, v)| k.is_literal() && v.is_literal()),
            other => !other.is_opaque(),
        }
    }

    /// Returns the Python type name for this value (e.g., `"int"`, `"str"`, `"list"`).
    ///
    /// Opaque values report their host class name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "str",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
            Self::Object(object) => object.class_name(),
            Self::Proxy(proxy) => proxy.class_name(),
        }
    }

    /// Returns the raw host object behind an opaque value, looking through any proxy.
    #[must_use]
    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            Self::Object(object) => Some(object.clone()),
            Self::Proxy(proxy) => Some(proxy.target().clone()),
            _ => None,
        }
    }

    /// Copies the value, replacing every proxy (at any depth) with the object it wraps.
    ///
    /// This is what the real caller of an instrumented method gets back: the same
    /// instances it would have received without instrumentation.
    #[must_use]
    pub fn unwrapped(&self) -> Self {
        match self {
            Self::List(items) => Self::List(items.iter().map(Self::unwrapped).collect()),
            Self::Tuple(items) => Self::Tuple(items.iter().map(Self::unwrapped).collect()),
            Self::Dict(pairs) => Self::Dict(pairs.iter().map(|(k, v)| (k.unwrapped(), v.unwrapped())).collect()),
            // a layered target is the enclosing window's proxy, which the caller still sees
            Self::Proxy(proxy) => match proxy.target().as_layer() {
                Some(outer) => Self::Proxy(outer.clone()),
                None => Self::Object(proxy.target().clone()),
            },
            other => other.clone(),
        }
    }

    pub fn get_attr(&self, name: &str) -> Result<Self, Exception> {
        match self {
            Self::Object(object) => object.get_attr(name),
            Self::Proxy(proxy) => proxy.get_attr(name),
            other => Err(Exception::no_attribute(other.type_name(), name)),
        }
    }

    pub fn set_attr(&self, name: &str, value: Self) -> Result<(), Exception> {
        match self {
            Self::Object(object) => object.set_attr(name, value),
            Self::Proxy(proxy) => proxy.set_attr(name, value),
            other => Err(Exception::no_attribute(other.type_name(), name)),
        }
    }

    pub fn invoke(&self, op: Operation, args: &[Self], kwargs: &[(String, Self)]) -> Result<Self, Exception> {
        match self {
            Self::Object(object) => object.invoke(op, args, kwargs),
            Self::Proxy(proxy) => proxy.invoke(op, args, kwargs),
            other => Err(op.unsupported_by(other.type_name())),
        }
    }

    /// `value(*args, **kwargs)`
    pub fn call(&self, args: &[Self], kwargs: &[(String, Self)]) -> Result<Self, Exception> {
        self.invoke(Operation::Call, args, kwargs)
    }

    /// `value.name(*args, **kwargs)`: an attribute read followed by a call, as in Python.
    pub fn call_method(&self, name: &str, args: &[Self], kwargs: &[(String, Self)]) -> Result<Self, Exception> {
        self.get_attr(name)?.call(args, kwargs)
    }

    /// `iter(value)`
    ///
    /// Containers iterate over copies of their items (dict over its keys, str over its
    /// characters); opaque values delegate to the host object.
    pub fn iterate(&self) -> Result<ValueIter, Exception> {
        match self {
            Self::List(items) | Self::Tuple(items) => Ok(Box::new(items.clone().into_iter())),
            Self::Dict(pairs) => Ok(Box::new(
                pairs.iter().map(|(k, _)| k.clone()).collect::<Vec<_>>().into_iter(),
            )),
            Self::Text(s) => Ok(Box::new(
                s.chars().map(|c| Self::Text(c.to_string())).collect::<Vec<_>>().into_iter(),
            )),
            Self::Object(object) => object.iterate(),
            Self::Proxy(proxy) => proxy.iterate(),
            other => Err(Exception::unsupported(other.type_name(), "is not iterable")),
        }
    }

    /// Returns the Python `repr()` string for this value.
    ///
    /// Opaque values have no literal form and show as `<Class object #id>`; rendering
    /// them as source code is the job of [`render`](crate::render::render).
    #[must_use]
    pub fn py_repr(&self) -> String {
        let mut s = String::new();
        // writing into a String cannot fail
        let _ = self.repr_fmt(&mut s);
        s
    }

    pub(crate) fn repr_fmt(&self, f: &mut impl Write) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => float_repr_fmt(*v, f),
            Self::Text(s) => string_repr_fmt(s, f),
            Self::List(l) => {
                f.write_char('[')?;
                let mut iter = l.iter();
                if let Some(first) = iter.next() {
                    first.repr_fmt(f)?;
                    for item in iter {
                        f.write_str(", ")?;
                        item.repr_fmt(f)?;
                    }
                }
                f.write_char(']')
            }
            Self::Tuple(t) => {
                f.write_char('(')?;
                let mut iter = t.iter();
                if let Some(first) = iter.next() {
                    first.repr_fmt(f)?;
                    for item in iter {
                        f.write_str(", ")?;
                        item.repr_fmt(f)?;
                    }
                }
                if t.len() == 1 {
                    f.write_char(',')?;
                }
                f.write_char(')')
            }
            Self::Dict(d) => {
                f.write_char('{')?;
                let mut iter = d.iter();
                if let Some((k, v)) = iter.next() {
                    k.repr_fmt(f)?;
                    f.write_str(": ")?;
                    v.repr_fmt(f)?;
                    for (k, v) in iter {
                        f.write_str(", ")?;
                        k.repr_fmt(f)?;
                        f.write_str(": ")?;
                        v.repr_fmt(f)?;
                    }
                }
                f.write_char('}')
            }
            Self::Object(object) => write!(f, "<{} object {}>", object.class_name(), object.id()),
            Self::Proxy(proxy) => write!(f, "<{} object {}>", proxy.class_name(), proxy.target().id()),
        }
    }

    /// Converts this value to a natural JSON representation for trace dumps.
    ///
    /// - `None` → `null`
    /// - `Bool` → `true`/`false`
    /// - `Int` → JSON number
    /// - `Float` → JSON number (NaN/Infinity → `null`)
    /// - `Text` → JSON string
    /// - `List` → JSON array
    /// - `Tuple` → `{"$tuple": [...]}`
    /// - `Dict` → JSON object (keys coerced to strings via repr)
    /// - `Object` → `{"$object": {"class": "...", "id": n}}`
    /// - `Proxy` → `{"$proxy": {"class": "...", "id": n, "history": {...}}}`
    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        use serde_json::{Value as JV, json};
        match self {
            Self::None => JV::Null,
            Self::Bool(b) => JV::Bool(*b),
            Self::Int(i) => json!(i),
            Self::Float(f) => {
                if f.is_nan() || f.is_infinite() {
                    JV::Null
                } else {
                    json!(f)
                }
            }
            Self::Text(s) => JV::String(s.clone()),
            Self::List(items) => JV::Array(items.iter().map(Self::to_json_value).collect()),
            Self::Tuple(items) => json!({"$tuple": items.iter().map(Self::to_json_value).collect::<Vec<_>>()}),
            Self::Dict(pairs) => {
                let map: serde_json::Map<String, JV> = pairs
                    .iter()
                    .map(|(k, v)| {
                        // string keys stay bare: {"name": "Al"}, not {"'name'": "Al"}
                        let key = match k {
                            Self::Text(s) => s.clone(),
                            other => other.py_repr(),
                        };
                        (key, v.to_json_value())
                    })
                    .collect();
                JV::Object(map)
            }
            Self::Object(object) => json!({"$object": {"class": object.class_name(), "id": object.id().raw()}}),
            Self::Proxy(proxy) => json!({"$proxy": {
                "class": proxy.class_name(),
                "id": proxy.target().id().raw(),
                "history": proxy.history().to_json_value(),
            }}),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            _ => self.repr_fmt(f),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            // Use to_bits() so equality stays reflexive for NaN
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::Dict(a), Self::Dict(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Proxy(a), Self::Proxy(b)) => a.target() == b.target(),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<Self>> for Value {
    fn from(items: Vec<Self>) -> Self {
        Self::List(items)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Self::Object(object)
    }
}

/// Writes a float the way Python's `repr()` does, keeping the literal parseable.
///
/// Rust's `Display` already produces the shortest round-tripping digits; Python additionally
/// insists on a decimal point and has no literal for infinities or NaN.
pub(crate) fn float_repr_fmt(v: f64, f: &mut impl Write) -> fmt::Result {
    if v.is_nan() {
        return f.write_str("float('nan')");
    }
    if v.is_infinite() {
        return f.write_str(if v > 0.0 { "float('inf')" } else { "float('-inf')" });
    }
    let s = v.to_string();
    f.write_str(&s)?;
    if !s.contains('.') {
        f.write_str(".0")?;
    }
    Ok(())
}

/// Writes a string literal exactly as Python's `repr()` quotes it.
///
/// Single quotes unless the text contains a single quote and no double quote; backslashes,
/// the chosen quote and non-printable characters are escaped.
pub(crate) fn string_repr_fmt(s: &str, f: &mut impl Write) -> fmt::Result {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    f.write_char(quote)?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c == quote => {
                f.write_char('\\')?;
                f.write_char(c)?;
            }
            c if c.is_control() => {
                let code = u32::from(c);
                if code <= 0xff {
                    write!(f, "\\x{code:02x}")?;
                } else if code <= 0xffff {
                    write!(f, "\\u{code:04x}")?;
                } else {
                    write!(f, "\\U{code:08x}")?;
                }
            }
            c => f.write_char(c)?,
        }
    }
    f.write_char(quote)
}

/// Returns the Python `repr()` of a string.
#[must_use]
pub fn string_repr(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    let _ = string_repr_fmt(s, &mut out);
    out
}

/// Raised by [`DictPairs::from_unique`] when a key repeats.
pub(crate) fn duplicate_key(key: &Value) -> Exception {
    Exception::new(ExcType::KeyError, format!("duplicate key {}", key.py_repr()))
}

/// A collection of key-value pairs representing Python dictionary contents.
///
/// Preserves insertion order; keys are unique by structural equality.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DictPairs(Vec<(Value, Value)>);

impl DictPairs {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Builds a mapping, failing if any key repeats.
    pub fn from_unique(pairs: Vec<(Value, Value)>) -> Result<Self, Exception> {
        let mut dict = Self::new();
        for (key, value) in pairs {
            if dict.get(&key).is_some() {
                return Err(duplicate_key(&key));
            }
            dict.0.push((key, value));
        }
        Ok(dict)
    }

    /// Inserts or replaces the value for `key`, keeping the original position on replace.
    pub fn insert(&mut self, key: Value, value: Value) {
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    #[must_use]
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.0.iter()
    }
}

/// Later pairs overwrite earlier ones with an equal key, as in a Python dict display.
impl From<Vec<(Value, Value)>> for DictPairs {
    fn from(pairs: Vec<(Value, Value)>) -> Self {
        pairs.into_iter().collect()
    }
}

impl IntoIterator for DictPairs {
    type Item = (Value, Value);
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a DictPairs {
    type Item = &'a (Value, Value);
    type IntoIter = std::slice::Iter<'a, (Value, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(Value, Value)> for DictPairs {
    fn from_iter<T: IntoIterator<Item = (Value, Value)>>(iter: T) -> Self {
        let mut dict = Self::new();
        for (key, value) in iter {
            dict.insert(key, value);
        }
        dict
    }
}
