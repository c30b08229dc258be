//! Capability interface implemented by host objects.
//!
//! An opaque value is anything the value model cannot describe structurally. The only way
//! to observe one is through the capabilities it exposes, and those are exactly the points
//! the interception proxy hooks into:
//!
//! | Capability | Python protocol | Recorded as |
//! |------------|-----------------|-------------|
//! | [`Readable`] | `obj.attr` | a `reads` entry |
//! | [`Writable`] | `obj.attr = v` | a `writes` entry |
//! | [`Invocable`] | `obj(...)`, `obj + x`, `obj[k]`, `len(obj)`, ... | an `operations` entry |
//! | [`Iterable`] | `iter(obj)` / `next(it)` | an iteration entry of produced values |
//!
//! Every capability has a default implementation that fails the way Python would for an
//! object lacking it, so a host type only spells out what it actually supports:
//!
//! ```
//! use testinprod::capability::{Invocable, Iterable, Opaque, Readable, Writable};
//! use testinprod::{Exception, Value};
//!
//! #[derive(Debug)]
//! struct Person {
//!     name: String,
//! }
//!
//! impl Opaque for Person {
//!     fn class_name(&self) -> &str {
//!         "Person"
//!     }
//! }
//!
//! impl Readable for Person {
//!     fn get_attr(&self, name: &str) -> Result<Value, Exception> {
//!         match name {
//!             "name" => Ok(Value::from(self.name.as_str())),
//!             _ => Err(Exception::no_attribute(self.class_name(), name)),
//!         }
//!     }
//! }
//!
//! impl Writable for Person {}
//! impl Invocable for Person {}
//! impl Iterable for Person {}
//! ```

use std::fmt;

use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    exception::{ExcType, Exception},
    value::Value,
};

/// Iterator handed out by [`Iterable::iterate`].
pub type ValueIter = Box<dyn Iterator<Item = Value>>;

/// Class identity of a host object.
///
/// The class name is never recorded as an interaction; it is the one read the proxy
/// answers without tracking.
pub trait Opaque: fmt::Debug {
    fn class_name(&self) -> &str;
}

/// Attribute reads (`obj.attr`).
pub trait Readable: Opaque {
    fn get_attr(&self, name: &str) -> Result<Value, Exception> {
        Err(Exception::no_attribute(self.class_name(), name))
    }
}

/// Attribute writes (`obj.attr = value`).
pub trait Writable: Opaque {
    fn set_attr(&mut self, name: &str, value: Value) -> Result<(), Exception> {
        let _ = value;
        Err(Exception::new(
            ExcType::AttributeError,
            format!("'{}' object attribute '{name}' is read-only", self.class_name()),
        ))
    }
}

/// Invocation and operator-like protocol operations.
pub trait Invocable: Opaque {
    fn invoke(&mut self, op: Operation, args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Exception> {
        let _ = (args, kwargs);
        Err(op.unsupported_by(self.class_name()))
    }
}

/// The iteration protocol.
pub trait Iterable: Opaque {
    fn iterate(&mut self) -> Result<ValueIter, Exception> {
        Err(Exception::unsupported(self.class_name(), "is not iterable"))
    }
}

/// A host object with the full capability surface.
///
/// Blanket-implemented for every type that opts into all four capabilities; this is what
/// [`ObjectRef`](crate::ObjectRef) stores.
pub trait HostObject: Readable + Writable + Invocable + Iterable {}

impl<T: Readable + Writable + Invocable + Iterable> HostObject for T {}

/// Operator-like protocol operations, named by their Python dunder method.
///
/// Uses strum derives so `Display`/`FromStr`/`Into<&'static str>` all produce the dunder
/// spelling (e.g. `Operation::GetItem` -> `"__getitem__"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, serde::Serialize)]
pub enum Operation {
    #[strum(serialize = "__call__")]
    Call,
    #[strum(serialize = "__add__")]
    Add,
    #[strum(serialize = "__sub__")]
    Sub,
    #[strum(serialize = "__mul__")]
    Mul,
    #[strum(serialize = "__truediv__")]
    TrueDiv,
    #[strum(serialize = "__floordiv__")]
    FloorDiv,
    #[strum(serialize = "__mod__")]
    Mod,
    #[strum(serialize = "__neg__")]
    Neg,
    #[strum(serialize = "__abs__")]
    Abs,
    #[strum(serialize = "__eq__")]
    Eq,
    #[strum(serialize = "__ne__")]
    Ne,
    #[strum(serialize = "__lt__")]
    Lt,
    #[strum(serialize = "__le__")]
    Le,
    #[strum(serialize = "__gt__")]
    Gt,
    #[strum(serialize = "__ge__")]
    Ge,
    #[strum(serialize = "__getitem__")]
    GetItem,
    #[strum(serialize = "__setitem__")]
    SetItem,
    #[strum(serialize = "__delitem__")]
    DelItem,
    #[strum(serialize = "__contains__")]
    Contains,
    #[strum(serialize = "__len__")]
    Len,
    #[strum(serialize = "__bool__")]
    Bool,
    #[strum(serialize = "__int__")]
    Int,
    #[strum(serialize = "__float__")]
    Float,
    #[strum(serialize = "__str__")]
    Str,
    #[strum(serialize = "__hash__")]
    Hash,
    #[strum(serialize = "__enter__")]
    Enter,
    #[strum(serialize = "__exit__")]
    Exit,
}

impl Operation {
    /// Returns the dunder name of the operation.
    #[must_use]
    pub fn dunder(self) -> &'static str {
        self.into()
    }

    /// The `TypeError` Python raises when the operation is not supported.
    #[must_use]
    pub fn unsupported_by(self, class_name: &str) -> Exception {
        let what = match self {
            Self::Call => "is not callable".to_owned(),
            Self::GetItem => "is not subscriptable".to_owned(),
            Self::SetItem => "does not support item assignment".to_owned(),
            Self::DelItem => "does not support item deletion".to_owned(),
            Self::Len => "has no len()".to_owned(),
            Self::Contains => "is not a container".to_owned(),
            Self::Enter | Self::Exit => "does not support the context manager protocol".to_owned(),
            other => format!("does not support {}", other.dunder()),
        };
        Exception::unsupported(class_name, &what)
    }
}
