use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Python exception types a host object or instrumented method can raise.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>` implementations.
/// The string representation matches the variant name exactly (e.g., `ValueError` -> "ValueError").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ExcType {
    /// Catch-all for failures that fit no narrower category.
    Exception,
    AttributeError,
    TypeError,
    ValueError,
    KeyError,
    IndexError,
    ZeroDivisionError,
    NotImplementedError,
    RuntimeError,
    StopIteration,
}

impl ExcType {
    /// Exception types a fuzz or metamorphic variant is allowed to raise.
    ///
    /// These are the "categorized" failures a well-behaved method produces when handed a
    /// value of the wrong type or shape. Anything else escaping a variant call fails the test.
    pub const CATEGORIZED: [Self; 6] = [
        Self::AttributeError,
        Self::IndexError,
        Self::KeyError,
        Self::TypeError,
        Self::ValueError,
        Self::ZeroDivisionError,
    ];
}

/// A Python-style failure raised by a host object or an instrumented method.
///
/// Exceptions flow through the interception layer unchanged: a proxy never converts,
/// wraps or swallows the wrapped object's failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exception {
    exc_type: ExcType,
    message: Option<String>,
}

impl Exception {
    /// Creates an exception with a message.
    #[must_use]
    pub fn new(exc_type: ExcType, message: impl Into<String>) -> Self {
        Self {
            exc_type,
            message: Some(message.into()),
        }
    }

    /// `AttributeError` for a missing attribute on a named class.
    #[must_use]
    pub fn no_attribute(class_name: &str, attr: &str) -> Self {
        Self::new(
            ExcType::AttributeError,
            format!("'{class_name}' object has no attribute '{attr}'"),
        )
    }

    /// `TypeError` for a protocol operation the class does not support.
    #[must_use]
    pub fn unsupported(class_name: &str, what: &str) -> Self {
        Self::new(ExcType::TypeError, format!("'{class_name}' object {what}"))
    }

    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        self.exc_type
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {message}", self.exc_type),
            None => write!(f, "{}", self.exc_type),
        }
    }
}

impl std::error::Error for Exception {}
