use std::fmt;

use crate::{
    capability::{Invocable, Iterable, Opaque, Operation, Readable, Writable},
    exception::Exception,
    value::Value,
};

type Body = Box<dyn FnMut(&[Value], &[(String, Value)]) -> Result<Value, Exception>>;

/// A callable host object backed by a Rust closure.
///
/// Stored as a record attribute it plays the part of a bound method: reading the attribute
/// yields the function, calling it runs the closure.
///
/// ```
/// use testinprod::{Function, Record, Value};
///
/// let shout = Function::new("shout", |args, _| Ok(Value::from(args[0].to_string().to_uppercase())));
/// let speaker = Value::object(Record::new("Speaker").with_attr("shout", Value::object(shout)));
/// let out = speaker.call_method("shout", &[Value::from("hey")], &[]).unwrap();
/// assert_eq!(out, Value::from("HEY"));
/// ```
pub struct Function {
    name: String,
    body: Body,
}

impl Function {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnMut(&[Value], &[(String, Value)]) -> Result<Value, Exception> + 'static,
    {
        Self {
            name: name.into(),
            body: Box::new(body),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name)
    }
}

impl Opaque for Function {
    fn class_name(&self) -> &str {
        "function"
    }
}

impl Readable for Function {
    fn get_attr(&self, name: &str) -> Result<Value, Exception> {
        match name {
            "__name__" => Ok(Value::from(self.name.as_str())),
            _ => Err(Exception::no_attribute(self.class_name(), name)),
        }
    }
}

impl Writable for Function {}

impl Invocable for Function {
    fn invoke(&mut self, op: Operation, args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Exception> {
        match op {
            Operation::Call => (self.body)(args, kwargs),
            other => Err(other.unsupported_by(self.class_name())),
        }
    }
}

impl Iterable for Function {}
