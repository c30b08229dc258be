use indexmap::IndexMap;

use crate::{
    capability::{Invocable, Iterable, Opaque, Operation, Readable, ValueIter, Writable},
    exception::{ExcType, Exception},
    value::Value,
};

/// A host object made of named attributes and, optionally, a sequence of items.
///
/// Attribute reads and writes behave like a plain Python instance. With items, the record
/// also supports `len()`, indexing, item assignment, `in` and iteration over copies of the
/// items.
#[derive(Debug, Clone)]
pub struct Record {
    class_name: String,
    attrs: IndexMap<String, Value>,
    items: Option<Vec<Value>>,
}

impl Record {
    #[must_use]
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            attrs: IndexMap::new(),
            items: None,
        }
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Makes the record a sized, iterable container of `items`.
    #[must_use]
    pub fn with_items(mut self, items: Vec<Value>) -> Self {
        self.items = Some(items);
        self
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    fn items(&self, what: &str) -> Result<&Vec<Value>, Exception> {
        self.items
            .as_ref()
            .ok_or_else(|| Exception::unsupported(&self.class_name, what))
    }

    /// Resolves a possibly negative index against `len` items.
    fn position(&self, index: i64, len: usize) -> Result<usize, Exception> {
        let position = if index < 0 {
            index.checked_add(i64::try_from(len).unwrap_or(i64::MAX))
        } else {
            Some(index)
        };
        position
            .and_then(|position| usize::try_from(position).ok())
            .filter(|position| *position < len)
            .ok_or_else(|| Exception::new(ExcType::IndexError, format!("{} index out of range", self.class_name)))
    }
}

impl Opaque for Record {
    fn class_name(&self) -> &str {
        &self.class_name
    }
}

impl Readable for Record {
    fn get_attr(&self, name: &str) -> Result<Value, Exception> {
        self.attrs
            .get(name)
            .cloned()
            .ok_or_else(|| Exception::no_attribute(&self.class_name, name))
    }
}

impl Writable for Record {
    fn set_attr(&mut self, name: &str, value: Value) -> Result<(), Exception> {
        self.attrs.insert(name.to_owned(), value);
        Ok(())
    }
}

impl Invocable for Record {
    fn invoke(&mut self, op: Operation, args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Exception> {
        let _ = kwargs;
        match (op, args) {
            (Operation::Len, []) => {
                let len = self.items("has no len()")?.len();
                Ok(Value::Int(i64::try_from(len).unwrap_or(i64::MAX)))
            }
            (Operation::GetItem, [Value::Int(index)]) => {
                let items = self.items("is not subscriptable")?;
                let position = self.position(*index, items.len())?;
                Ok(items[position].clone())
            }
            (Operation::SetItem, [Value::Int(index), value]) => {
                let position = self.position(*index, self.items("does not support item assignment")?.len())?;
                if let Some(items) = self.items.as_mut() {
                    items[position] = value.clone();
                }
                Ok(Value::None)
            }
            (Operation::Contains, [needle]) => Ok(Value::Bool(self.items("is not a container")?.contains(needle))),
            (Operation::Bool, []) => Ok(Value::Bool(self.items.as_ref().is_none_or(|items| !items.is_empty()))),
            (op, _) => Err(op.unsupported_by(&self.class_name)),
        }
    }
}

impl Iterable for Record {
    fn iterate(&mut self) -> Result<ValueIter, Exception> {
        let items = self.items("is not iterable")?.clone();
        Ok(Box::new(items.into_iter()))
    }
}
