use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use crate::{
    capability::{HostObject, Operation, ValueIter},
    exception::{ExcType, Exception},
    proxy::Proxy,
    value::Value,
};

/// Stable identity token of a host object.
///
/// Plays the role of Python's `id()`: two `ObjectRef`s with the same id refer to the same
/// instance, no matter how many proxies have been layered over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Returns the raw integer identifier.
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }

    fn next() -> Self {
        thread_local! {
            static NEXT_ID: Cell<u64> = const { Cell::new(1) };
        }
        NEXT_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            Self(id)
        })
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared handle to a host object: the raw, untracked form of an opaque value.
///
/// Cloning the handle shares the instance. Every operation borrows the underlying cell for
/// the duration of the delegate call; a re-entrant mutable borrow of the same instance is
/// reported as a `RuntimeError` instead of panicking.
#[derive(Clone)]
pub struct ObjectRef {
    id: ObjectId,
    class_name: Rc<str>,
    target: Target,
}

#[derive(Clone)]
enum Target {
    /// The host object itself.
    Host(Rc<RefCell<dyn HostObject>>),
    /// A proxy from an enclosing tracking window, layered behind a newer one.
    Layer(Proxy),
}

impl ObjectRef {
    /// Wraps a host object, assigning it a fresh identity.
    pub fn new<T: HostObject + 'static>(object: T) -> Self {
        let class_name: Rc<str> = Rc::from(object.class_name());
        Self {
            id: ObjectId::next(),
            class_name,
            target: Target::Host(Rc::new(RefCell::new(object))),
        }
    }

    /// Layers a proxy from an enclosing tracking window behind a new one.
    ///
    /// The layer keeps the identity of the instance, so both windows see the same object
    /// and both record what happens to it.
    pub(crate) fn layer(proxy: Proxy) -> Self {
        Self {
            id: proxy.target().id,
            class_name: proxy.target().class_name.clone(),
            target: Target::Layer(proxy),
        }
    }

    /// Returns the enclosing window's proxy if this handle is a layer.
    pub(crate) fn as_layer(&self) -> Option<&Proxy> {
        match &self.target {
            Target::Layer(proxy) => Some(proxy),
            Target::Host(_) => None,
        }
    }

    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn get_attr(&self, name: &str) -> Result<Value, Exception> {
        match &self.target {
            Target::Host(cell) => {
                let object = cell.try_borrow().map_err(|_| self.busy())?;
                object.get_attr(name)
            }
            Target::Layer(proxy) => proxy.get_attr(name),
        }
    }

    pub fn set_attr(&self, name: &str, value: Value) -> Result<(), Exception> {
        match &self.target {
            Target::Host(cell) => {
                let mut object = cell.try_borrow_mut().map_err(|_| self.busy())?;
                object.set_attr(name, value)
            }
            Target::Layer(proxy) => proxy.set_attr(name, value),
        }
    }

    pub fn invoke(&self, op: Operation, args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Exception> {
        match &self.target {
            Target::Host(cell) => {
                let mut object = cell.try_borrow_mut().map_err(|_| self.busy())?;
                object.invoke(op, args, kwargs)
            }
            Target::Layer(proxy) => proxy.invoke(op, args, kwargs),
        }
    }

    pub fn iterate(&self) -> Result<ValueIter, Exception> {
        match &self.target {
            Target::Host(cell) => {
                let mut object = cell.try_borrow_mut().map_err(|_| self.busy())?;
                object.iterate()
            }
            Target::Layer(proxy) => proxy.iterate(),
        }
    }

    fn busy(&self) -> Exception {
        Exception::new(
            ExcType::RuntimeError,
            format!("'{}' object {} is already in use", self.class_name, self.id),
        )
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} object {}>", self.class_name, self.id)
    }
}

/// Identity comparison, like Python's `is`.
impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ObjectRef {}
