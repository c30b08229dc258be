//! Interception proxies and the tracking window they record into.
//!
//! A [`Proxy`] wraps an [`ObjectRef`] and forwards every capability call to it, appending
//! what it observed to its [`InteractionHistory`]. Proxies created during one instrumented
//! call share a [`TrackingFlag`]; while the flag is suspended, every proxy in the group is a
//! plain pass-through. The proxy suspends its own group around each delegate call, so that
//! whatever the host object does internally (including touching other proxies of the same
//! call) is never mistaken for an interaction of the code under test.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use serde_json::json;

use crate::{
    capability::{Operation, ValueIter},
    exception::Exception,
    object::ObjectRef,
    value::Value,
};

/// State of a tracking window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    /// Interactions are recorded.
    Active,
    /// A proxy of the group is inside a delegate call; everything passes through.
    Suspended,
    /// The instrumented call has returned; everything passes through for good.
    Closed,
}

/// Shared re-entrancy flag of one tracking window.
///
/// Cloning shares the flag: every proxy created while recording one call holds a clone.
#[derive(Debug, Clone)]
pub struct TrackingFlag(Rc<Cell<TrackingState>>);

impl TrackingFlag {
    /// Opens a new, active tracking window.
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(Cell::new(TrackingState::Active)))
    }

    #[must_use]
    pub fn state(&self) -> TrackingState {
        self.0.get()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.0.get() == TrackingState::Active
    }

    /// Suspends tracking until the returned guard is dropped.
    ///
    /// The guard restores the previous state on every exit path, including `?` returns and
    /// unwinding. Guards nest; a window closed in the meantime stays closed.
    #[must_use = "tracking resumes as soon as the guard is dropped"]
    pub fn suspend(&self) -> SuspendGuard {
        let previous = self.0.replace(match self.0.get() {
            TrackingState::Closed => TrackingState::Closed,
            _ => TrackingState::Suspended,
        });
        SuspendGuard {
            flag: Rc::clone(&self.0),
            previous,
        }
    }

    /// Ends the tracking window. Proxies of the group stop recording permanently.
    pub fn close(&self) {
        self.0.set(TrackingState::Closed);
    }

    /// Returns true if both flags belong to the same tracking window.
    #[must_use]
    pub fn same_window(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for TrackingFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped suspension of a [`TrackingFlag`], released on drop.
#[derive(Debug)]
pub struct SuspendGuard {
    flag: Rc<Cell<TrackingState>>,
    previous: TrackingState,
}

impl Drop for SuspendGuard {
    fn drop(&mut self) {
        if self.flag.get() == TrackingState::Suspended {
            self.flag.set(self.previous);
        }
    }
}

/// One observed attribute read.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRead {
    pub name: String,
    /// Snapshot of the value handed back to the code under test.
    pub value: Value,
}

/// One observed attribute write.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeWrite {
    pub name: String,
    /// Snapshot of the assigned value.
    pub value: Value,
}

/// One observed invocation-like or iteration-like operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationRecord {
    /// A call or operator: inputs and output.
    Invoke {
        op: Operation,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        output: Value,
    },
    /// An iteration: the values produced, in order, and whether the iterator ran dry.
    Iterate { produced: Vec<Value>, exhausted: bool },
}

/// The ordered record of everything observed on one proxy during its tracking window.
///
/// Values stored here are snapshots: containers are copied, nested opaque values are the
/// proxies the code under test actually received, so their own histories keep filling up
/// for the rest of the window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionHistory {
    pub reads: Vec<AttributeRead>,
    pub writes: Vec<AttributeWrite>,
    pub operations: Vec<OperationRecord>,
}

impl InteractionHistory {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty() && self.operations.is_empty()
    }

    /// Total number of recorded entries across the three logs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reads.len() + self.writes.len() + self.operations.len()
    }

    /// Invocations of the given operation, in order.
    pub fn invocations(&self, op: Operation) -> impl Iterator<Item = (&[Value], &[(String, Value)], &Value)> {
        self.operations.iter().filter_map(move |record| match record {
            OperationRecord::Invoke {
                op: recorded,
                args,
                kwargs,
                output,
            } if *recorded == op => Some((args.as_slice(), kwargs.as_slice(), output)),
            _ => None,
        })
    }

    /// Values produced by the first iteration, if the object was iterated.
    #[must_use]
    pub fn first_iteration(&self) -> Option<&[Value]> {
        self.operations.iter().find_map(|record| match record {
            OperationRecord::Iterate { produced, .. } => Some(produced.as_slice()),
            OperationRecord::Invoke { .. } => None,
        })
    }

    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        let reads: Vec<_> = self
            .reads
            .iter()
            .map(|read| json!({"name": read.name, "value": read.value.to_json_value()}))
            .collect();
        let writes: Vec<_> = self
            .writes
            .iter()
            .map(|write| json!({"name": write.name, "value": write.value.to_json_value()}))
            .collect();
        let operations: Vec<_> = self
            .operations
            .iter()
            .map(|record| match record {
                OperationRecord::Invoke {
                    op,
                    args,
                    kwargs,
                    output,
                } => json!({
                    "op": op.dunder(),
                    "args": args.iter().map(Value::to_json_value).collect::<Vec<_>>(),
                    "kwargs": kwargs
                        .iter()
                        .map(|(name, value)| (name.clone(), value.to_json_value()))
                        .collect::<serde_json::Map<_, _>>(),
                    "output": output.to_json_value(),
                }),
                OperationRecord::Iterate { produced, exhausted } => json!({
                    "op": "__iter__",
                    "produced": produced.iter().map(Value::to_json_value).collect::<Vec<_>>(),
                    "exhausted": exhausted,
                }),
            })
            .collect();
        json!({"reads": reads, "writes": writes, "operations": operations})
    }
}

/// An interception proxy: the tracked form of an opaque value.
///
/// Cloning shares the proxy and its history.
#[derive(Clone)]
pub struct Proxy(Rc<ProxyInner>);

struct ProxyInner {
    target: ObjectRef,
    flag: TrackingFlag,
    history: RefCell<InteractionHistory>,
}

impl Proxy {
    /// Wraps `target` in a new proxy recording into the window of `flag`.
    #[must_use]
    pub fn new(target: ObjectRef, flag: TrackingFlag) -> Self {
        Self(Rc::new(ProxyInner {
            target,
            flag,
            history: RefCell::new(InteractionHistory::default()),
        }))
    }

    /// The wrapped object.
    #[must_use]
    pub fn target(&self) -> &ObjectRef {
        &self.0.target
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        self.0.target.class_name()
    }

    #[must_use]
    pub fn flag(&self) -> &TrackingFlag {
        &self.0.flag
    }

    /// Returns a copy of the history recorded so far.
    #[must_use]
    pub fn history(&self) -> InteractionHistory {
        self.0.history.borrow().clone()
    }

    pub fn get_attr(&self, name: &str) -> Result<Value, Exception> {
        let inner = &self.0;
        if !inner.flag.is_active() {
            return inner.target.get_attr(name);
        }
        let _suspended = inner.flag.suspend();
        let output = track(&inner.target.get_attr(name)?, &inner.flag);
        inner.history.borrow_mut().reads.push(AttributeRead {
            name: name.to_owned(),
            value: output.clone(),
        });
        Ok(output)
    }

    pub fn set_attr(&self, name: &str, value: Value) -> Result<(), Exception> {
        let inner = &self.0;
        if !inner.flag.is_active() {
            return inner.target.set_attr(name, value);
        }
        let _suspended = inner.flag.suspend();
        let snapshot = track(&value, &inner.flag);
        inner.target.set_attr(name, value.unwrapped())?;
        inner.history.borrow_mut().writes.push(AttributeWrite {
            name: name.to_owned(),
            value: snapshot,
        });
        Ok(())
    }

    pub fn invoke(&self, op: Operation, args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Exception> {
        let inner = &self.0;
        if !inner.flag.is_active() {
            return inner.target.invoke(op, args, kwargs);
        }
        let _suspended = inner.flag.suspend();
        let recorded_args: Vec<Value> = args.iter().map(|arg| track(arg, &inner.flag)).collect();
        let recorded_kwargs: Vec<(String, Value)> = kwargs
            .iter()
            .map(|(name, value)| (name.clone(), track(value, &inner.flag)))
            .collect();
        let delegate_args: Vec<Value> = args.iter().map(Value::unwrapped).collect();
        let delegate_kwargs: Vec<(String, Value)> = kwargs
            .iter()
            .map(|(name, value)| (name.clone(), value.unwrapped()))
            .collect();
        let output = track(&inner.target.invoke(op, &delegate_args, &delegate_kwargs)?, &inner.flag);
        inner.history.borrow_mut().operations.push(OperationRecord::Invoke {
            op,
            args: recorded_args,
            kwargs: recorded_kwargs,
            output: output.clone(),
        });
        Ok(output)
    }

    /// `iter(proxy)`: the returned iterator records every value it produces.
    ///
    /// Failure to produce an iterator is the wrapped object's own error, returned as-is.
    pub fn iterate(&self) -> Result<ValueIter, Exception> {
        let inner = &self.0;
        if !inner.flag.is_active() {
            return inner.target.iterate();
        }
        let source = {
            let _suspended = inner.flag.suspend();
            inner.target.iterate()?
        };
        let slot = {
            let mut history = inner.history.borrow_mut();
            history.operations.push(OperationRecord::Iterate {
                produced: Vec::new(),
                exhausted: false,
            });
            history.operations.len() - 1
        };
        Ok(Box::new(RecordingIter {
            proxy: self.clone(),
            source,
            slot,
        }))
    }

    /// Identity of this proxy (not of the wrapped object).
    pub(crate) fn key(&self) -> usize {
        Rc::as_ptr(&self.0).addr()
    }

    fn record_produced(&self, slot: usize, produced: Option<Value>) {
        if let Some(OperationRecord::Iterate {
            produced: values,
            exhausted,
        }) = self.0.history.borrow_mut().operations.get_mut(slot)
        {
            match produced {
                Some(value) => values.push(value),
                None => *exhausted = true,
            }
        }
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<proxy of {:?}>", self.0.target)
    }
}

/// Iterator returned by [`Proxy::iterate`].
struct RecordingIter {
    proxy: Proxy,
    source: ValueIter,
    slot: usize,
}

impl Iterator for RecordingIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let flag = self.proxy.flag().clone();
        if !flag.is_active() {
            return self.source.next();
        }
        let produced = {
            let _suspended = flag.suspend();
            self.source.next()
        };
        let produced = produced.map(|value| track(&value, &flag));
        self.proxy.record_produced(self.slot, produced.clone());
        produced
    }
}

/// Places every opaque value inside `value` behind a proxy of the window of `flag`.
///
/// Containers are copied; primitives pass through. A proxy that already belongs to the
/// window is kept as-is, while one from an enclosing window gets layered behind a new
/// proxy so that both windows record what happens to the object.
#[must_use]
pub fn track(value: &Value, flag: &TrackingFlag) -> Value {
    match value {
        Value::List(items) => Value::List(items.iter().map(|item| track(item, flag)).collect()),
        Value::Tuple(items) => Value::Tuple(items.iter().map(|item| track(item, flag)).collect()),
        Value::Dict(pairs) => Value::Dict(pairs.iter().map(|(k, v)| (track(k, flag), track(v, flag))).collect()),
        Value::Object(object) => Value::Proxy(Proxy::new(object.clone(), flag.clone())),
        Value::Proxy(proxy) if proxy.flag().same_window(flag) => Value::Proxy(proxy.clone()),
        Value::Proxy(proxy) => Value::Proxy(Proxy::new(ObjectRef::layer(proxy.clone()), flag.clone())),
        other => other.clone(),
    }
}
