//! Call traces and the per-class trace log.

use std::{cell::RefCell, fmt, rc::Rc};

use ahash::AHashMap;
use serde_json::json;

use crate::{object::ObjectId, value::Value};

/// Identity of an instrumented function: declaring class plus method name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct FunctionId {
    pub class_name: String,
    pub name: String,
}

impl FunctionId {
    #[must_use]
    pub fn new(class_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            name: name.into(),
        }
    }

    /// `Class.method`, the expression a test uses to call the function.
    #[must_use]
    pub fn qualname(&self) -> String {
        format!("{}.{}", self.class_name, self.name)
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class_name, self.name)
    }
}

/// Immutable record of one successful instrumented invocation.
///
/// Opaque inputs and outputs are the proxies the method actually worked with, so their
/// interaction histories are complete by the time the trace is built.
#[derive(Debug, Clone)]
pub struct CallTrace {
    function: FunctionId,
    params: Vec<String>,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
    output: Value,
}

impl CallTrace {
    /// Builds a trace. `params` are the declared positional parameter names, used as
    /// naming hints; it may be shorter than `args`.
    #[must_use]
    pub fn new(
        function: FunctionId,
        params: Vec<String>,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        output: Value,
    ) -> Self {
        Self {
            function,
            params,
            args,
            kwargs,
            output,
        }
    }

    #[must_use]
    pub fn function(&self) -> &FunctionId {
        &self.function
    }

    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    #[must_use]
    pub fn kwargs(&self) -> &[(String, Value)] {
        &self.kwargs
    }

    #[must_use]
    pub fn output(&self) -> &Value {
        &self.output
    }

    /// Naming hint for the positional argument at `index`.
    #[must_use]
    pub fn arg_hint(&self, index: usize) -> &str {
        self.params.get(index).map_or("arg", String::as_str)
    }

    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        json!({
            "function": self.function.qualname(),
            "args": self.args.iter().map(Value::to_json_value).collect::<Vec<_>>(),
            "kwargs": self
                .kwargs
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json_value()))
                .collect::<serde_json::Map<_, _>>(),
            "output": self.output.to_json_value(),
        })
    }
}

/// Append-only log of the traces recorded for one instrumented class.
#[derive(Debug, Clone, Default)]
pub struct TraceLog(Vec<CallTrace>);

impl TraceLog {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, trace: CallTrace) {
        self.0.push(trace);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&CallTrace> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallTrace> {
        self.0.iter()
    }

    /// Traces from position `start` onwards.
    #[must_use]
    pub fn since(&self, start: usize) -> &[CallTrace] {
        self.0.get(start..).unwrap_or_default()
    }

    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::Value::Array(self.0.iter().map(CallTrace::to_json_value).collect())
    }
}

/// How an instance was built by an instrumented constructor.
#[derive(Debug, Clone)]
pub struct ConstructorCall {
    pub class_name: String,
    /// Module the class is imported from in generated tests.
    pub module_path: String,
    pub args: Vec<Value>,
    pub kwargs: Vec<(String, Value)>,
}

/// Constructor calls keyed by the identity of the instance they built.
///
/// Cloning shares the registry, so several instrumented classes can resolve each
/// other's instances.
#[derive(Debug, Clone, Default)]
pub struct ConstructorRegistry(Rc<RefCell<AHashMap<ObjectId, ConstructorCall>>>);

impl ConstructorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: ObjectId, call: ConstructorCall) {
        self.0.borrow_mut().insert(id, call);
    }

    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<ConstructorCall> {
        self.0.borrow().get(&id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}
