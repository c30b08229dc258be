//! Class definitions and the call recorder that instruments them.
//!
//! A [`ClassDef`] lists the methods of a host class as Rust closures. [`Instrumenter`]
//! turns it into an [`InstrumentedClass`] whose methods record every successful call and
//! keep the generated test module up to date:
//!
//! ```
//! use testinprod::{ClassDef, InstrumentOptions, Value, instrument};
//!
//! let greeter = instrument(
//!     ClassDef::new("Greeter").method("greet", ["person"], |args, _| {
//!         let name = args[0].get_attr("name")?;
//!         Ok(Value::from(format!("Hi {name}")))
//!     }),
//!     InstrumentOptions::default(),
//! );
//! let person = Value::object(testinprod::Record::new("Person").with_attr("name", "Al"));
//! assert_eq!(greeter.call("greet", &[person], &[]).unwrap(), Value::from("Hi Al"));
//! assert!(greeter.module_text().contains("person = Mock(name='Al')"));
//! ```

use std::cell::{Ref, RefCell};

use indexmap::IndexMap;

use crate::{
    confirm::{Prompt, StdinPrompt},
    error::SynthError,
    exception::{ExcType, Exception},
    options::InstrumentOptions,
    proxy::{TrackingFlag, track},
    sink::{ArtifactWriter, NoWriter},
    synth::{Synthesizer, TestCase},
    trace::{CallTrace, ConstructorCall, ConstructorRegistry, FunctionId, TraceLog},
    tracer::{NoopTracer, SynthTracer},
    value::Value,
};

type MethodBody = Box<dyn Fn(&[Value], &[(String, Value)]) -> Result<Value, Exception>>;

/// One method of a host class.
pub struct MethodDef {
    name: String,
    params: Vec<String>,
    body: MethodBody,
}

impl MethodDef {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared positional parameter names.
    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }
}

impl std::fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.params.join(", "))
    }
}

/// A host class: a name, an optional constructor and its methods.
///
/// Methods are called the way generated tests call them, `Class.method(*args, **kwargs)`;
/// an instance method takes its receiver as the first positional argument.
#[derive(Debug)]
pub struct ClassDef {
    name: String,
    constructor: Option<MethodDef>,
    methods: IndexMap<String, MethodDef>,
}

impl ClassDef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constructor: None,
            methods: IndexMap::new(),
        }
    }

    /// Sets the constructor. `body` must return the new instance as an opaque value.
    #[must_use]
    pub fn constructor<P, F>(mut self, params: P, body: F) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        F: Fn(&[Value], &[(String, Value)]) -> Result<Value, Exception> + 'static,
    {
        self.constructor = Some(MethodDef {
            name: "__init__".to_owned(),
            params: params.into_iter().map(Into::into).collect(),
            body: Box::new(body),
        });
        self
    }

    /// Adds (or replaces) a method.
    #[must_use]
    pub fn method<P, F>(mut self, name: &str, params: P, body: F) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        F: Fn(&[Value], &[(String, Value)]) -> Result<Value, Exception> + 'static,
    {
        self.methods.insert(
            name.to_owned(),
            MethodDef {
                name: name.to_owned(),
                params: params.into_iter().map(Into::into).collect(),
                body: Box::new(body),
            },
        );
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn get_method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.get(name)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDef> {
        self.methods.values()
    }

    #[must_use]
    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some()
    }
}

/// Builder for instrumented classes.
///
/// Defaults: no artifact writer, confirmation on stdin (only used when `trusted` is off),
/// no tracer, and a private constructor registry.
pub struct Instrumenter {
    options: InstrumentOptions,
    constructors: ConstructorRegistry,
    writer: Box<dyn ArtifactWriter>,
    prompt: Box<dyn Prompt>,
    tracer: Box<dyn SynthTracer>,
}

impl Instrumenter {
    #[must_use]
    pub fn new(options: InstrumentOptions) -> Self {
        Self {
            options,
            constructors: ConstructorRegistry::new(),
            writer: Box::new(NoWriter),
            prompt: Box::new(StdinPrompt),
            tracer: Box::new(NoopTracer),
        }
    }

    /// Shares a constructor registry, so that classes instrumented separately can render
    /// each other's instances.
    #[must_use]
    pub fn constructors(mut self, registry: ConstructorRegistry) -> Self {
        self.constructors = registry;
        self
    }

    #[must_use]
    pub fn writer(mut self, writer: impl ArtifactWriter + 'static) -> Self {
        self.writer = Box::new(writer);
        self
    }

    #[must_use]
    pub fn prompt(mut self, prompt: impl Prompt + 'static) -> Self {
        self.prompt = Box::new(prompt);
        self
    }

    #[must_use]
    pub fn tracer(mut self, tracer: impl SynthTracer + 'static) -> Self {
        self.tracer = Box::new(tracer);
        self
    }

    #[must_use]
    pub fn instrument(self, def: ClassDef) -> InstrumentedClass {
        let synth = Synthesizer::new(&def.name, &self.options, self.constructors.clone());
        let module_path = synth.module_path().to_owned();
        InstrumentedClass {
            def,
            module_path,
            constructors: self.constructors,
            log: RefCell::new(TraceLog::new()),
            synth: RefCell::new(synth),
            writer: RefCell::new(self.writer),
            prompt: RefCell::new(self.prompt),
            tracer: RefCell::new(self.tracer),
        }
    }
}

/// Instruments `def` with default collaborators; see [`Instrumenter`].
#[must_use]
pub fn instrument(def: ClassDef, options: InstrumentOptions) -> InstrumentedClass {
    Instrumenter::new(options).instrument(def)
}

/// A class whose methods record their calls.
///
/// Instrumentation is invisible to callers: [`InstrumentedClass::call`] returns exactly
/// what the method returned and propagates its exceptions unchanged.
pub struct InstrumentedClass {
    def: ClassDef,
    module_path: String,
    constructors: ConstructorRegistry,
    log: RefCell<TraceLog>,
    synth: RefCell<Synthesizer>,
    writer: RefCell<Box<dyn ArtifactWriter>>,
    prompt: RefCell<Box<dyn Prompt>>,
    tracer: RefCell<Box<dyn SynthTracer>>,
}

impl InstrumentedClass {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.def.name
    }

    #[must_use]
    pub fn def(&self) -> &ClassDef {
        &self.def
    }

    /// Calls `Class.method(*args, **kwargs)` and records it.
    ///
    /// Opaque arguments reach the method behind proxies of a fresh tracking window, inside
    /// copied containers. The window closes when the method returns. A failed call
    /// records nothing.
    pub fn call(&self, method: &str, args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Exception> {
        let Some(def) = self.def.methods.get(method) else {
            return Err(Exception::no_attribute(&self.def.name, method));
        };
        let function = FunctionId::new(&self.def.name, method);
        let flag = TrackingFlag::new();
        let args: Vec<Value> = args.iter().map(|arg| track(arg, &flag)).collect();
        let kwargs: Vec<(String, Value)> = kwargs
            .iter()
            .map(|(name, value)| (name.clone(), track(value, &flag)))
            .collect();

        let output = match (def.body)(&args, &kwargs) {
            Ok(output) => track(&output, &flag),
            Err(exc) => {
                flag.close();
                tracing::debug!(%function, error = %exc, "instrumented call raised, nothing recorded");
                return Err(exc);
            }
        };
        flag.close();
        let returned = output.unwrapped();

        let index = {
            let mut log = self.log.borrow_mut();
            log.push(CallTrace::new(function.clone(), def.params.clone(), args, kwargs, output));
            log.len() - 1
        };
        tracing::debug!(%function, index, "call recorded");
        self.tracer.borrow_mut().on_call_recorded(&function, index);

        self.synthesize();
        if let Err(err) = self.flush() {
            tracing::warn!(class = %self.def.name, error = %err, "test module not updated");
        }
        Ok(returned)
    }

    /// Calls the constructor and remembers its arguments for the new instance.
    ///
    /// Later, wherever the instance shows up in a recorded call, it is rendered as this
    /// constructor call. Constructor calls are not test cases themselves.
    pub fn construct(&self, args: &[Value], kwargs: &[(String, Value)]) -> Result<Value, Exception> {
        let Some(constructor) = &self.def.constructor else {
            return Err(Exception::unsupported(&self.def.name, "has no instrumented constructor"));
        };
        let instance = (constructor.body)(args, kwargs)?;
        let Some(object) = instance.as_object() else {
            return Err(Exception::new(
                ExcType::TypeError,
                format!(
                    "{}() constructor must return an object, not '{}'",
                    self.def.name,
                    instance.type_name()
                ),
            ));
        };
        self.constructors.insert(
            object.id(),
            ConstructorCall {
                class_name: self.def.name.clone(),
                module_path: self.module_path.clone(),
                args: args.iter().map(Value::unwrapped).collect(),
                kwargs: kwargs
                    .iter()
                    .map(|(name, value)| (name.clone(), value.unwrapped()))
                    .collect(),
            },
        );
        tracing::debug!(class = %self.def.name, instance = %object.id(), "constructor recorded");
        Ok(instance)
    }

    /// Runs the synthesizer over traces not processed yet.
    fn synthesize(&self) {
        let log = self.log.borrow();
        let mut prompt = self.prompt.borrow_mut();
        let mut tracer = self.tracer.borrow_mut();
        let added = self.synth.borrow_mut().synthesize(&log, &mut **prompt, &mut **tracer);
        tracing::debug!(class = %self.def.name, added, "synthesis pass finished");
    }

    /// Writes the current module through the artifact writer.
    pub fn flush(&self) -> Result<(), SynthError> {
        let synth = self.synth.borrow();
        let module = synth.module_text();
        self.writer.borrow_mut().write_module(&self.def.name, &module)?;
        self.tracer
            .borrow_mut()
            .on_module_written(&self.def.name, synth.cases().len());
        Ok(())
    }

    /// The recorded traces.
    pub fn log(&self) -> Ref<'_, TraceLog> {
        self.log.borrow()
    }

    /// The accepted test cases.
    #[must_use]
    pub fn cases(&self) -> Vec<TestCase> {
        self.synth.borrow().cases().to_vec()
    }

    /// The generated test module as it currently stands.
    #[must_use]
    pub fn module_text(&self) -> String {
        self.synth.borrow().module_text()
    }

    #[must_use]
    pub fn constructors(&self) -> &ConstructorRegistry {
        &self.constructors
    }
}

impl std::fmt::Debug for InstrumentedClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentedClass")
            .field("class", &self.def.name)
            .field("module_path", &self.module_path)
            .field("traces", &self.log.borrow().len())
            .finish_non_exhaustive()
    }
}
