//! Test synthesis: from a trace log to a pytest module.
//!
//! The synthesizer walks the log incrementally. Each new trace is rendered against a fresh
//! [`DependencyTracker`] and becomes one baseline case, unless an identical case exists.
//! In thorough mode every literal positional argument also yields fuzz and metamorphic
//! variants, de-duplicated among themselves and against the baseline calls.

use ahash::{AHashMap, AHashSet};
use indexmap::IndexSet;

use crate::{
    confirm::{Prompt, confirm},
    error::SynthError,
    exception::ExcType,
    options::InstrumentOptions,
    render::render,
    trace::{CallTrace, ConstructorRegistry, TraceLog},
    tracer::SynthTracer,
    tracker::DependencyTracker,
    variants::{VariantKind, variants_of},
};

/// The import every generated module starts with.
pub const MOCK_IMPORT: &str = "from unittest.mock import MagicMock, Mock, call";

/// Identity of a test case: equal keys produce interchangeable cases.
///
/// Argument text alone is not enough, since a mock argument renders as its bare name;
/// the setup and mock assertions carry what the collaborators looked like. Variants key
/// without an expected output, so a real call never collides with a variant. Every
/// baseline also claims its call-only key, which variants of later calls then skip.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TestKey {
    function: String,
    args: Vec<String>,
    kwargs: Vec<(String, String)>,
    class_name: String,
    setup: Vec<String>,
    assertions: Vec<String>,
    expected: Option<String>,
}

/// One emitted test function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    /// `None` for a baseline case.
    pub variant: Option<VariantKind>,
    /// Body statements, without the method indentation.
    pub body: Vec<String>,
}

/// A trace rendered as source fragments.
struct RenderedCall {
    args: Vec<String>,
    kwargs: Vec<(String, String)>,
    output: String,
    setup: Vec<String>,
    assertions: Vec<String>,
    imports: IndexSet<String>,
}

impl RenderedCall {
    fn call_expression(&self, qualname: &str, args: &[String]) -> String {
        let arguments: Vec<String> = args
            .iter()
            .cloned()
            .chain(self.kwargs.iter().map(|(name, value)| format!("{name}={value}")))
            .collect();
        format!("{qualname}({})", arguments.join(", "))
    }
}

/// Accumulates accepted test cases for one instrumented class.
#[derive(Debug)]
pub struct Synthesizer {
    class_name: String,
    module_path: String,
    thorough: bool,
    trusted: bool,
    constructors: ConstructorRegistry,
    seen: AHashSet<TestKey>,
    counters: AHashMap<(String, Option<VariantKind>), usize>,
    /// Number of log entries already processed.
    cursor: usize,
    cases: Vec<TestCase>,
    imports: IndexSet<String>,
}

impl Synthesizer {
    #[must_use]
    pub fn new(class_name: &str, options: &InstrumentOptions, constructors: ConstructorRegistry) -> Self {
        let module_path = options.resolve_module_path(class_name);
        let mut imports = IndexSet::new();
        imports.insert(MOCK_IMPORT.to_owned());
        imports.insert(format!("from {module_path} import {class_name}"));
        Self {
            class_name: class_name.to_owned(),
            module_path,
            thorough: options.thorough,
            trusted: options.trusted,
            constructors,
            seen: AHashSet::new(),
            counters: AHashMap::new(),
            cursor: 0,
            cases: Vec::new(),
            imports,
        }
    }

    #[must_use]
    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    /// Accepted cases, in emission order.
    #[must_use]
    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// Processes the traces appended to `log` since the last run and returns the number
    /// of cases added.
    ///
    /// Traces that cannot be rendered are dropped with a warning; they are not retried.
    pub fn synthesize(&mut self, log: &TraceLog, prompt: &mut dyn Prompt, tracer: &mut dyn SynthTracer) -> usize {
        let before = self.cases.len();
        for trace in log.since(self.cursor) {
            match self.render_trace(trace) {
                Ok(rendered) => self.emit(trace, &rendered, prompt, tracer),
                Err(err) => {
                    tracing::warn!(function = %trace.function(), error = %err, "cannot render trace");
                    tracer.on_render_failed(trace.function(), &err.to_string());
                }
            }
        }
        self.cursor = log.len();
        self.cases.len() - before
    }

    fn render_trace(&self, trace: &CallTrace) -> Result<RenderedCall, SynthError> {
        let mut tracker = DependencyTracker::with_constructors(self.constructors.clone());
        tracker.reserve(&self.class_name);
        let args = trace
            .args()
            .iter()
            .enumerate()
            .map(|(index, arg)| render(arg, &mut tracker, trace.arg_hint(index)))
            .collect::<Result<Vec<_>, _>>()?;
        let mut kwargs = Vec::with_capacity(trace.kwargs().len());
        for (name, value) in trace.kwargs() {
            kwargs.push((name.clone(), render(value, &mut tracker, name)?));
        }
        let output = render(trace.output(), &mut tracker, "expected")?;
        Ok(RenderedCall {
            args,
            kwargs,
            output,
            setup: tracker.setup_lines(),
            assertions: tracker.assertion_lines(),
            imports: tracker.imports().clone(),
        })
    }

    fn key(&self, trace: &CallTrace, rendered: &RenderedCall, args: &[String], expected: Option<&str>) -> TestKey {
        TestKey {
            function: trace.function().qualname(),
            args: args.to_vec(),
            kwargs: rendered.kwargs.clone(),
            class_name: self.class_name.clone(),
            setup: rendered.setup.clone(),
            assertions: if expected.is_some() {
                rendered.assertions.clone()
            } else {
                Vec::new()
            },
            expected: expected.map(str::to_owned),
        }
    }

    fn emit(&mut self, trace: &CallTrace, rendered: &RenderedCall, prompt: &mut dyn Prompt, tracer: &mut dyn SynthTracer) {
        let function = trace.function();
        let qualname = function.qualname();
        let key = self.key(trace, rendered, &rendered.args, Some(&rendered.output));
        if self.seen.contains(&key) {
            tracer.on_duplicate_skipped(function, None);
            return;
        }

        let mut body = rendered.setup.clone();
        body.push(format!(
            "assert {} == {}",
            rendered.output,
            rendered.call_expression(&qualname, &rendered.args)
        ));
        body.extend(rendered.assertions.iter().cloned());

        // rejected keys are remembered too, so the case is never offered again
        let call_key = self.key(trace, rendered, &rendered.args, None);
        self.seen.insert(key);
        self.seen.insert(call_key);
        if !self.trusted {
            let accepted = match confirm(prompt, &body.join("\n")) {
                Ok(accepted) => accepted,
                Err(err) => {
                    tracing::warn!(%function, error = %err, "confirmation failed, rejecting case");
                    false
                }
            };
            if !accepted {
                tracer.on_case_rejected(function);
                return;
            }
        }

        self.imports.extend(rendered.imports.iter().cloned());
        self.push_case(&function.name, None, body, tracer);

        if self.thorough {
            self.emit_variants(trace, rendered, tracer);
        }
    }

    fn emit_variants(&mut self, trace: &CallTrace, rendered: &RenderedCall, tracer: &mut dyn SynthTracer) {
        let function = trace.function();
        let qualname = function.qualname();
        let handled: Vec<String> = ExcType::CATEGORIZED.iter().map(ToString::to_string).collect();
        for (index, arg) in trace.args().iter().enumerate() {
            for (kind, value) in variants_of(arg) {
                let mut args = rendered.args.clone();
                args[index] = value.py_repr();
                let key = self.key(trace, rendered, &args, None);
                if !self.seen.insert(key) {
                    tracer.on_duplicate_skipped(function, Some(kind));
                    continue;
                }
                let mut body = rendered.setup.clone();
                body.push("try:".to_owned());
                body.push(format!("    {}", rendered.call_expression(&qualname, &args)));
                body.push(format!("except ({}):", handled.join(", ")));
                body.push("    pass".to_owned());
                self.push_case(&function.name, Some(kind), body, tracer);
            }
        }
    }

    fn push_case(&mut self, function: &str, variant: Option<VariantKind>, body: Vec<String>, tracer: &mut dyn SynthTracer) {
        let counter = self.counters.entry((function.to_owned(), variant)).or_insert(0);
        *counter += 1;
        let name = match variant {
            None => format!("test_{function}_{counter}"),
            Some(kind) => format!("test_{function}_{kind}_{counter}"),
        };
        tracer.on_case_emitted(&name, variant);
        self.cases.push(TestCase { name, variant, body });
    }

    /// The complete test module for every accepted case.
    #[must_use]
    pub fn module_text(&self) -> String {
        let mut out = String::new();
        for import in &self.imports {
            out.push_str(import);
            out.push('\n');
        }
        out.push_str("\n\n");
        out.push_str(&format!("class Test{}(object):\n", self.class_name));
        if self.cases.is_empty() {
            out.push_str("    pass\n");
        }
        for (position, case) in self.cases.iter().enumerate() {
            if position > 0 {
                out.push('\n');
            }
            out.push_str(&format!("    def {}(self):\n", case.name));
            for line in &case.body {
                out.push_str("        ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}
