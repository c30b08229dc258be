//! Synthesis tracing infrastructure.
//!
//! The [`SynthTracer`] trait defines hook points at the key events of recording and test
//! synthesis. Concrete implementations collect different kinds of data:
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Does nothing (default) |
//! | [`LogTracer`] | Forwards every event to `tracing` |
//! | [`RecordingTracer`] | Keeps every event for later inspection |
//!
//! # Usage
//!
//! ```
//! use testinprod::{ClassDef, InstrumentOptions, Instrumenter, Value, tracer::RecordingTracer};
//!
//! let class = ClassDef::new("Calculator").method("add", ["a", "b"], |args, _| {
//!     let (Value::Int(a), Value::Int(b)) = (&args[0], &args[1]) else {
//!         return Ok(Value::None);
//!     };
//!     Ok(Value::Int(a + b))
//! });
//! let calculator = Instrumenter::new(InstrumentOptions::default())
//!     .tracer(RecordingTracer::new())
//!     .instrument(class);
//! calculator.call("add", &[Value::Int(2), Value::Int(3)], &[]).unwrap();
//! ```

use std::{cell::RefCell, rc::Rc};

use crate::{trace::FunctionId, variants::VariantKind};

/// Event emitted while recording calls and synthesizing tests.
///
/// Used by [`RecordingTracer`] to capture the full history of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A successful call was appended to the trace log.
    CallRecorded {
        function: FunctionId,
        /// Position of the trace in the class's log.
        index: usize,
    },
    /// A test case was added to the module.
    CaseEmitted {
        name: String,
        /// `None` for a baseline case.
        variant: Option<VariantKind>,
    },
    /// A case was skipped because an identical one exists.
    DuplicateSkipped {
        function: FunctionId,
        variant: Option<VariantKind>,
    },
    /// A baseline case was rejected during confirmation.
    CaseRejected { function: FunctionId },
    /// A trace could not be rendered and was dropped.
    RenderFailed { function: FunctionId, message: String },
    /// The module text was handed to the artifact writer.
    ModuleWritten { class_name: String, cases: usize },
}

/// Trait for synthesis tracing.
///
/// All methods have default no-op implementations, so [`NoopTracer`] requires zero lines
/// of code. Implementations only override the hooks they care about.
pub trait SynthTracer: std::fmt::Debug {
    /// Called after a trace is appended to the log.
    fn on_call_recorded(&mut self, _function: &FunctionId, _index: usize) {}

    /// Called when a case is accepted into the module.
    fn on_case_emitted(&mut self, _name: &str, _variant: Option<VariantKind>) {}

    /// Called when a case is dropped because its key was already seen.
    fn on_duplicate_skipped(&mut self, _function: &FunctionId, _variant: Option<VariantKind>) {}

    /// Called when confirmation rejects a baseline case (including channel failures).
    fn on_case_rejected(&mut self, _function: &FunctionId) {}

    /// Called when a trace is dropped because it cannot be rendered.
    fn on_render_failed(&mut self, _function: &FunctionId, _message: &str) {}

    /// Called after the module text has been written.
    fn on_module_written(&mut self, _class_name: &str, _cases: usize) {}
}

/// A tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl SynthTracer for NoopTracer {}

/// Tracer that forwards every event to the `tracing` macros.
///
/// Routine events log at `debug`, dropped cases at `info` and render failures at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracer;

impl SynthTracer for LogTracer {
    fn on_call_recorded(&mut self, function: &FunctionId, index: usize) {
        tracing::debug!(%function, index, "call recorded");
    }

    fn on_case_emitted(&mut self, name: &str, variant: Option<VariantKind>) {
        let variant = variant.map_or("baseline", Into::into);
        tracing::debug!(name, variant, "test case emitted");
    }

    fn on_duplicate_skipped(&mut self, function: &FunctionId, variant: Option<VariantKind>) {
        let variant = variant.map_or("baseline", Into::into);
        tracing::debug!(%function, variant, "duplicate test case skipped");
    }

    fn on_case_rejected(&mut self, function: &FunctionId) {
        tracing::info!(%function, "test case rejected");
    }

    fn on_render_failed(&mut self, function: &FunctionId, message: &str) {
        tracing::warn!(%function, message, "trace dropped");
    }

    fn on_module_written(&mut self, class_name: &str, cases: usize) {
        tracing::debug!(class_name, cases, "test module updated");
    }
}

/// Tracer that records all events, for tests and post-mortem analysis.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
    /// Optional limit on number of events recorded.
    limit: Option<usize>,
}

impl RecordingTracer {
    /// Creates a new recording tracer with no event limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new recording tracer that stops recording after `limit` events.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            events: Vec::with_capacity(limit.min(1024)),
            limit: Some(limit),
        }
    }

    /// Returns the recorded events.
    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Consumes the tracer and returns the recorded events.
    #[must_use]
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }

    fn push(&mut self, event: TraceEvent) {
        if self.limit.is_none_or(|limit| self.events.len() < limit) {
            self.events.push(event);
        }
    }
}

impl SynthTracer for RecordingTracer {
    fn on_call_recorded(&mut self, function: &FunctionId, index: usize) {
        self.push(TraceEvent::CallRecorded {
            function: function.clone(),
            index,
        });
    }

    fn on_case_emitted(&mut self, name: &str, variant: Option<VariantKind>) {
        self.push(TraceEvent::CaseEmitted {
            name: name.to_owned(),
            variant,
        });
    }

    fn on_duplicate_skipped(&mut self, function: &FunctionId, variant: Option<VariantKind>) {
        self.push(TraceEvent::DuplicateSkipped {
            function: function.clone(),
            variant,
        });
    }

    fn on_case_rejected(&mut self, function: &FunctionId) {
        self.push(TraceEvent::CaseRejected {
            function: function.clone(),
        });
    }

    fn on_render_failed(&mut self, function: &FunctionId, message: &str) {
        self.push(TraceEvent::RenderFailed {
            function: function.clone(),
            message: message.to_owned(),
        });
    }

    fn on_module_written(&mut self, class_name: &str, cases: usize) {
        self.push(TraceEvent::ModuleWritten {
            class_name: class_name.to_owned(),
            cases,
        });
    }
}

/// A shared tracer: the caller keeps a clone of the handle to inspect it afterwards.
impl<T: SynthTracer> SynthTracer for Rc<RefCell<T>> {
    fn on_call_recorded(&mut self, function: &FunctionId, index: usize) {
        self.borrow_mut().on_call_recorded(function, index);
    }

    fn on_case_emitted(&mut self, name: &str, variant: Option<VariantKind>) {
        self.borrow_mut().on_case_emitted(name, variant);
    }

    fn on_duplicate_skipped(&mut self, function: &FunctionId, variant: Option<VariantKind>) {
        self.borrow_mut().on_duplicate_skipped(function, variant);
    }

    fn on_case_rejected(&mut self, function: &FunctionId) {
        self.borrow_mut().on_case_rejected(function);
    }

    fn on_render_failed(&mut self, function: &FunctionId, message: &str) {
        self.borrow_mut().on_render_failed(function, message);
    }

    fn on_module_written(&mut self, class_name: &str, cases: usize) {
        self.borrow_mut().on_module_written(class_name, cases);
    }
}
