#![doc = include_str!("../../../README.md")]
#![expect(clippy::must_use_candidate, reason = "accessors are not all marked must_use")]

pub mod capability;
mod confirm;
mod error;
mod exception;
mod literal;
mod object;
mod options;
mod proxy;
mod recorder;
pub mod render;
mod sink;
mod synth;
mod trace;
pub mod tracer;
mod tracker;
mod types;
mod value;
mod variants;

pub use crate::{
    confirm::{ConfirmError, Prompt, ScriptedPrompt, StdinPrompt, confirm},
    error::{RenderError, SynthError},
    exception::{ExcType, Exception},
    literal::{LiteralError, parse_literal},
    object::{ObjectId, ObjectRef},
    options::{InstrumentOptions, snake_case},
    proxy::{
        AttributeRead, AttributeWrite, InteractionHistory, OperationRecord, Proxy, SuspendGuard, TrackingFlag,
        TrackingState, track,
    },
    recorder::{ClassDef, InstrumentedClass, Instrumenter, MethodDef, instrument},
    sink::{ArtifactWriter, CollectStringWriter, FileWriter, NoWriter},
    synth::{MOCK_IMPORT, Synthesizer, TestCase},
    trace::{CallTrace, ConstructorCall, ConstructorRegistry, FunctionId, TraceLog},
    tracer::{LogTracer, NoopTracer, RecordingTracer, SynthTracer, TraceEvent},
    tracker::{DependencyTracker, is_identifier, sanitize},
    types::{Function, Record},
    value::{DictPairs, Value, string_repr},
    variants::{VariantKind, fuzz_values, metamorphic_values, variants_of},
};
