use std::{fmt, io};

/// A value that cannot be turned into test source.
///
/// Fatal for the rendering pass it occurs in: the synthesizer drops the whole case rather
/// than emit a malformed literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// An opaque object that was never observed through a proxy and has no known
    /// constructor call.
    Unrenderable { class_name: String },
    /// A mocked object whose recorded interactions lead back to itself.
    Cyclic { class_name: String },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrenderable { class_name } => {
                write!(f, "cannot render '{class_name}' object: no recorded interactions or constructor")
            }
            Self::Cyclic { class_name } => {
                write!(f, "cannot render '{class_name}' object: its interactions refer back to itself")
            }
        }
    }
}

impl std::error::Error for RenderError {}

/// Error type for test synthesis, separating failures by pipeline stage.
#[derive(Debug)]
pub enum SynthError {
    /// A value of the trace could not be rendered.
    Render(RenderError),
    /// The generated module could not be persisted.
    Io(io::Error),
}

impl fmt::Display for SynthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render(error) => write!(f, "render error: {error}"),
            Self::Io(error) => write!(f, "failed to write test module: {error}"),
        }
    }
}

impl std::error::Error for SynthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render(error) => Some(error),
            Self::Io(error) => Some(error),
        }
    }
}

impl From<RenderError> for SynthError {
    fn from(error: RenderError) -> Self {
        Self::Render(error)
    }
}

impl From<io::Error> for SynthError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}
