use thiserror::Error;

/// Boxed error from an external collaborator (Vulkan, the loader, the window system).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse classification of a [`BuildError`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    /// An artifact was fetched before any step produced it.
    MissingKey,
    /// An artifact exists but holds a different type than requested.
    TypeMismatch,
    /// The hardware offers no viable configuration. Not retryable.
    HardwareUnsupported,
    /// The external graphics API rejected a request.
    ExternalResourceFailure,
}

/// Failure of a single build step.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("artifact `{key}` has not been produced")]
    MissingKey { key: String },

    #[error("artifact `{key}` holds `{found}`, expected `{expected}`")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("hardware unsupported: {0}")]
    HardwareUnsupported(String),

    #[error("{operation} failed")]
    ExternalResourceFailure {
        operation: &'static str,
        #[source]
        source: BoxError,
    },
}

impl BuildError {
    pub fn missing_key(key: impl Into<String>) -> Self {
        Self::MissingKey { key: key.into() }
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::HardwareUnsupported(reason.into())
    }

    /// Wraps an external failure without altering it.
    pub fn external(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::ExternalResourceFailure {
            operation,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingKey { .. } => ErrorKind::MissingKey,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::HardwareUnsupported(_) => ErrorKind::HardwareUnsupported,
            Self::ExternalResourceFailure { .. } => ErrorKind::ExternalResourceFailure,
        }
    }
}

/// `anyhow::Context`-style adapter that tags an external error with the
/// operation that produced it.
pub trait ExternalContext<T> {
    fn external(self, operation: &'static str) -> Result<T, BuildError>;
}

impl<T, E> ExternalContext<T> for Result<T, E>
where
    E: Into<BoxError>,
{
    fn external(self, operation: &'static str) -> Result<T, BuildError> {
        self.map_err(|e| BuildError::external(operation, e))
    }
}

/// Failure of a whole pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline has already been built")]
    AlreadyBuilt,

    #[error("step #{index} `{name}` failed")]
    Step {
        index: usize,
        name: String,
        #[source]
        source: BuildError,
    },
}

impl PipelineError {
    /// Returns the step failure, if this error came from a step.
    pub fn build_error(&self) -> Option<&BuildError> {
        match self {
            Self::Step { source, .. } => Some(source),
            Self::AlreadyBuilt => None,
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.build_error().map(BuildError::kind)
    }
}
