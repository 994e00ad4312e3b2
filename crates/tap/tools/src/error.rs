use tap_types::{StorageError, TapError};
use thiserror::Error;

pub type ToolOutcome<T> = Result<T, ToolError>;

/// Why a tool call did not produce a value.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("could not encode tool output: {0}")]
    Encode(String),

    #[error(transparent)]
    Tap(#[from] TapError),
}

impl ToolError {
    /// Tag carried in the failed result. Argument problems share the
    /// `InvalidInput` tag with the core's own input validation.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "UnknownTool",
            Self::InvalidArguments(_) => "InvalidInput",
            Self::NotConfigured(_) => "NotConfigured",
            Self::Encode(_) => "Internal",
            Self::Tap(e) => e.kind(),
        }
    }
}

impl From<StorageError> for ToolError {
    fn from(err: StorageError) -> Self {
        Self::Tap(err.into())
    }
}

