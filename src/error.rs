use thiserror::Error;

use crate::models::ParameterField;

/// Local precondition failures. These never reach the network.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("no video files")]
    NoVideoFiles,

    #[error("exactly 4 videos required")]
    WrongFileCount { found: usize },

    #[error("missing required parameters")]
    MissingParameters { missing: Vec<ParameterField> },

    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    /// Only raised when strict parameter checking is enabled.
    #[error("parameter {field} is not a number: {value:?}")]
    NotNumeric { field: ParameterField, value: String },
}

/// Errors from mutating the selected file set.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FileSetError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("index {index} out of bounds for {len} selected files")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// Terminal outcome of a failed submission, reduced to one readable message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("a submission is already in progress")]
    AlreadyInProgress,

    /// Upload request failed; carries the service message or a fallback.
    #[error("{0}")]
    Upload(String),

    /// Process request failed; uploaded files stay on the server.
    #[error("{0}")]
    Processing(String),
}

impl SubmitError {
    /// Whether the error happened before any request was sent.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::AlreadyInProgress)
    }
}
