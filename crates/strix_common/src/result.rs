//! Common result and error types for the Strix workspace.

/// The standard result type for fallible internal operations.
///
/// `Err` indicates an unrecoverable internal error (a bug in the placer or a
/// collaborator breaking its contract), not a user-facing problem. User-facing
/// problems are reported through [`DiagnosticSink`](crate::DiagnosticSink).
pub type StrixResult<T> = Result<T, InternalError>;

/// An internal error indicating a broken invariant, not a user input problem.
#[derive(Debug, thiserror::Error)]
#[error("internal placer error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}
