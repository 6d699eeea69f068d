use thiserror::Error;

/// The error taxonomy shared across the row source, the pipeline, the job
/// registry, and the HTTP surface.
///
/// Each variant corresponds to one of the error kinds in the error handling
/// design: validation errors become 400s, not-found errors become 404s,
/// state errors become 425/400, range errors become 416, and anything else
/// collapses to an internal 500 at the HTTP boundary without leaking its
/// message to the client.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{0}")]
    Validation(String),

    #[error("export {0} not found")]
    NotFound(String),

    #[error("export is {state}: {message}")]
    State { state: String, message: String },

    #[error("range not satisfiable")]
    Range,

    #[error("database error: {0}")]
    Database(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ExportError {
    pub fn state(state: impl Into<String>, message: impl Into<String>) -> Self {
        ExportError::State {
            state: state.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io(err.to_string())
    }
}
