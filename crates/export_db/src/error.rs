use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

/// Errors surfaced by the row source and connection pool.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("invalid database url: {0}")]
    InvalidUrl(String),

    #[error("cancelled")]
    Cancelled,
}

impl From<DbError> for export_protocol::ExportError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Cancelled => export_protocol::ExportError::state("cancelled", "export cancelled"),
            other => export_protocol::ExportError::Database(other.to_string()),
        }
    }
}
