use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Player not found: {0}")]
    NotFound(String),

    #[error("Database backend unavailable")]
    BackendUnavailable,

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Schema migration failed: {0}")]
    SchemaMigrationFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Query execution error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Errors that the connection supervisor absorbs into backoff rather
    /// than reporting as a failed statement.
    pub fn is_connection_loss(&self) -> bool {
        match self {
            StoreError::BackendUnavailable => true,
            StoreError::Sql(err) => matches!(
                err,
                sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }
}
