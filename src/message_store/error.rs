use thiserror::Error;

/// Result type for message store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error types for message store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Invalid configuration - malformed connection string, bad table name
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Connection error - database unreachable or authentication failure
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Database error - SQL errors, constraint violations
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Pool error - connection pool issues
    #[error("Pool error: {0}")]
    PoolError(String),

    /// The store has been closed and accepts no more writes
    #[error("Message store is closed")]
    Closed,
}

/// Convert tokio-postgres errors to store errors
impl From<tokio_postgres::Error> for StoreError {
    fn from(err: tokio_postgres::Error) -> Self {
        if let Some(db_error) = err.as_db_error() {
            return StoreError::DatabaseError(format!(
                "{}: {}",
                db_error.code().code(),
                db_error.message()
            ));
        }

        StoreError::DatabaseError(format!("{:?}", err))
    }
}

/// Convert deadpool errors to store errors
impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        match err {
            deadpool_postgres::PoolError::Closed => StoreError::Closed,
            other => StoreError::PoolError(other.to_string()),
        }
    }
}

/// Convert deadpool build errors to store errors
impl From<deadpool_postgres::BuildError> for StoreError {
    fn from(err: deadpool_postgres::BuildError) -> Self {
        StoreError::ConnectionError(err.to_string())
    }
}
