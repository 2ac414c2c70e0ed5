use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Invalid data in {table}: {message}")]
    InvalidData { table: String, message: String },
}

impl StorageError {
    pub fn invalid_data(table: &str, message: impl Into<String>) -> Self {
        Self::InvalidData {
            table: table.to_string(),
            message: message.into(),
        }
    }

    /// True for SQLITE_BUSY / SQLITE_LOCKED, i.e. another connection holds the
    /// write lock and the operation may succeed if retried.
    pub fn is_busy(&self) -> bool {
        match self {
            StorageError::Database(sqlx::Error::Database(db_err)) => {
                let primary_code = db_err
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);
                matches!(primary_code, Some(5) | Some(6))
                    || db_err.message().contains("database is locked")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
