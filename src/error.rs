use thiserror::Error;
use tracing::{error, warn};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation { message: String },

    #[error("Task not found")]
    NotFound,

    #[error("{message}")]
    Conflict { message: String },

    #[error("database error: {message}")]
    Database { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "taskflow::validation", %message, "validation error");
        AppError::Validation { message }
    }

    pub fn not_found() -> Self {
        warn!(target: "taskflow::store", "resource not found");
        AppError::NotFound
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "taskflow::engine", %message, "reschedule conflict");
        AppError::Conflict { message }
    }

    pub fn database(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "taskflow::store", %message, "database error");
        AppError::Database { message }
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "taskflow::other", %message, "unexpected error");
        AppError::Other(message)
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        use rusqlite::Error::{QueryReturnedNoRows, SqliteFailure};
        use rusqlite::ErrorCode;

        match &error {
            QueryReturnedNoRows => AppError::not_found(),
            SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
                AppError::conflict("unique constraint violated")
            }
            _ => {
                tracing::error!(target: "taskflow::store", error = ?error, "sqlite error");
                AppError::database(error.to_string())
            }
        }
    }
}
