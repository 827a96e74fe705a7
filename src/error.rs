use std::path::PathBuf;

use thiserror::Error;

use crate::sheets::SheetsError;
use crate::store::StoreError;

/// Fatal errors: any of these ends the invocation with a non-zero exit code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("another instance is already running (lock file {path:?} exists)")]
    LockContention { path: PathBuf },

    #[error("failed to acquire instance lock: {0}")]
    Lock(#[source] std::io::Error),

    #[error("database connection failed: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("ledger error: {0}")]
    Store(#[from] StoreError),

    #[error("spreadsheet error: {0}")]
    Sheets(#[from] SheetsError),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("{0}")]
    Usage(String),
}

impl AppError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_)
            | AppError::LockContention { .. }
            | AppError::Lock(_)
            | AppError::Connection(_)
            | AppError::Store(_)
            | AppError::Sheets(_)
            | AppError::Logging(_)
            | AppError::Usage(_) => 1,
        }
    }

    /// Short code used in the final log line.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::LockContention { .. } => "LOCK_CONTENTION",
            AppError::Lock(_) => "LOCK_ERROR",
            AppError::Connection(_) => "CONNECTION_ERROR",
            AppError::Store(_) => "LEDGER_ERROR",
            AppError::Sheets(_) => "SHEETS_ERROR",
            AppError::Logging(_) => "LOGGING_ERROR",
            AppError::Usage(_) => "USAGE_ERROR",
        }
    }
}
