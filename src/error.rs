// ⚠️ Error types for the expense ledger

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExpenseError {
    #[error("Invalid expense: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid month key: {0}")]
    InvalidMonth(String),

    #[error("Unsupported setting: {0}")]
    UnsupportedSetting(String),

    #[error("Import failed: {0}")]
    Import(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Injected or otherwise opaque store failure
    #[error("Store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, ExpenseError>;
