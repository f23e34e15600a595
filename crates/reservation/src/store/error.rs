//! Storage error types

use thiserror::Error;

/// Errors raised by store implementations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database driver error
    #[error("Database error: {0}")]
    Database(String),

    /// A write was attempted on a record whose lock this unit of work does not hold
    #[error("Lock not held for {0}")]
    LockNotHeld(String),

    /// Record expected to exist is missing
    #[error("Record not found: {0}")]
    Missing(String),

    /// Stored data could not be decoded
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}
