//! The module contains the errors the engine can return.
//!
//! Validation failures ([`NotFound`], [`InvalidArgument`], [`AlreadyExists`])
//! are detected before any write. [`TransactionFailed`] means the whole
//! atomic unit was rolled back, so the operation is safe to retry as-is.
//!
//! [`NotFound`]: EngineError::NotFound
//! [`InvalidArgument`]: EngineError::InvalidArgument
//! [`AlreadyExists`]: EngineError::AlreadyExists
//! [`TransactionFailed`]: EngineError::TransactionFailed
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    /// Invoice number allocation ran out of collision retries. Should never
    /// happen under normal load; indicates a deeper contention problem.
    #[error("invoice sequence exhausted for prefix \"{0}\"")]
    AllocationExhausted(String),
    /// The atomic unit could not be committed; nothing partial was persisted.
    #[error("transaction failed: {0}")]
    TransactionFailed(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::InvalidArgument(a), Self::InvalidArgument(b)) => a == b,
            (Self::AlreadyExists(a), Self::AlreadyExists(b)) => a == b,
            (Self::AllocationExhausted(a), Self::AllocationExhausted(b)) => a == b,
            (Self::TransactionFailed(a), Self::TransactionFailed(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
