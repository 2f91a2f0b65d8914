use std::sync::{MutexGuard, PoisonError};

use thiserror::Error;

/// Top-level error returned by the uniqueness guard.
#[derive(Error, Debug)]
pub enum IdError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Sequence error: {0}")]
    Sequence(#[from] SequenceError),

    #[error("Compose error: {0}")]
    Compose(#[from] ComposeError),

    #[error("Identifier {custom_id:?} already exists in collection {collection}")]
    DuplicateIdentifier {
        collection: String,
        custom_id: String,
    },

    #[error("Failed to generate a unique identifier for collection {collection} after {attempts} attempts")]
    IdentifierExhausted { collection: String, attempts: u32 },
}

/// Coarse classification used by callers to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Infrastructure fault; the caller may retry later.
    Transient,
    /// The collection or request is misconfigured.
    Configuration,
    /// The identifier collided with an existing record.
    Conflict,
}

impl IdError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IdError::Compose(_) => ErrorKind::Configuration,
            IdError::Storage(StorageError::InvalidInput(_)) => ErrorKind::Configuration,
            IdError::Storage(StorageError::UniqueViolation { .. }) => ErrorKind::Conflict,
            IdError::Storage(_) => ErrorKind::Transient,
            // A counter at its ceiling never recovers on its own.
            IdError::Sequence(SequenceError::Overflow(_)) => ErrorKind::Configuration,
            IdError::Sequence(SequenceError::StorageUnavailable(_)) => ErrorKind::Transient,
            IdError::DuplicateIdentifier { .. } | IdError::IdentifierExhausted { .. } => {
                ErrorKind::Conflict
            }
        }
    }
}

/// Extension trait for converting lock errors to StorageError.
pub trait LockResultExt<T> {
    /// Converts a lock error to a StorageError.
    fn map_lock_err(self) -> Result<T, StorageError>;
}

impl<'a, T> LockResultExt<MutexGuard<'a, T>>
    for Result<MutexGuard<'a, T>, PoisonError<MutexGuard<'a, T>>>
{
    #[inline]
    fn map_lock_err(self) -> Result<MutexGuard<'a, T>, StorageError> {
        self.map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("RocksDB error: {0}")]
    RocksDb(String),

    #[error("Identifier {custom_id:?} already exists in collection {collection}")]
    UniqueViolation {
        collection: String,
        custom_id: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl StorageError {
    /// Returns true if this error is a uniqueness-constraint violation.
    #[inline]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StorageError::UniqueViolation { .. })
    }
}

#[derive(Error, Debug)]
pub enum SequenceError {
    #[error("Sequence storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Sequence overflow for {0}")]
    Overflow(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ComposeError {
    #[error("Custom identifier template is disabled")]
    TemplateDisabled,

    #[error("Template has a sequence element but no sequence number was provided")]
    MissingSequence,

    #[error("Generated identifier is empty")]
    EmptyResult,
}
