use std::io;
use std::path::PathBuf;

use shared::CollectionKind;

use crate::backend::config::BackendKind;
use crate::backend::domain::models::ValidationError;

/// Failures reported by the storage drivers.
///
/// The collection service translates these into `CollectionError` so callers
/// see the same taxonomy whichever backend is active.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error on {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[cfg(feature = "sqlite")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{collection} item '{id}' already exists")]
    Duplicate { collection: CollectionKind, id: String },

    #[error("{collection} item '{id}' not found")]
    NotFound { collection: CollectionKind, id: String },

    /// A single write was refused by validation; nothing was written
    #[error("{collection} item '{id}' is invalid: {source}")]
    Invalid {
        collection: CollectionKind,
        id: String,
        #[source]
        source: ValidationError,
    },

    /// A record in a bulk write failed validation; nothing was written
    #[error("record {index} ('{id}') is invalid: {source}")]
    InvalidRecord {
        index: usize,
        id: String,
        #[source]
        source: ValidationError,
    },

    /// Stored data that cannot be turned back into a record
    #[error("corrupt stored data: {0}")]
    Corrupt(String),

    #[error("the {backend} backend is not available in this build")]
    EngineUnavailable { backend: BackendKind },
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
