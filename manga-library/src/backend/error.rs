//! Errors reported by `CollectionService`.
//!
//! Every driver failure is normalized into one of five kinds with the
//! operation and, where known, the record id attached.

use std::fmt;
use std::path::PathBuf;

use shared::CollectionKind;

use crate::backend::config::BackendKind;
use crate::backend::domain::models::ValidationError;
use crate::backend::storage::StorageError;

/// Facade operation during which an error happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Open,
    Add,
    Update,
    Delete,
    Get,
    Query,
    Move,
    Export,
    Migrate,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Open => "open",
            Operation::Add => "add",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Get => "get",
            Operation::Query => "query",
            Operation::Move => "move",
            Operation::Export => "export",
            Operation::Migrate => "migrate",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error("{operation} failed{}: {source}", describe_target(.collection, .id))]
    Validation {
        operation: Operation,
        collection: Option<CollectionKind>,
        id: Option<String>,
        #[source]
        source: ValidationError,
    },

    #[error("{operation} failed: malformed data in {}, line {line}: {message}", .path.display())]
    Parse {
        operation: Operation,
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("the {backend} storage backend is not available in this build")]
    BackendUnavailable { backend: BackendKind },

    #[error("{operation} failed{}: {source}", describe_target(.collection, .id))]
    StorageIo {
        operation: Operation,
        collection: Option<CollectionKind>,
        id: Option<String>,
        #[source]
        source: StorageError,
    },

    #[error("{operation} failed: {collection} item '{id}' not found")]
    NotFound {
        operation: Operation,
        collection: CollectionKind,
        id: String,
    },
}

fn describe_target(collection: &Option<CollectionKind>, id: &Option<String>) -> String {
    match (collection, id) {
        (Some(collection), Some(id)) => format!(" for {} item '{}'", collection, id),
        (Some(collection), None) => format!(" on {}", collection),
        (None, Some(id)) => format!(" for '{}'", id),
        (None, None) => String::new(),
    }
}

impl CollectionError {
    pub fn validation(
        operation: Operation,
        collection: Option<CollectionKind>,
        id: Option<&str>,
        source: ValidationError,
    ) -> Self {
        CollectionError::Validation {
            operation,
            collection,
            id: id.map(str::to_string),
            source,
        }
    }

    pub fn not_found(operation: Operation, collection: CollectionKind, id: &str) -> Self {
        CollectionError::NotFound {
            operation,
            collection,
            id: id.to_string(),
        }
    }

    /// Attach context to a driver error and map it onto the public taxonomy
    pub fn from_storage(
        operation: Operation,
        collection: Option<CollectionKind>,
        id: Option<&str>,
        error: StorageError,
    ) -> Self {
        match error {
            StorageError::Parse {
                path,
                line,
                message,
            } => CollectionError::Parse {
                operation,
                path,
                line,
                message,
            },
            StorageError::NotFound { collection, id } => CollectionError::NotFound {
                operation,
                collection,
                id,
            },
            StorageError::Duplicate { collection, id } => CollectionError::Validation {
                operation,
                collection: Some(collection),
                id: Some(id),
                source: ValidationError::new("id", "already exists"),
            },
            StorageError::Invalid {
                collection,
                id,
                source,
            } => CollectionError::Validation {
                operation,
                collection: Some(collection),
                id: Some(id),
                source,
            },
            StorageError::InvalidRecord { id, source, .. } => CollectionError::Validation {
                operation,
                collection,
                id: Some(id),
                source,
            },
            StorageError::EngineUnavailable { backend } => {
                CollectionError::BackendUnavailable { backend }
            }
            other => CollectionError::StorageIo {
                operation,
                collection,
                id: id.map(str::to_string),
                source: other,
            },
        }
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            CollectionError::Validation { operation, .. }
            | CollectionError::Parse { operation, .. }
            | CollectionError::StorageIo { operation, .. }
            | CollectionError::NotFound { operation, .. } => Some(*operation),
            CollectionError::BackendUnavailable { .. } => None,
        }
    }
}

pub type CollectionResult<T> = Result<T, CollectionError>;
