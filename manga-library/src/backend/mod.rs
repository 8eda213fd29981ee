//! # Backend Module
//!
//! Storage core of the manga collection manager. Front ends talk to
//! `CollectionService` only:
//! - `config` resolves which backend to use and where the data lives
//! - `domain` holds the service, validation and the record abstraction
//! - `storage` holds the CSV and SQLite drivers behind one trait set
//! - `error` is the error taxonomy callers match on

pub mod config;
pub mod domain;
pub mod error;
pub mod storage;

#[cfg(test)]
pub mod test_utils;

pub use config::{BackendKind, ConfigError, StorageConfig};
pub use domain::models::ValidationError;
pub use domain::{CollectionHandle, CollectionService, MigrationReport};
pub use error::{CollectionError, CollectionResult, Operation};
