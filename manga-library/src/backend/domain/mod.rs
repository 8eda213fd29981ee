//! # Domain Module
//!
//! Business rules of the collection manager, independent of how records are
//! stored.

pub mod collection_service;
pub mod migration_service;
pub mod models;

pub use collection_service::{CollectionHandle, CollectionService};
pub use migration_service::MigrationReport;
