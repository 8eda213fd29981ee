//! # Storage Module
//!
//! Persistence for the two collections. The domain layer only sees the traits
//! in `traits`; the drivers below are chosen at open time.

pub mod csv;
pub mod error;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use traits::{RecordStorage, StorageBackend};
