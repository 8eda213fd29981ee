//! # SQLite Storage Module
//!
//! Relational backend backed by a single `collection.db` file. Only compiled
//! with the `sqlite` feature.

pub mod connection;
pub mod conversions;
pub mod repository;
pub mod schema;
pub mod sqlite_backend;

pub use connection::{DbConnection, DATABASE_FILE_NAME};
pub use repository::SqliteRepository;
pub use sqlite_backend::SqliteBackend;
