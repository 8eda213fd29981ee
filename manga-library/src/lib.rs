pub mod backend;

pub use backend::{
    BackendKind, CollectionError, CollectionHandle, CollectionService, ConfigError,
    MigrationReport, Operation, StorageConfig, ValidationError,
};
