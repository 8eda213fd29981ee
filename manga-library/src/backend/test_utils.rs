//! Test utilities module for automatic cleanup and consistent test infrastructure
//!
//! This module provides RAII-based cleanup that guarantees test data is removed
//! even if tests panic or fail.

use anyhow::Result;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::backend::config::{BackendKind, StorageConfig};
use crate::backend::domain::CollectionService;

/// Test environment that provides a temporary data directory and an open
/// service that are cleaned up when the environment is dropped.
pub struct TestEnvironment {
    pub service: CollectionService,
    /// Data directory path for inspecting files directly
    pub base_path: PathBuf,
    _temp_dir: TempDir, // Keep alive to prevent cleanup
}

impl TestEnvironment {
    /// Create a new test environment for the given backend
    pub async fn new(backend: BackendKind) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let base_path = temp_dir.path().to_path_buf();
        let service = CollectionService::open(StorageConfig::new(backend, &base_path)).await?;
        Ok(Self {
            service,
            base_path,
            _temp_dir: temp_dir,
        })
    }
}
