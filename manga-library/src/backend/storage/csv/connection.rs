//! # CSV Connection
//!
//! Owns the data directory layout for the text backend:
//!
//! ```text
//! <data_dir>/
//! ├── config.yaml      (optional, never written here)
//! ├── library.csv
//! └── wishlist.csv
//! ```

use log::{debug, info};
use shared::CollectionKind;
use std::path::{Path, PathBuf};

use crate::backend::storage::error::{StorageError, StorageResult};

pub const LIBRARY_FILE_NAME: &str = "library.csv";
pub const WISHLIST_FILE_NAME: &str = "wishlist.csv";

/// Handle to the directory holding the CSV files.
///
/// Creating one touches nothing on disk; `ensure_files` does.
#[derive(Debug, Clone)]
pub struct CsvConnection {
    base_directory: PathBuf,
}

impl CsvConnection {
    pub fn new(base_directory: impl Into<PathBuf>) -> Self {
        Self {
            base_directory: base_directory.into(),
        }
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Path of the file backing a collection
    pub fn file_path(&self, collection: CollectionKind) -> PathBuf {
        let name = match collection {
            CollectionKind::Library => LIBRARY_FILE_NAME,
            CollectionKind::Wishlist => WISHLIST_FILE_NAME,
        };
        self.base_directory.join(name)
    }

    /// Create the data directory and a header-only file for each missing
    /// collection. Existing files are left alone.
    pub fn ensure_files(&self, headers: &[(CollectionKind, &[&str])]) -> StorageResult<()> {
        if !self.base_directory.exists() {
            std::fs::create_dir_all(&self.base_directory)
                .map_err(|e| StorageError::io(&self.base_directory, e))?;
            info!("Created data directory {}", self.base_directory.display());
        }

        for (collection, columns) in headers {
            let path = self.file_path(*collection);
            if path.exists() {
                continue;
            }
            let header = format!("{}\n", columns.join(","));
            std::fs::write(&path, header).map_err(|e| StorageError::io(&path, e))?;
            debug!("Created {} file {}", collection, path.display());
        }

        Ok(())
    }
}
