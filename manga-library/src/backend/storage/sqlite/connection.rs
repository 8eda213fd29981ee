use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::storage::error::{StorageError, StorageResult};

pub const DATABASE_FILE_NAME: &str = "collection.db";

/// How long a statement waits on a lock held by another process
const BUSY_TIMEOUT: Duration = Duration::from_millis(1500);

/// DbConnection owns the pool for the collection database
#[derive(Clone)]
pub struct DbConnection {
    pool: SqlitePool,
    path: PathBuf,
}

impl DbConnection {
    /// Open (creating if needed) `collection.db` inside `data_dir`.
    ///
    /// The pool holds a single connection, so writes from this process are
    /// serialized.
    pub async fn open(data_dir: &Path) -> StorageResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StorageError::io(data_dir, e))?;
        let path = data_dir.join(DATABASE_FILE_NAME);

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        info!("Opened database {}", path.display());
        Ok(Self { pool, path })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
