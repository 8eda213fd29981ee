use async_trait::async_trait;
use log::info;
use shared::{LibraryItem, WishlistItem};
use std::path::Path;

use super::connection::DbConnection;
use super::repository::{delete_record, insert_all, insert_record, SqliteRepository};
use super::schema::ensure_table;
use crate::backend::config::BackendKind;
use crate::backend::storage::error::StorageResult;
use crate::backend::storage::traits::{check_bulk, RecordStorage, StorageBackend};

/// Relational backend: both collections in one SQLite database
pub struct SqliteBackend {
    connection: DbConnection,
    library: SqliteRepository<LibraryItem>,
    wishlist: SqliteRepository<WishlistItem>,
}

impl SqliteBackend {
    pub fn new(connection: DbConnection) -> Self {
        let library = SqliteRepository::new(connection.pool().clone());
        let wishlist = SqliteRepository::new(connection.pool().clone());
        Self {
            connection,
            library,
            wishlist,
        }
    }

    pub async fn open(data_dir: &Path) -> StorageResult<Self> {
        Ok(Self::new(DbConnection::open(data_dir).await?))
    }

    pub fn connection(&self) -> &DbConnection {
        &self.connection
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    fn library(&self) -> &dyn RecordStorage<LibraryItem> {
        &self.library
    }

    fn wishlist(&self) -> &dyn RecordStorage<WishlistItem> {
        &self.wishlist
    }

    async fn ensure_schema(&self) -> StorageResult<()> {
        ensure_table::<LibraryItem>(self.connection.pool()).await?;
        ensure_table::<WishlistItem>(self.connection.pool()).await?;
        Ok(())
    }

    /// Delete and insert commit together or not at all
    async fn transfer_to_library(&self, wishlist_id: &str, item: &LibraryItem) -> StorageResult<()> {
        let mut tx = self.connection.pool().begin().await?;
        delete_record::<WishlistItem>(&mut *tx, wishlist_id).await?;
        insert_record(&mut *tx, item).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Both batches are added in one transaction. Existing rows stay; a
    /// colliding id rolls the whole import back.
    async fn import(&self, library: &[LibraryItem], wishlist: &[WishlistItem]) -> StorageResult<()> {
        check_bulk(library)?;
        check_bulk(wishlist)?;

        let mut tx = self.connection.pool().begin().await?;
        insert_all(&mut *tx, library).await?;
        insert_all(&mut *tx, wishlist).await?;
        tx.commit().await?;

        info!(
            "Imported {} library and {} wishlist records into {}",
            library.len(),
            wishlist.len(),
            self.connection.path().display()
        );
        Ok(())
    }
}
