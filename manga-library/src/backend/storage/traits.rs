//! # Storage Traits
//!
//! This module defines the storage abstraction traits that allow the text and
//! relational backends to be used interchangeably by the domain layer.

use async_trait::async_trait;
use shared::{ItemQuery, LibraryItem, WishlistItem};

use super::error::{StorageError, StorageResult};
use crate::backend::config::BackendKind;
use crate::backend::domain::models::Record;

/// Storage operations for one collection.
///
/// Implemented once per driver and reused for both record shapes through the
/// `Record` trait. Insertion order is the order `store` calls happened in;
/// `update` never changes it.
#[async_trait]
pub trait RecordStorage<R: Record>: Send + Sync {
    /// Every record in insertion order
    async fn load(&self) -> StorageResult<Vec<R>>;

    /// Retrieve a single record by id
    async fn get(&self, id: &str) -> StorageResult<Option<R>>;

    /// Records matching the filter, in the requested order.
    /// Ties are broken by insertion order.
    async fn query(&self, query: &ItemQuery) -> StorageResult<Vec<R>>;

    /// Append a new record. Fails with `Duplicate` if the id is taken.
    async fn store(&self, record: &R) -> StorageResult<()>;

    /// Replace the record with the same id. Fails with `NotFound` if absent.
    async fn update(&self, record: &R) -> StorageResult<()>;

    /// Remove a record. Fails with `NotFound` if absent.
    async fn delete(&self, id: &str) -> StorageResult<()>;

    /// Append `records` after the existing ones in one step.
    ///
    /// Every record is validated first. If any fails, an id repeats within
    /// the batch, or an id is already stored, nothing is written and the
    /// existing records are left as they were.
    async fn store_batch(&self, records: &[R]) -> StorageResult<()>;
}

/// A complete storage backend: both collections plus backend-wide operations
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn library(&self) -> &dyn RecordStorage<LibraryItem>;

    fn wishlist(&self) -> &dyn RecordStorage<WishlistItem>;

    /// Create missing files or tables without touching existing data.
    /// Safe to call on every start.
    async fn ensure_schema(&self) -> StorageResult<()>;

    /// Insert `item` into the library and remove `wishlist_id` from the wishlist.
    ///
    /// The default is two separate steps. If the delete fails after the
    /// insert succeeded, the item exists in both collections and the error
    /// is returned; backends with transactions override this.
    async fn transfer_to_library(&self, wishlist_id: &str, item: &LibraryItem) -> StorageResult<()> {
        if self.wishlist().get(wishlist_id).await?.is_none() {
            return Err(StorageError::NotFound {
                collection: shared::CollectionKind::Wishlist,
                id: wishlist_id.to_string(),
            });
        }
        self.library().store(item).await?;
        self.wishlist().delete(wishlist_id).await
    }

    /// Add both batches to what the backend already holds, used by migration.
    /// A colliding id fails the import with `Duplicate`.
    async fn import(&self, library: &[LibraryItem], wishlist: &[WishlistItem]) -> StorageResult<()> {
        self.library().store_batch(library).await?;
        self.wishlist().store_batch(wishlist).await
    }
}

/// Gate for single writes: the record must pass validation
pub fn check_record<R: Record>(record: &R) -> StorageResult<()> {
    record.validate().map_err(|source| StorageError::Invalid {
        collection: R::COLLECTION,
        id: record.id().to_string(),
        source,
    })
}

/// Checks shared by every `store_batch` implementation: each record valid, ids unique
pub fn check_bulk<R: Record>(records: &[R]) -> StorageResult<()> {
    let mut seen = std::collections::HashSet::new();
    for (index, record) in records.iter().enumerate() {
        record.validate().map_err(|source| StorageError::InvalidRecord {
            index,
            id: record.id().to_string(),
            source,
        })?;
        if !seen.insert(record.id()) {
            return Err(StorageError::Duplicate {
                collection: R::COLLECTION,
                id: record.id().to_string(),
            });
        }
    }
    Ok(())
}
