//! Collection service: the single entry point to the stored collections.
//!
//! Callers never see a driver. They open a `CollectionService` from a
//! `StorageConfig` and work through per-collection handles plus the
//! cross-collection operations (move, snapshot, migration).
//!
//! ## Rules enforced here
//!
//! - Records are validated before any driver is called
//! - Missing ids on `get`, `update` and `delete` are `NotFound`
//! - `update` keeps the stored `created_at`
//! - Moving a wishlist item never loses it: on failure it is either untouched
//!   or present in both collections

use chrono::Utc;
use log::{info, warn};
use shared::{
    CollectionKind, CollectionSnapshot, ItemQuery, ItemStatus, LibraryItem, SortOrder, WishlistItem,
};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::backend::config::{BackendKind, StorageConfig};
use crate::backend::domain::models::Record;
use crate::backend::error::{CollectionError, CollectionResult, Operation};
use crate::backend::storage::csv::{CsvBackend, CsvConnection};
use crate::backend::storage::{RecordStorage, StorageBackend, StorageError, StorageResult};

/// Facade over whichever storage backend is configured
#[derive(Clone)]
pub struct CollectionService {
    pub(super) backend: Arc<dyn StorageBackend>,
    config: StorageConfig,
}

impl CollectionService {
    /// Open the configured backend and make sure its files or tables exist
    pub async fn open(config: StorageConfig) -> CollectionResult<Self> {
        let available = config.backend.engine_available();
        Self::open_with_engine(config, available).await
    }

    /// `open` with engine availability passed in, so the unavailable path can
    /// be exercised in builds that do include the engine
    pub(crate) async fn open_with_engine(
        config: StorageConfig,
        engine_available: bool,
    ) -> CollectionResult<Self> {
        if !engine_available {
            warn!("Storage backend '{}' requested but not available", config.backend);
            return Err(CollectionError::BackendUnavailable {
                backend: config.backend,
            });
        }

        let backend = connect(&config)
            .await
            .map_err(|e| CollectionError::from_storage(Operation::Open, None, None, e))?;
        backend
            .ensure_schema()
            .await
            .map_err(|e| CollectionError::from_storage(Operation::Open, None, None, e))?;

        info!(
            "Opened {} storage in {}",
            config.backend,
            config.data_dir.display()
        );
        Ok(Self { backend, config })
    }

    /// Wrap an already constructed backend. The schema is assumed to exist.
    pub fn with_backend(backend: Arc<dyn StorageBackend>, config: StorageConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn library(&self) -> CollectionHandle<'_, LibraryItem> {
        CollectionHandle::new(self.backend.as_ref())
    }

    pub fn wishlist(&self) -> CollectionHandle<'_, WishlistItem> {
        CollectionHandle::new(self.backend.as_ref())
    }

    /// Turn a wishlist item into a library item with the given status.
    ///
    /// The new item gets a fresh id and creation time and copies every shared
    /// field. Insert and delete run as one step where the backend supports it;
    /// otherwise the delete only happens after the insert was written.
    pub async fn move_wishlist_to_library(
        &self,
        wishlist_id: &str,
        status: ItemStatus,
    ) -> CollectionResult<LibraryItem> {
        let wish = self
            .backend
            .wishlist()
            .get(wishlist_id)
            .await
            .map_err(|e| {
                CollectionError::from_storage(
                    Operation::Move,
                    Some(CollectionKind::Wishlist),
                    Some(wishlist_id),
                    e,
                )
            })?
            .ok_or_else(|| {
                CollectionError::not_found(Operation::Move, CollectionKind::Wishlist, wishlist_id)
            })?;

        let item = LibraryItem {
            id: LibraryItem::generate_id(),
            title: wish.title,
            author: wish.author,
            genre: wish.genre,
            volume: wish.volume,
            status,
            notes: wish.notes,
            cover_image_ref: wish.cover_image_ref,
            year: wish.year,
            created_at: Utc::now(),
        };
        item.validate().map_err(|e| {
            CollectionError::validation(
                Operation::Move,
                Some(CollectionKind::Library),
                Some(item.id.as_str()),
                e,
            )
        })?;

        if let Err(e) = self.backend.transfer_to_library(wishlist_id, &item).await {
            if let Ok(Some(_)) = self.backend.library().get(&item.id).await {
                warn!(
                    "Move of {} stopped after the insert; it is now in the library as {} and still on the wishlist",
                    wishlist_id, item.id
                );
            }
            return Err(CollectionError::from_storage(
                Operation::Move,
                Some(CollectionKind::Wishlist),
                Some(wishlist_id),
                e,
            ));
        }

        info!("Moved wishlist item {} to library as {}", wishlist_id, item.id);
        Ok(item)
    }

    /// Both collections, library by title and wishlist by priority
    pub async fn export_snapshot(&self) -> CollectionResult<CollectionSnapshot> {
        let library = self
            .backend
            .library()
            .query(&ItemQuery::all().order_by(SortOrder::Title))
            .await
            .map_err(|e| {
                CollectionError::from_storage(
                    Operation::Export,
                    Some(CollectionKind::Library),
                    None,
                    e,
                )
            })?;
        let wishlist = self
            .backend
            .wishlist()
            .query(&ItemQuery::all().order_by(SortOrder::Priority))
            .await
            .map_err(|e| {
                CollectionError::from_storage(
                    Operation::Export,
                    Some(CollectionKind::Wishlist),
                    None,
                    e,
                )
            })?;

        Ok(CollectionSnapshot {
            library,
            wishlist,
            taken_at: Utc::now(),
        })
    }
}

async fn connect(config: &StorageConfig) -> StorageResult<Arc<dyn StorageBackend>> {
    match config.backend {
        BackendKind::Text => Ok(Arc::new(CsvBackend::new(CsvConnection::new(
            &config.data_dir,
        )))),
        BackendKind::Relational => connect_relational(config).await,
    }
}

#[cfg(feature = "sqlite")]
async fn connect_relational(config: &StorageConfig) -> StorageResult<Arc<dyn StorageBackend>> {
    let backend = crate::backend::storage::sqlite::SqliteBackend::open(&config.data_dir).await?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "sqlite"))]
async fn connect_relational(_config: &StorageConfig) -> StorageResult<Arc<dyn StorageBackend>> {
    Err(StorageError::EngineUnavailable {
        backend: BackendKind::Relational,
    })
}

/// Operations on one collection
pub struct CollectionHandle<'a, R> {
    backend: &'a dyn StorageBackend,
    _record: PhantomData<fn() -> R>,
}

impl<'a, R: Record> CollectionHandle<'a, R> {
    fn new(backend: &'a dyn StorageBackend) -> Self {
        Self {
            backend,
            _record: PhantomData,
        }
    }

    fn storage(&self) -> &'a dyn RecordStorage<R> {
        R::repository(self.backend)
    }

    fn storage_error(operation: Operation, id: Option<&str>, error: StorageError) -> CollectionError {
        CollectionError::from_storage(operation, Some(R::COLLECTION), id, error)
    }

    pub async fn add(&self, record: &R) -> CollectionResult<()> {
        record.validate().map_err(|e| {
            CollectionError::validation(Operation::Add, Some(R::COLLECTION), Some(record.id()), e)
        })?;

        self.storage()
            .store(record)
            .await
            .map_err(|e| Self::storage_error(Operation::Add, Some(record.id()), e))?;

        info!("Added {} item {}", R::COLLECTION, record.id());
        Ok(())
    }

    /// Replace a stored record. The stored `created_at` wins over the one
    /// passed in; the record as persisted is returned.
    pub async fn update(&self, record: &R) -> CollectionResult<R> {
        record.validate().map_err(|e| {
            CollectionError::validation(
                Operation::Update,
                Some(R::COLLECTION),
                Some(record.id()),
                e,
            )
        })?;

        let existing = self
            .storage()
            .get(record.id())
            .await
            .map_err(|e| Self::storage_error(Operation::Update, Some(record.id()), e))?
            .ok_or_else(|| CollectionError::not_found(Operation::Update, R::COLLECTION, record.id()))?;

        let mut updated = record.clone();
        updated.set_created_at(existing.created_at());
        self.storage()
            .update(&updated)
            .await
            .map_err(|e| Self::storage_error(Operation::Update, Some(record.id()), e))?;

        info!("Updated {} item {}", R::COLLECTION, record.id());
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> CollectionResult<()> {
        self.storage()
            .delete(id)
            .await
            .map_err(|e| Self::storage_error(Operation::Delete, Some(id), e))?;

        info!("Deleted {} item {}", R::COLLECTION, id);
        Ok(())
    }

    pub async fn get(&self, id: &str) -> CollectionResult<R> {
        self.storage()
            .get(id)
            .await
            .map_err(|e| Self::storage_error(Operation::Get, Some(id), e))?
            .ok_or_else(|| CollectionError::not_found(Operation::Get, R::COLLECTION, id))
    }

    /// Matching records in the requested order. Every call reads the current
    /// state again.
    pub async fn query(&self, query: &ItemQuery) -> CollectionResult<Vec<R>> {
        R::validate_query(query).map_err(|e| {
            CollectionError::validation(Operation::Query, Some(R::COLLECTION), None, e)
        })?;

        self.storage()
            .query(query)
            .await
            .map_err(|e| Self::storage_error(Operation::Query, None, e))
    }

    /// Every record in insertion order
    pub async fn all(&self) -> CollectionResult<Vec<R>> {
        self.storage()
            .load()
            .await
            .map_err(|e| Self::storage_error(Operation::Query, None, e))
    }
}
