//! Copy the whole collection from the active backend into another one.
//!
//! Ids and creation times are kept, so a migrated collection is
//! indistinguishable from the source. Records are added to whatever the
//! target already holds; the import is all-or-nothing and the source is only
//! read.

use log::info;

use super::collection_service::CollectionService;
use crate::backend::config::{BackendKind, StorageConfig};
use crate::backend::domain::models::ValidationError;
use crate::backend::error::{CollectionError, CollectionResult, Operation};
use shared::CollectionKind;

/// Outcome of a successful migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub source: BackendKind,
    pub target: BackendKind,
    pub library: usize,
    pub wishlist: usize,
}

impl CollectionService {
    /// Copy every record into the backend described by `target`, next to
    /// the records it already holds. An id present on both sides fails the
    /// migration with a validation error on `id` and the target is unchanged.
    /// The active backend is left as it was.
    pub async fn migrate_to(&self, target: StorageConfig) -> CollectionResult<MigrationReport> {
        if &target == self.config() {
            return Err(CollectionError::validation(
                Operation::Migrate,
                None,
                None,
                ValidationError::new("backend", "target is the storage already in use"),
            ));
        }

        let library = self.backend.library().load().await.map_err(|e| {
            CollectionError::from_storage(Operation::Migrate, Some(CollectionKind::Library), None, e)
        })?;
        let wishlist = self.backend.wishlist().load().await.map_err(|e| {
            CollectionError::from_storage(Operation::Migrate, Some(CollectionKind::Wishlist), None, e)
        })?;

        let target_service = CollectionService::open(target).await?;
        target_service
            .backend
            .import(&library, &wishlist)
            .await
            .map_err(|e| CollectionError::from_storage(Operation::Migrate, None, None, e))?;

        let report = MigrationReport {
            source: self.backend_kind(),
            target: target_service.backend_kind(),
            library: library.len(),
            wishlist: wishlist.len(),
        };
        info!(
            "Migrated {} library and {} wishlist records from {} to {} storage in {}",
            report.library,
            report.wishlist,
            report.source,
            report.target,
            target_service.config().data_dir.display()
        );
        Ok(report)
    }
}
