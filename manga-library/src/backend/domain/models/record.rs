use chrono::{DateTime, Utc};
use shared::{CollectionKind, ItemQuery, LibraryItem, SortOrder, WishlistItem};

use super::validation::{self, ValidationError};
use crate::backend::storage::traits::{RecordStorage, StorageBackend};

/// Behaviour shared by library and wishlist records.
///
/// Lets the collection service and the drivers be written once for both
/// collections. `repository` picks the matching half of a backend.
pub trait Record: Clone + Send + Sync + 'static {
    const COLLECTION: CollectionKind;

    fn id(&self) -> &str;

    fn title(&self) -> &str;

    fn genre(&self) -> &str;

    fn created_at(&self) -> DateTime<Utc>;

    fn set_created_at(&mut self, created_at: DateTime<Utc>);

    /// Wishlist rank, `None` for records without one
    fn priority(&self) -> Option<u32>;

    fn validate(&self) -> Result<(), ValidationError>;

    /// In-memory evaluation of a query filter (ordering is applied separately)
    fn matches(&self, query: &ItemQuery) -> bool;

    fn repository(backend: &dyn StorageBackend) -> &dyn RecordStorage<Self>;

    fn validate_query(query: &ItemQuery) -> Result<(), ValidationError> {
        validation::validate_query(Self::COLLECTION, query)
    }
}

/// Case-folded title used for case-insensitive search and title ordering.
///
/// The relational driver stores this value in its `title_key` column so both
/// backends fold case identically, including non-ASCII titles.
pub fn title_key(title: &str) -> String {
    title.to_lowercase()
}

fn matches_common<R: Record>(record: &R, query: &ItemQuery) -> bool {
    if let Some(needle) = &query.title_contains {
        if !title_key(record.title()).contains(&title_key(needle)) {
            return false;
        }
    }
    if let Some(genre) = &query.genre {
        if record.genre() != genre {
            return false;
        }
    }
    true
}

/// Stable sort so records with equal keys keep insertion order
pub fn sort_records<R: Record>(records: &mut [R], order: SortOrder) {
    match order {
        SortOrder::Title => records.sort_by_cached_key(|r| title_key(r.title())),
        SortOrder::CreatedAt => records.sort_by_key(|r| r.created_at()),
        SortOrder::Priority => records.sort_by_key(|r| r.priority()),
    }
}

impl Record for LibraryItem {
    const COLLECTION: CollectionKind = CollectionKind::Library;

    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn genre(&self) -> &str {
        &self.genre
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn set_created_at(&mut self, created_at: DateTime<Utc>) {
        self.created_at = created_at;
    }

    fn priority(&self) -> Option<u32> {
        None
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_library_item(self)
    }

    fn matches(&self, query: &ItemQuery) -> bool {
        if let Some(status) = query.status {
            if self.status != status {
                return false;
            }
        }
        matches_common(self, query)
    }

    fn repository(backend: &dyn StorageBackend) -> &dyn RecordStorage<Self> {
        backend.library()
    }
}

impl Record for WishlistItem {
    const COLLECTION: CollectionKind = CollectionKind::Wishlist;

    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn genre(&self) -> &str {
        &self.genre
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn set_created_at(&mut self, created_at: DateTime<Utc>) {
        self.created_at = created_at;
    }

    fn priority(&self) -> Option<u32> {
        Some(self.priority)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_wishlist_item(self)
    }

    fn matches(&self, query: &ItemQuery) -> bool {
        // Status filters never reach here, validate_query rejects them
        matches_common(self, query)
    }

    fn repository(backend: &dyn StorageBackend) -> &dyn RecordStorage<Self> {
        backend.wishlist()
    }
}
