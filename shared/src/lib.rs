use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Library item ID in format: "library::<uuid>"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryItem {
    pub id: String,
    /// Display title (required, never blank)
    pub title: String,
    pub author: String,
    pub genre: String,
    /// Volume number or count of volumes owned
    pub volume: Option<u32>,
    pub status: ItemStatus,
    /// Free-form notes shown in the detail view and on printouts
    pub notes: String,
    /// Opaque reference to an externally managed cover image (path or key)
    pub cover_image_ref: Option<String>,
    /// Publication year
    pub year: Option<u32>,
    /// Set once when the item is created
    pub created_at: DateTime<Utc>,
}

/// Wishlist item ID in format: "wishlist::<uuid>"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistItem {
    pub id: String,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub volume: Option<u32>,
    /// Rank in the wishlist, lower values are wanted sooner.
    /// Items with equal priority keep their insertion order.
    pub priority: u32,
    pub notes: String,
    pub cover_image_ref: Option<String>,
    pub year: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Reading status of an owned item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Owned,
    Reading,
    Completed,
}

/// Which of the two independent collections a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Library,
    Wishlist,
}

/// Result ordering for collection queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Case-insensitive title order
    #[default]
    Title,
    /// Oldest first
    CreatedAt,
    /// Wishlist only: lowest rank first
    Priority,
}

/// Filter applied by `query` on either collection.
///
/// All criteria are optional and combined with AND. Ties in the chosen
/// ordering are always broken by insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemQuery {
    /// Case-insensitive substring of the title
    pub title_contains: Option<String>,
    /// Exact genre match
    pub genre: Option<String>,
    /// Exact status match (library only)
    pub status: Option<ItemStatus>,
    pub order: SortOrder,
}

/// Full ordered view of both collections, handed to the export/print side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    /// Library ordered by title
    pub library: Vec<LibraryItem>,
    /// Wishlist ordered by priority
    pub wishlist: Vec<WishlistItem>,
    pub taken_at: DateTime<Utc>,
}

/// One record flattened into field/value pairs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub collection: CollectionKind,
    pub fields: Vec<(String, String)>,
}

/// Error returned when a status string is not one of the known values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStatusParseError(pub String);

impl LibraryItem {
    /// Column/field names in persisted order
    pub const FIELDS: [&'static str; 10] = [
        "id",
        "title",
        "author",
        "genre",
        "volume",
        "status",
        "notes",
        "cover_image_ref",
        "year",
        "created_at",
    ];

    /// Generate a new library item ID
    pub fn generate_id() -> String {
        format!("library::{}", uuid::Uuid::new_v4())
    }

    /// Create a new owned item with a fresh id and creation time
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Self::generate_id(),
            title: title.into(),
            author: String::new(),
            genre: String::new(),
            volume: None,
            status: ItemStatus::Owned,
            notes: String::new(),
            cover_image_ref: None,
            year: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = genre.into();
        self
    }

    pub fn with_volume(mut self, volume: u32) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_status(mut self, status: ItemStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_cover(mut self, cover_image_ref: impl Into<String>) -> Self {
        self.cover_image_ref = Some(cover_image_ref.into());
        self
    }

    pub fn with_year(mut self, year: u32) -> Self {
        self.year = Some(year);
        self
    }

    /// Field/value pairs in `FIELDS` order. Absent optionals become empty strings.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let values = [
            self.id.clone(),
            self.title.clone(),
            self.author.clone(),
            self.genre.clone(),
            self.volume.map(|v| v.to_string()).unwrap_or_default(),
            self.status.as_str().to_string(),
            self.notes.clone(),
            self.cover_image_ref.clone().unwrap_or_default(),
            self.year.map(|y| y.to_string()).unwrap_or_default(),
            format_timestamp(&self.created_at),
        ];
        Self::FIELDS.into_iter().zip(values).collect()
    }
}

impl WishlistItem {
    pub const FIELDS: [&'static str; 10] = [
        "id",
        "title",
        "author",
        "genre",
        "volume",
        "priority",
        "notes",
        "cover_image_ref",
        "year",
        "created_at",
    ];

    /// Generate a new wishlist item ID
    pub fn generate_id() -> String {
        format!("wishlist::{}", uuid::Uuid::new_v4())
    }

    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Self::generate_id(),
            title: title.into(),
            author: String::new(),
            genre: String::new(),
            volume: None,
            priority: 0,
            notes: String::new(),
            cover_image_ref: None,
            year: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = genre.into();
        self
    }

    pub fn with_volume(mut self, volume: u32) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_cover(mut self, cover_image_ref: impl Into<String>) -> Self {
        self.cover_image_ref = Some(cover_image_ref.into());
        self
    }

    pub fn with_year(mut self, year: u32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let values = [
            self.id.clone(),
            self.title.clone(),
            self.author.clone(),
            self.genre.clone(),
            self.volume.map(|v| v.to_string()).unwrap_or_default(),
            self.priority.to_string(),
            self.notes.clone(),
            self.cover_image_ref.clone().unwrap_or_default(),
            self.year.map(|y| y.to_string()).unwrap_or_default(),
            format_timestamp(&self.created_at),
        ];
        Self::FIELDS.into_iter().zip(values).collect()
    }
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 3] = [ItemStatus::Owned, ItemStatus::Reading, ItemStatus::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Owned => "owned",
            ItemStatus::Reading => "reading",
            ItemStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = ItemStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        ItemStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| ItemStatusParseError(s.to_string()))
    }
}

impl fmt::Display for ItemStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown status '{}', expected one of: owned, reading, completed",
            self.0
        )
    }
}

impl std::error::Error for ItemStatusParseError {}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Library => "library",
            CollectionKind::Wishlist => "wishlist",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ItemQuery {
    /// Query matching every record, ordered by title
    pub fn all() -> Self {
        Self::default()
    }

    pub fn title_contains(mut self, needle: impl Into<String>) -> Self {
        self.title_contains = Some(needle.into());
        self
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn status(mut self, status: ItemStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn order_by(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }
}

impl CollectionSnapshot {
    /// Flatten both collections into field/value rows, library first
    pub fn rows(&self) -> Vec<SnapshotRow> {
        let library = self.library.iter().map(|item| SnapshotRow {
            collection: CollectionKind::Library,
            fields: owned_fields(item.fields()),
        });
        let wishlist = self.wishlist.iter().map(|item| SnapshotRow {
            collection: CollectionKind::Wishlist,
            fields: owned_fields(item.fields()),
        });
        library.chain(wishlist).collect()
    }

    pub fn len(&self) -> usize {
        self.library.len() + self.wishlist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.library.is_empty() && self.wishlist.is_empty()
    }
}

/// Timestamps are persisted as RFC 3339 UTC with nanosecond precision so that
/// text ordering matches chronological ordering and nothing is lost on reload.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn owned_fields(fields: Vec<(&'static str, String)>) -> Vec<(String, String)> {
    fields
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_library_and_wishlist_ids() {
        let library_id = LibraryItem::generate_id();
        let wishlist_id = WishlistItem::generate_id();

        assert!(library_id.starts_with("library::"));
        assert!(wishlist_id.starts_with("wishlist::"));
        assert_ne!(LibraryItem::generate_id(), library_id);
    }

    #[test]
    fn test_item_status_parsing() {
        assert_eq!("owned".parse::<ItemStatus>(), Ok(ItemStatus::Owned));
        assert_eq!(" Reading ".parse::<ItemStatus>(), Ok(ItemStatus::Reading));
        assert_eq!("COMPLETED".parse::<ItemStatus>(), Ok(ItemStatus::Completed));

        let err = "lost".parse::<ItemStatus>().unwrap_err();
        assert_eq!(err, ItemStatusParseError("lost".to_string()));
        assert!(err.to_string().contains("lost"));
    }

    #[test]
    fn test_library_fields_follow_column_order() {
        let item = LibraryItem::new("Berserk")
            .with_author("Kentaro Miura")
            .with_volume(3)
            .with_status(ItemStatus::Reading);

        let fields = item.fields();
        let names: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, LibraryItem::FIELDS.to_vec());
        assert_eq!(fields[1].1, "Berserk");
        assert_eq!(fields[4].1, "3");
        assert_eq!(fields[5].1, "reading");
        // No cover or year set
        assert_eq!(fields[7].1, "");
        assert_eq!(fields[8].1, "");
        assert_eq!(fields[9].0, "created_at");
    }

    #[test]
    fn test_timestamp_format_is_sortable() {
        let earlier = DateTime::parse_from_rfc3339("2024-01-02T03:04:05.000000001Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = DateTime::parse_from_rfc3339("2024-01-02T03:04:05.1Z")
            .unwrap()
            .with_timezone(&Utc);

        let a = format_timestamp(&earlier);
        let b = format_timestamp(&later);
        assert_eq!(a, "2024-01-02T03:04:05.000000001Z");
        assert!(a < b);
    }

    #[test]
    fn test_snapshot_rows_library_first() {
        let snapshot = CollectionSnapshot {
            library: vec![LibraryItem::new("Akira")],
            wishlist: vec![WishlistItem::new("Monster").with_priority(2)],
            taken_at: Utc::now(),
        };

        let rows = snapshot.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(rows[0].collection, CollectionKind::Library);
        assert_eq!(rows[1].collection, CollectionKind::Wishlist);
        assert!(rows[1]
            .fields
            .contains(&("priority".to_string(), "2".to_string())));
    }

    #[test]
    fn test_item_serializes_status_lowercase() {
        let item = LibraryItem::new("Pluto").with_status(ItemStatus::Completed);
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"status\":\"completed\""));

        let back: LibraryItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }
}
