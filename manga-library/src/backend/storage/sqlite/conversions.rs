//! Mapping between records and table rows.
//!
//! Timestamps are stored as RFC 3339 text with nanosecond precision, so text
//! order in SQL matches chronological order. `title_key` holds the title folded
//! by Rust's `to_lowercase` so both backends agree on case-insensitive search.

use chrono::{DateTime, Utc};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite};

use shared::{format_timestamp, ItemStatus, LibraryItem, WishlistItem};

use crate::backend::domain::models::{title_key, Record};
use crate::backend::storage::error::{StorageError, StorageResult};

/// Dynamically typed value bound into a statement
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    OptionalText(Option<String>),
    OptionalInteger(Option<i64>),
}

pub fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Text(v) => query.bind(v),
        SqlValue::OptionalText(v) => query.bind(v),
        SqlValue::OptionalInteger(v) => query.bind(v),
    }
}

/// A record type stored in its own table
pub trait SqliteRecord: Record {
    const TABLE: &'static str;

    /// Every non-key column with its declaration. Used both to create the
    /// table and to add columns missing from databases made by older versions,
    /// so each declaration must be valid in `ALTER TABLE ADD COLUMN`.
    const COLUMN_DEFINITIONS: &'static [(&'static str, &'static str)];

    /// Columns rewritten by `update`, in the order of `mutable_values`
    const MUTABLE_COLUMNS: [&'static str; 9];

    fn mutable_values(&self) -> Vec<SqlValue>;

    fn from_row(row: &SqliteRow) -> StorageResult<Self>;

    fn select_columns() -> String {
        let mut columns = vec!["id"];
        columns.extend(Self::MUTABLE_COLUMNS.iter().filter(|c| **c != "title_key"));
        columns.push("created_at");
        columns.join(", ")
    }
}

fn optional_count(value: Option<u32>) -> SqlValue {
    SqlValue::OptionalInteger(value.map(i64::from))
}

fn read_count(row: &SqliteRow, column: &str) -> StorageResult<Option<u32>> {
    let value: Option<i64> = row.try_get(column)?;
    value
        .map(|v| {
            u32::try_from(v).map_err(|_| {
                StorageError::Corrupt(format!("{} value {} is out of range", column, v))
            })
        })
        .transpose()
}

fn read_timestamp(row: &SqliteRow) -> StorageResult<DateTime<Utc>> {
    let value: String = row.try_get("created_at")?;
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("invalid created_at '{}': {}", value, e)))
}

/// Rows written around the validation rules (older tools, manual edits) are
/// refused on read, the same way the text backend refuses them
fn checked<R: Record>(record: R) -> StorageResult<R> {
    record.validate().map_err(|e| {
        StorageError::Corrupt(format!("{} item '{}': {}", R::COLLECTION, record.id(), e))
    })?;
    Ok(record)
}

/// Values for an INSERT: id, the mutable columns, then created_at
pub fn insert_values<R: SqliteRecord>(record: &R) -> Vec<SqlValue> {
    let mut values = vec![SqlValue::Text(record.id().to_string())];
    values.extend(record.mutable_values());
    values.push(SqlValue::Text(format_timestamp(&record.created_at())));
    values
}

impl SqliteRecord for LibraryItem {
    const TABLE: &'static str = "library";

    const COLUMN_DEFINITIONS: &'static [(&'static str, &'static str)] = &[
        ("title", "TEXT NOT NULL DEFAULT ''"),
        ("title_key", "TEXT NOT NULL DEFAULT ''"),
        ("author", "TEXT NOT NULL DEFAULT ''"),
        ("genre", "TEXT NOT NULL DEFAULT ''"),
        ("volume", "INTEGER"),
        ("status", "TEXT NOT NULL DEFAULT 'owned'"),
        ("notes", "TEXT NOT NULL DEFAULT ''"),
        ("cover_image_ref", "TEXT"),
        ("year", "INTEGER"),
        ("created_at", "TEXT NOT NULL DEFAULT ''"),
    ];

    const MUTABLE_COLUMNS: [&'static str; 9] = [
        "title",
        "title_key",
        "author",
        "genre",
        "volume",
        "status",
        "notes",
        "cover_image_ref",
        "year",
    ];

    fn mutable_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.title.clone()),
            SqlValue::Text(title_key(&self.title)),
            SqlValue::Text(self.author.clone()),
            SqlValue::Text(self.genre.clone()),
            optional_count(self.volume),
            SqlValue::Text(self.status.as_str().to_string()),
            SqlValue::Text(self.notes.clone()),
            SqlValue::OptionalText(self.cover_image_ref.clone()),
            optional_count(self.year),
        ]
    }

    fn from_row(row: &SqliteRow) -> StorageResult<Self> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<ItemStatus>()
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;

        checked(LibraryItem {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            author: row.try_get("author")?,
            genre: row.try_get("genre")?,
            volume: read_count(row, "volume")?,
            status,
            notes: row.try_get("notes")?,
            cover_image_ref: row.try_get("cover_image_ref")?,
            year: read_count(row, "year")?,
            created_at: read_timestamp(row)?,
        })
    }
}

impl SqliteRecord for WishlistItem {
    const TABLE: &'static str = "wishlist";

    const COLUMN_DEFINITIONS: &'static [(&'static str, &'static str)] = &[
        ("title", "TEXT NOT NULL DEFAULT ''"),
        ("title_key", "TEXT NOT NULL DEFAULT ''"),
        ("author", "TEXT NOT NULL DEFAULT ''"),
        ("genre", "TEXT NOT NULL DEFAULT ''"),
        ("volume", "INTEGER"),
        ("priority", "INTEGER NOT NULL DEFAULT 0"),
        ("notes", "TEXT NOT NULL DEFAULT ''"),
        ("cover_image_ref", "TEXT"),
        ("year", "INTEGER"),
        ("created_at", "TEXT NOT NULL DEFAULT ''"),
    ];

    const MUTABLE_COLUMNS: [&'static str; 9] = [
        "title",
        "title_key",
        "author",
        "genre",
        "volume",
        "priority",
        "notes",
        "cover_image_ref",
        "year",
    ];

    fn mutable_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.title.clone()),
            SqlValue::Text(title_key(&self.title)),
            SqlValue::Text(self.author.clone()),
            SqlValue::Text(self.genre.clone()),
            optional_count(self.volume),
            SqlValue::OptionalInteger(Some(i64::from(self.priority))),
            SqlValue::Text(self.notes.clone()),
            SqlValue::OptionalText(self.cover_image_ref.clone()),
            optional_count(self.year),
        ]
    }

    fn from_row(row: &SqliteRow) -> StorageResult<Self> {
        let priority = read_count(row, "priority")?.unwrap_or(0);

        checked(WishlistItem {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            author: row.try_get("author")?,
            genre: row.try_get("genre")?,
            volume: read_count(row, "volume")?,
            priority,
            notes: row.try_get("notes")?,
            cover_image_ref: row.try_get("cover_image_ref")?,
            year: read_count(row, "year")?,
            created_at: read_timestamp(row)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_columns_skip_title_key() {
        assert_eq!(
            LibraryItem::select_columns(),
            "id, title, author, genre, volume, status, notes, cover_image_ref, year, created_at"
        );
        assert!(WishlistItem::select_columns().contains("priority"));
    }

    #[test]
    fn test_insert_values_line_up_with_columns() {
        let item = WishlistItem::new("Ästhetik").with_priority(4);
        let values = insert_values(&item);

        assert_eq!(values.len(), WishlistItem::MUTABLE_COLUMNS.len() + 2);
        assert_eq!(values[0], SqlValue::Text(item.id.clone()));
        assert_eq!(values[2], SqlValue::Text("ästhetik".to_string()));
        assert_eq!(values[6], SqlValue::OptionalInteger(Some(4)));
        assert_eq!(values[9], SqlValue::OptionalInteger(None));
    }

    #[test]
    fn test_every_mutable_column_is_defined() {
        for column in LibraryItem::MUTABLE_COLUMNS {
            assert!(LibraryItem::COLUMN_DEFINITIONS.iter().any(|(name, _)| *name == column));
        }
        for column in WishlistItem::MUTABLE_COLUMNS {
            assert!(WishlistItem::COLUMN_DEFINITIONS.iter().any(|(name, _)| *name == column));
        }
    }
}
