//! Row encoding for the CSV files.
//!
//! Columns are looked up by header name, so a file written before a column
//! existed still loads with that field left at its default. Every decoded
//! row goes through record validation before it is handed out.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use csv::StringRecord;
use shared::{ItemStatus, LibraryItem, WishlistItem};

use crate::backend::domain::models::validation::{parse_count, parse_status};
use crate::backend::domain::models::Record;

/// Columns every file must have
const REQUIRED_COLUMNS: [&str; 3] = ["id", "title", "created_at"];

/// A record type that can live in a CSV file
pub trait CsvRecord: Record {
    /// Header written for new files, in column order
    const COLUMNS: [&'static str; 10];

    fn to_row(&self) -> Vec<String>;

    /// Decode one data row. The error message is reported with the row's line.
    fn from_row(columns: &ColumnMap, row: &StringRecord) -> Result<Self, String>;
}

/// Header name to column position
#[derive(Debug, Clone)]
pub struct ColumnMap {
    positions: HashMap<String, usize>,
}

impl ColumnMap {
    /// Build from a header row. Returns the map plus any columns the record
    /// type does not know about.
    pub fn from_header(
        header: &StringRecord,
        known: &[&'static str],
    ) -> Result<(Self, Vec<String>), String> {
        let mut positions = HashMap::new();
        let mut unknown = Vec::new();

        for (index, name) in header.iter().enumerate() {
            let name = name.trim();
            if positions.insert(name.to_string(), index).is_some() {
                return Err(format!("column '{}' appears more than once in the header", name));
            }
            if !known.iter().any(|column| *column == name) {
                unknown.push(name.to_string());
            }
        }

        for required in REQUIRED_COLUMNS {
            if !positions.contains_key(required) {
                return Err(format!("header is missing the '{}' column", required));
            }
        }

        Ok((Self { positions }, unknown))
    }

    /// Cell value, empty when the column is absent from this file
    pub fn value<'r>(&self, row: &'r StringRecord, column: &str) -> &'r str {
        self.positions
            .get(column)
            .and_then(|&index| row.get(index))
            .unwrap_or("")
    }

    fn text(&self, row: &StringRecord, column: &str) -> String {
        self.value(row, column).to_string()
    }

    fn optional_text(&self, row: &StringRecord, column: &str) -> Option<String> {
        let value = self.value(row, column);
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    fn optional_count(&self, row: &StringRecord, column: &'static str) -> Result<Option<u32>, String> {
        match self.value(row, column) {
            "" => Ok(None),
            value => parse_count(column, value).map(Some).map_err(|e| e.to_string()),
        }
    }

    fn timestamp(&self, row: &StringRecord, column: &str) -> Result<DateTime<Utc>, String> {
        let value = self.value(row, column);
        DateTime::parse_from_rfc3339(value.trim())
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| format!("invalid {} '{}': {}", column, value, e))
    }
}

fn values(fields: Vec<(&'static str, String)>) -> Vec<String> {
    fields.into_iter().map(|(_, value)| value).collect()
}

impl CsvRecord for LibraryItem {
    const COLUMNS: [&'static str; 10] = LibraryItem::FIELDS;

    fn to_row(&self) -> Vec<String> {
        values(self.fields())
    }

    fn from_row(columns: &ColumnMap, row: &StringRecord) -> Result<Self, String> {
        let status = match columns.value(row, "status") {
            "" => ItemStatus::default(),
            value => parse_status(value).map_err(|e| e.to_string())?,
        };

        let item = LibraryItem {
            id: columns.text(row, "id"),
            title: columns.text(row, "title"),
            author: columns.text(row, "author"),
            genre: columns.text(row, "genre"),
            volume: columns.optional_count(row, "volume")?,
            status,
            notes: columns.text(row, "notes"),
            cover_image_ref: columns.optional_text(row, "cover_image_ref"),
            year: columns.optional_count(row, "year")?,
            created_at: columns.timestamp(row, "created_at")?,
        };
        item.validate().map_err(|e| e.to_string())?;
        Ok(item)
    }
}

impl CsvRecord for WishlistItem {
    const COLUMNS: [&'static str; 10] = WishlistItem::FIELDS;

    fn to_row(&self) -> Vec<String> {
        values(self.fields())
    }

    fn from_row(columns: &ColumnMap, row: &StringRecord) -> Result<Self, String> {
        let item = WishlistItem {
            id: columns.text(row, "id"),
            title: columns.text(row, "title"),
            author: columns.text(row, "author"),
            genre: columns.text(row, "genre"),
            volume: columns.optional_count(row, "volume")?,
            priority: columns.optional_count(row, "priority")?.unwrap_or(0),
            notes: columns.text(row, "notes"),
            cover_image_ref: columns.optional_text(row, "cover_image_ref"),
            year: columns.optional_count(row, "year")?,
            created_at: columns.timestamp(row, "created_at")?,
        };
        item.validate().map_err(|e| e.to_string())?;
        Ok(item)
    }
}
