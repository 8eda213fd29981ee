//! Field validation shared by the collection service and both storage drivers.
//!
//! Everything here is pure: no I/O, no clock. A record that passes these
//! checks is accepted by either backend, so the rules never depend on which
//! driver is active.

use shared::{CollectionKind, ItemQuery, ItemStatus, LibraryItem, SortOrder, WishlistItem};

pub const MAX_TITLE_LENGTH: usize = 300;
pub const MAX_NAME_LENGTH: usize = 200;
pub const MAX_NOTES_LENGTH: usize = 4000;
pub const MAX_COVER_REF_LENGTH: usize = 1024;
pub const MAX_YEAR: u32 = 9999;

/// A single rejected field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Fields both record shapes have in common
struct CommonFields<'a> {
    id: &'a str,
    title: &'a str,
    author: &'a str,
    genre: &'a str,
    notes: &'a str,
    cover_image_ref: Option<&'a str>,
    year: Option<u32>,
}

pub fn validate_library_item(item: &LibraryItem) -> Result<(), ValidationError> {
    validate_common(&CommonFields {
        id: &item.id,
        title: &item.title,
        author: &item.author,
        genre: &item.genre,
        notes: &item.notes,
        cover_image_ref: item.cover_image_ref.as_deref(),
        year: item.year,
    })
}

pub fn validate_wishlist_item(item: &WishlistItem) -> Result<(), ValidationError> {
    validate_common(&CommonFields {
        id: &item.id,
        title: &item.title,
        author: &item.author,
        genre: &item.genre,
        notes: &item.notes,
        cover_image_ref: item.cover_image_ref.as_deref(),
        year: item.year,
    })
}

fn validate_common(fields: &CommonFields<'_>) -> Result<(), ValidationError> {
    if fields.id.trim().is_empty() {
        return Err(ValidationError::new("id", "cannot be empty"));
    }

    if fields.title.trim().is_empty() {
        return Err(ValidationError::new("title", "cannot be empty"));
    }
    check_length("title", fields.title, MAX_TITLE_LENGTH)?;
    check_length("author", fields.author, MAX_NAME_LENGTH)?;
    check_length("genre", fields.genre, MAX_NAME_LENGTH)?;
    check_length("notes", fields.notes, MAX_NOTES_LENGTH)?;

    if let Some(cover) = fields.cover_image_ref {
        if cover.trim().is_empty() {
            return Err(ValidationError::new(
                "cover_image_ref",
                "cannot be blank, leave it unset instead",
            ));
        }
        if cover.contains(&['\n', '\r'][..]) {
            return Err(ValidationError::new(
                "cover_image_ref",
                "must be a single line",
            ));
        }
        check_length("cover_image_ref", cover, MAX_COVER_REF_LENGTH)?;
    }

    if let Some(year) = fields.year {
        if year == 0 || year > MAX_YEAR {
            return Err(ValidationError::new(
                "year",
                format!("must be between 1 and {}", MAX_YEAR),
            ));
        }
    }

    Ok(())
}

fn check_length(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    let length = value.chars().count();
    if length > max {
        return Err(ValidationError::new(
            field,
            format!("cannot exceed {} characters (got {})", max, length),
        ));
    }
    Ok(())
}

/// Parse a status coming from user input or a text file
pub fn parse_status(value: &str) -> Result<ItemStatus, ValidationError> {
    value
        .parse::<ItemStatus>()
        .map_err(|e| ValidationError::new("status", e.to_string()))
}

/// Parse a non-negative integer field such as `volume` or `priority`
pub fn parse_count(field: &'static str, value: &str) -> Result<u32, ValidationError> {
    let trimmed = value.trim();
    if trimmed.starts_with('-') {
        return Err(ValidationError::new(field, "must not be negative"));
    }
    trimmed
        .parse::<u32>()
        .map_err(|_| ValidationError::new(field, format!("'{}' is not a whole number", value)))
}

/// Reject filters and orderings the target collection has no field for
pub fn validate_query(collection: CollectionKind, query: &ItemQuery) -> Result<(), ValidationError> {
    match collection {
        CollectionKind::Library => {
            if query.order == SortOrder::Priority {
                return Err(ValidationError::new(
                    "order",
                    "library items have no priority",
                ));
            }
        }
        CollectionKind::Wishlist => {
            if query.status.is_some() {
                return Err(ValidationError::new(
                    "status",
                    "wishlist items have no status",
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_items_pass() {
        let item = LibraryItem::new("Vagabond")
            .with_author("Takehiko Inoue")
            .with_cover("covers/vagabond.jpg");
        assert_eq!(validate_library_item(&item), Ok(()));

        let wish = WishlistItem::new("Dorohedoro").with_priority(1);
        assert_eq!(validate_wishlist_item(&wish), Ok(()));
    }

    #[test]
    fn test_blank_title_rejected() {
        for title in ["", "   ", "\t\n"] {
            let err = validate_library_item(&LibraryItem::new(title)).unwrap_err();
            assert_eq!(err.field, "title");

            let err = validate_wishlist_item(&WishlistItem::new(title)).unwrap_err();
            assert_eq!(err.field, "title");
        }
    }

    #[test]
    fn test_blank_id_rejected() {
        let mut item = LibraryItem::new("Blame!");
        item.id = " ".to_string();
        assert_eq!(validate_library_item(&item).unwrap_err().field, "id");
    }

    #[test]
    fn test_length_limits_count_characters() {
        // Multi-byte characters count once each
        let title = "漫".repeat(MAX_TITLE_LENGTH);
        assert!(validate_library_item(&LibraryItem::new(title.clone())).is_ok());

        let too_long = format!("{}x", title);
        let err = validate_library_item(&LibraryItem::new(too_long)).unwrap_err();
        assert_eq!(err.field, "title");
        assert!(err.reason.contains("300"));

        let item = LibraryItem::new("Ok").with_author("a".repeat(MAX_NAME_LENGTH + 1));
        assert_eq!(validate_library_item(&item).unwrap_err().field, "author");
    }

    #[test]
    fn test_cover_reference_rules() {
        let blank = LibraryItem::new("Ok").with_cover("  ");
        assert_eq!(validate_library_item(&blank).unwrap_err().field, "cover_image_ref");

        let multiline = WishlistItem::new("Ok").with_cover("a.jpg\nb.jpg");
        assert_eq!(
            validate_wishlist_item(&multiline).unwrap_err().field,
            "cover_image_ref"
        );
    }

    #[test]
    fn test_year_range() {
        let item = LibraryItem::new("Akira").with_year(1982);
        assert_eq!(validate_library_item(&item), Ok(()));

        for year in [0, MAX_YEAR + 1] {
            let err = validate_wishlist_item(&WishlistItem::new("Ok").with_year(year)).unwrap_err();
            assert_eq!(err.field, "year");
        }
    }

    #[test]
    fn test_parse_status_and_count() {
        assert_eq!(parse_status("Reading"), Ok(ItemStatus::Reading));
        assert_eq!(parse_status("wanted").unwrap_err().field, "status");

        assert_eq!(parse_count("volume", " 12 "), Ok(12));
        let negative = parse_count("volume", "-1").unwrap_err();
        assert_eq!(negative.reason, "must not be negative");
        assert_eq!(parse_count("priority", "high").unwrap_err().field, "priority");
    }

    #[test]
    fn test_query_fields_must_exist_on_collection() {
        let by_priority = ItemQuery::all().order_by(SortOrder::Priority);
        assert!(validate_query(CollectionKind::Wishlist, &by_priority).is_ok());
        assert_eq!(
            validate_query(CollectionKind::Library, &by_priority).unwrap_err().field,
            "order"
        );

        let by_status = ItemQuery::all().status(ItemStatus::Completed);
        assert!(validate_query(CollectionKind::Library, &by_status).is_ok());
        assert_eq!(
            validate_query(CollectionKind::Wishlist, &by_status).unwrap_err().field,
            "status"
        );
    }
}
