//! # SQLite Record Repository
//!
//! One table per collection. The rowid is the insertion order: updates never
//! touch it and every ordering falls back to it for ties.

use async_trait::async_trait;
use log::debug;
use shared::{ItemQuery, SortOrder};
use sqlx::{SqliteConnection, SqlitePool};
use std::marker::PhantomData;

use super::conversions::{bind_value, insert_values, SqliteRecord};
use crate::backend::domain::models::{title_key, Record};
use crate::backend::storage::error::{StorageError, StorageResult};
use crate::backend::storage::traits::{check_bulk, check_record, RecordStorage};

/// SQLite-backed storage for one collection
pub struct SqliteRepository<R> {
    pool: SqlitePool,
    _record: PhantomData<fn() -> R>,
}

impl<R: SqliteRecord> SqliteRepository<R> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _record: PhantomData,
        }
    }
}

fn map_write_error<R: Record>(error: sqlx::Error, id: &str) -> StorageError {
    if let sqlx::Error::Database(db_error) = &error {
        if db_error.is_unique_violation() {
            return StorageError::Duplicate {
                collection: R::COLLECTION,
                id: id.to_string(),
            };
        }
    }
    StorageError::Database(error)
}

fn not_found<R: Record>(id: &str) -> StorageError {
    StorageError::NotFound {
        collection: R::COLLECTION,
        id: id.to_string(),
    }
}

/// Insert one record on an open connection or transaction
pub(super) async fn insert_record<R: SqliteRecord>(
    conn: &mut SqliteConnection,
    record: &R,
) -> StorageResult<()> {
    check_record(record)?;
    let placeholders = vec!["?"; R::MUTABLE_COLUMNS.len() + 2].join(", ");
    let sql = format!(
        "INSERT INTO {} (id, {}, created_at) VALUES ({})",
        R::TABLE,
        R::MUTABLE_COLUMNS.join(", "),
        placeholders
    );

    let mut query = sqlx::query(&sql);
    for value in insert_values(record) {
        query = bind_value(query, value);
    }
    query
        .execute(&mut *conn)
        .await
        .map_err(|e| map_write_error::<R>(e, record.id()))?;
    Ok(())
}

/// Delete one record, `NotFound` if no row matched
pub(super) async fn delete_record<R: SqliteRecord>(
    conn: &mut SqliteConnection,
    id: &str,
) -> StorageResult<()> {
    let sql = format!("DELETE FROM {} WHERE id = ?", R::TABLE);
    let result = sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
    if result.rows_affected() == 0 {
        return Err(not_found::<R>(id));
    }
    Ok(())
}

/// Insert `records` after the existing rows. Callers run this inside a
/// transaction so a colliding id leaves the table as it was.
pub(super) async fn insert_all<R: SqliteRecord>(
    conn: &mut SqliteConnection,
    records: &[R],
) -> StorageResult<()> {
    for record in records {
        insert_record(&mut *conn, record).await?;
    }
    Ok(())
}

/// SELECT statement and its string parameters for a query
fn select_statement<R: SqliteRecord>(query: &ItemQuery) -> (String, Vec<String>) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if let Some(needle) = &query.title_contains {
        conditions.push("instr(title_key, ?) > 0");
        params.push(title_key(needle));
    }
    if let Some(genre) = &query.genre {
        conditions.push("genre = ?");
        params.push(genre.clone());
    }
    if let Some(status) = query.status {
        conditions.push("status = ?");
        params.push(status.as_str().to_string());
    }

    let mut sql = format!("SELECT {} FROM {}", R::select_columns(), R::TABLE);
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    let order = match query.order {
        SortOrder::Title => "title_key",
        SortOrder::CreatedAt => "created_at",
        SortOrder::Priority => "priority",
    };
    sql.push_str(&format!(" ORDER BY {}, rowid", order));

    (sql, params)
}

#[async_trait]
impl<R: SqliteRecord> RecordStorage<R> for SqliteRepository<R> {
    async fn load(&self) -> StorageResult<Vec<R>> {
        let sql = format!("SELECT {} FROM {} ORDER BY rowid", R::select_columns(), R::TABLE);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(R::from_row).collect()
    }

    async fn get(&self, id: &str) -> StorageResult<Option<R>> {
        let sql = format!("SELECT {} FROM {} WHERE id = ?", R::select_columns(), R::TABLE);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(R::from_row).transpose()
    }

    async fn query(&self, query: &ItemQuery) -> StorageResult<Vec<R>> {
        let (sql, params) = select_statement::<R>(query);
        let mut statement = sqlx::query(&sql);
        for param in params {
            statement = statement.bind(param);
        }
        let rows = statement.fetch_all(&self.pool).await?;
        debug!("Query on {} returned {} rows", R::TABLE, rows.len());
        rows.iter().map(R::from_row).collect()
    }

    async fn store(&self, record: &R) -> StorageResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_record(&mut *conn, record).await
    }

    async fn update(&self, record: &R) -> StorageResult<()> {
        check_record(record)?;
        let assignments: Vec<String> = R::MUTABLE_COLUMNS
            .iter()
            .map(|column| format!("{} = ?", column))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            R::TABLE,
            assignments.join(", ")
        );

        let mut query = sqlx::query(&sql);
        for value in record.mutable_values() {
            query = bind_value(query, value);
        }
        let result = query
            .bind(record.id())
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error::<R>(e, record.id()))?;
        if result.rows_affected() == 0 {
            return Err(not_found::<R>(record.id()));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        let mut conn = self.pool.acquire().await?;
        delete_record::<R>(&mut *conn, id).await
    }

    async fn store_batch(&self, records: &[R]) -> StorageResult<()> {
        check_bulk(records)?;
        let mut tx = self.pool.begin().await?;
        insert_all(&mut *tx, records).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::storage::sqlite::SqliteBackend;
    use crate::backend::storage::traits::StorageBackend;
    use shared::{ItemStatus, LibraryItem, WishlistItem};
    use tempfile::TempDir;

    async fn setup() -> anyhow::Result<(TempDir, SqliteBackend)> {
        let temp_dir = TempDir::new()?;
        let backend = SqliteBackend::open(temp_dir.path()).await?;
        backend.ensure_schema().await?;
        Ok((temp_dir, backend))
    }

    #[tokio::test]
    async fn test_round_trip_preserves_every_field() -> anyhow::Result<()> {
        let (_temp_dir, backend) = setup().await?;
        let item = LibraryItem::new("Yotsuba&!, \"Vol\" 1")
            .with_author("Kiyohiko Azuma")
            .with_genre("Comedy")
            .with_volume(1)
            .with_status(ItemStatus::Completed)
            .with_notes("two\nlines")
            .with_cover("covers/yotsuba.jpg");

        backend.library().store(&item).await?;

        assert_eq!(backend.library().get(&item.id).await?, Some(item.clone()));
        assert_eq!(backend.library().query(&ItemQuery::all()).await?, vec![item]);
        Ok(())
    }

    #[tokio::test]
    async fn test_title_search_folds_non_ascii_case() -> anyhow::Result<()> {
        let (_temp_dir, backend) = setup().await?;
        backend.library().store(&LibraryItem::new("ÄSTHETIK DES WIDERSTANDS")).await?;
        backend.library().store(&LibraryItem::new("Akira")).await?;

        let found = backend
            .library()
            .query(&ItemQuery::all().title_contains("ästhetik"))
            .await?;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "ÄSTHETIK DES WIDERSTANDS");
        Ok(())
    }

    #[tokio::test]
    async fn test_ties_fall_back_to_insertion_order() -> anyhow::Result<()> {
        let (_temp_dir, backend) = setup().await?;
        for (title, priority) in [("c", 2), ("a", 1), ("b", 2), ("d", 1)] {
            backend
                .wishlist()
                .store(&WishlistItem::new(title).with_priority(priority))
                .await?;
        }

        let ranked = backend
            .wishlist()
            .query(&ItemQuery::all().order_by(SortOrder::Priority))
            .await?;
        let titles: Vec<&str> = ranked.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "d", "c", "b"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_filters_combine() -> anyhow::Result<()> {
        let (_temp_dir, backend) = setup().await?;
        let reading = LibraryItem::new("Vinland Saga")
            .with_genre("Seinen")
            .with_status(ItemStatus::Reading);
        backend.library().store(&reading).await?;
        backend
            .library()
            .store(&LibraryItem::new("Vagabond").with_genre("Seinen"))
            .await?;
        backend
            .library()
            .store(&LibraryItem::new("Nana").with_status(ItemStatus::Reading))
            .await?;

        let found = backend
            .library()
            .query(&ItemQuery::all().genre("Seinen").status(ItemStatus::Reading))
            .await?;
        assert_eq!(found, vec![reading]);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_and_missing_ids() -> anyhow::Result<()> {
        let (_temp_dir, backend) = setup().await?;
        let item = WishlistItem::new("Monster");
        backend.wishlist().store(&item).await?;

        assert!(matches!(
            backend.wishlist().store(&item).await,
            Err(StorageError::Duplicate { .. })
        ));
        assert!(matches!(
            backend.wishlist().delete("wishlist::missing").await,
            Err(StorageError::NotFound { .. })
        ));
        assert!(matches!(
            backend.wishlist().update(&WishlistItem::new("Ghost")).await,
            Err(StorageError::NotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_keeps_created_at_and_position() -> anyhow::Result<()> {
        let (_temp_dir, backend) = setup().await?;
        let first = LibraryItem::new("Akira");
        let second = LibraryItem::new("Beck");
        backend.library().store(&first).await?;
        backend.library().store(&second).await?;

        let mut changed = first.clone();
        changed.title = "Akira (Deluxe)".to_string();
        changed.created_at = chrono::Utc::now() + chrono::Duration::days(1);
        backend.library().update(&changed).await?;

        let loaded = backend.library().load().await?;
        assert_eq!(loaded[0].id, first.id);
        assert_eq!(loaded[0].title, "Akira (Deluxe)");
        assert_eq!(loaded[0].created_at, first.created_at);
        Ok(())
    }

    #[tokio::test]
    async fn test_store_batch_rolls_back_on_invalid_record() -> anyhow::Result<()> {
        let (_temp_dir, backend) = setup().await?;
        let existing = LibraryItem::new("Akira");
        backend.library().store(&existing).await?;

        let batch = vec![
            LibraryItem::new("Beck"),
            LibraryItem::new("Claymore"),
            LibraryItem::new(""),
        ];
        match backend.library().store_batch(&batch).await {
            Err(StorageError::InvalidRecord { index, id, .. }) => {
                assert_eq!(index, 2);
                assert_eq!(id, batch[2].id);
            }
            other => panic!("expected invalid record, got {:?}", other),
        }

        assert_eq!(backend.library().load().await?, vec![existing]);
        Ok(())
    }

    #[tokio::test]
    async fn test_store_batch_appends_to_existing_rows() -> anyhow::Result<()> {
        let (_temp_dir, backend) = setup().await?;
        let old = WishlistItem::new("Old");
        backend.wishlist().store(&old).await?;

        let batch = vec![WishlistItem::new("One"), WishlistItem::new("Two")];
        backend.wishlist().store_batch(&batch).await?;

        let mut expected = vec![old.clone()];
        expected.extend(batch);
        assert_eq!(backend.wishlist().load().await?, expected);

        // An id already in the table rolls back the rows inserted before it
        let clash = vec![WishlistItem::new("Three"), old];
        assert!(matches!(
            backend.wishlist().store_batch(&clash).await,
            Err(StorageError::Duplicate { .. })
        ));
        assert_eq!(backend.wishlist().load().await?, expected);
        Ok(())
    }

    #[tokio::test]
    async fn test_writes_and_reads_apply_validation() -> anyhow::Result<()> {
        let (_temp_dir, backend) = setup().await?;
        let item = LibraryItem::new("Akira").with_year(1982);
        backend.library().store(&item).await?;

        assert!(matches!(
            backend.library().store(&LibraryItem::new(" ")).await,
            Err(StorageError::Invalid { .. })
        ));
        let mut blank = item.clone();
        blank.title.clear();
        assert!(matches!(
            backend.library().update(&blank).await,
            Err(StorageError::Invalid { .. })
        ));
        assert_eq!(backend.library().load().await?, vec![item]);

        // A row written around the rules is refused on read, as the text backend does
        sqlx::query(
            "INSERT INTO library (id, title, title_key, created_at) VALUES ('library::bad', '', '', '2021-01-01T00:00:00Z')",
        )
        .execute(backend.connection().pool())
        .await?;
        assert!(matches!(
            backend.library().get("library::bad").await,
            Err(StorageError::Corrupt(_))
        ));
        assert!(matches!(
            backend.library().query(&ItemQuery::all()).await,
            Err(StorageError::Corrupt(_))
        ));
        Ok(())
    }
}
