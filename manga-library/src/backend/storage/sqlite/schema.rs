use log::{debug, info};
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;

use super::conversions::SqliteRecord;
use crate::backend::domain::models::title_key;
use crate::backend::storage::error::StorageResult;

/// Create the table and indexes for `R`, then add any columns an older
/// database is missing. Never drops or rewrites existing data.
pub async fn ensure_table<R: SqliteRecord>(pool: &SqlitePool) -> StorageResult<()> {
    let definitions: Vec<String> = R::COLUMN_DEFINITIONS
        .iter()
        .map(|(name, declaration)| format!("{} {}", name, declaration))
        .collect();
    let create = format!(
        "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, {})",
        R::TABLE,
        definitions.join(", ")
    );
    sqlx::query(&create).execute(pool).await?;

    add_missing_columns::<R>(pool).await?;

    for column in ["title", "title_key"] {
        let index = format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_{column} ON {table} ({column})",
            table = R::TABLE,
            column = column
        );
        sqlx::query(&index).execute(pool).await?;
    }

    backfill_title_keys::<R>(pool).await
}

async fn add_missing_columns<R: SqliteRecord>(pool: &SqlitePool) -> StorageResult<()> {
    let pragma = format!("PRAGMA table_info({})", R::TABLE);
    let rows = sqlx::query(&pragma).fetch_all(pool).await?;
    let existing: HashSet<String> = rows
        .iter()
        .map(|row| row.try_get::<String, _>("name"))
        .collect::<Result<_, _>>()?;

    for (name, declaration) in R::COLUMN_DEFINITIONS {
        if existing.contains(*name) {
            continue;
        }
        let alter = format!("ALTER TABLE {} ADD COLUMN {} {}", R::TABLE, name, declaration);
        sqlx::query(&alter).execute(pool).await?;
        info!("Added column {}.{}", R::TABLE, name);
    }

    Ok(())
}

/// Fill `title_key` for rows written before the column existed. The folding
/// is done in Rust so it matches the text backend exactly.
async fn backfill_title_keys<R: SqliteRecord>(pool: &SqlitePool) -> StorageResult<()> {
    let select = format!(
        "SELECT id, title FROM {} WHERE title_key = '' AND title <> ''",
        R::TABLE
    );
    let rows = sqlx::query(&select).fetch_all(pool).await?;
    if rows.is_empty() {
        return Ok(());
    }

    let update = format!("UPDATE {} SET title_key = ? WHERE id = ?", R::TABLE);
    let mut tx = pool.begin().await?;
    for row in &rows {
        let id: String = row.try_get("id")?;
        let title: String = row.try_get("title")?;
        sqlx::query(&update)
            .bind(title_key(&title))
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    debug!("Backfilled title_key for {} rows in {}", rows.len(), R::TABLE);
    Ok(())
}
