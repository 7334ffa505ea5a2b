//! Seen-item persistence: keys of items already delivered.

use crate::error::DatabaseError;
use crate::types::SeenKey;
use crate::{Error, Result};

use super::{Database, SeenRow};

impl Database {
    /// Check if an item has been recorded as delivered
    pub async fn is_item_seen(&self, key: &SeenKey) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM seen_items WHERE source = ? AND item_id = ?
            "#,
        )
        .bind(&key.source)
        .bind(&key.item_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to check if item is seen: {}",
                e
            )))
        })?;

        Ok(count > 0)
    }

    /// Record an item as delivered
    ///
    /// Idempotent: recording an existing key keeps its original timestamp.
    pub async fn mark_item_seen(&self, key: &SeenKey) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO seen_items (source, item_id, seen_at)
            VALUES (?, ?, ?)
            ON CONFLICT(source, item_id) DO NOTHING
            "#,
        )
        .bind(&key.source)
        .bind(&key.item_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to mark item as seen: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Get every recorded item
    pub async fn get_seen_items(&self) -> Result<Vec<SeenRow>> {
        let rows = sqlx::query_as::<_, SeenRow>(
            r#"
            SELECT source, item_id, seen_at
            FROM seen_items
            ORDER BY seen_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to load seen items: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Count recorded items
    pub async fn count_seen_items(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seen_items")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count seen items: {}",
                    e
                )))
            })?;

        Ok(count)
    }

    /// Delete items recorded before the given unix timestamp
    ///
    /// Returns the number of rows removed.
    pub async fn delete_seen_before(&self, cutoff: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM seen_items WHERE seen_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to prune seen items: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected())
    }

    /// Fold the write-ahead log back into the main database file
    pub async fn checkpoint(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(PASSIVE)")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to checkpoint database: {}",
                    e
                )))
            })?;

        Ok(())
    }
}
