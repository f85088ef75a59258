
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::models::{DocumentRecord, DocumentUpdate, NewDocument};

const SELECT_COLUMNS: &str = "SELECT id, filename, original_filename, file_path, file_type, \
     file_size, status, chunk_count, error_message, created_date, updated_date FROM documents";

pub struct DocumentQueries;

impl DocumentQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_document: NewDocument) -> Result<DocumentRecord> {
        let now = Utc::now().naive_utc();
        let id = sqlx::query(
            "INSERT INTO documents \
             (filename, original_filename, file_path, file_type, file_size, status, chunk_count, created_date) \
             VALUES (?, ?, ?, ?, ?, 'processing', 0, ?)",
        )
        .bind(&new_document.filename)
        .bind(&new_document.original_filename)
        .bind(&new_document.file_path)
        .bind(&new_document.file_type)
        .bind(new_document.file_size)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create document record")?
        .last_insert_rowid();

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created document record"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<DocumentRecord>> {
        let record = sqlx::query_as::<_, DocumentRecord>(&format!(
            "{SELECT_COLUMNS} WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get document by id")?;

        Ok(record)
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<DocumentRecord>> {
        let records = sqlx::query_as::<_, DocumentRecord>(&format!(
            "{SELECT_COLUMNS} ORDER BY created_date DESC, id DESC"
        ))
        .fetch_all(pool)
        .await
        .context("Failed to list documents")?;

        Ok(records)
    }

    #[inline]
    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        update: DocumentUpdate,
    ) -> Result<Option<DocumentRecord>> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            "UPDATE documents SET \
             status = COALESCE(?, status), \
             chunk_count = COALESCE(?, chunk_count), \
             error_message = COALESCE(?, error_message), \
             updated_date = ? \
             WHERE id = ?",
        )
        .bind(update.status)
        .bind(update.chunk_count)
        .bind(update.error_message)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update document record")?;

        Self::get_by_id(pool, id).await
    }

    /// Remove a record; returns false when no row matched
    #[inline]
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to delete document record")?;

        debug!("Deleted {} document record(s) for id {}", result.rows_affected(), id);
        Ok(result.rows_affected() > 0)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents")
            .fetch_one(pool)
            .await
            .context("Failed to count documents")?;

        Ok(count.0)
    }
}
