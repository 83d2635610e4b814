//! Cursor repository implementation for PostgreSQL.

use async_trait::async_trait;
use sqlx::PgPool;

use meridian_core::error::{StorageError, StorageResult};
use meridian_core::models::IngestCursor;
use meridian_core::ports::CursorRepository;

use super::database::Database;

/// PostgreSQL implementation of CursorRepository.
pub struct PgCursorRepository {
    pool: PgPool,
}

impl PgCursorRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

#[async_trait]
impl CursorRepository for PgCursorRepository {
    async fn get_cursor(&self, stream_id: &str) -> StorageResult<Option<IngestCursor>> {
        let row = sqlx::query_as::<_, CursorRow>(
            r#"
            SELECT stream_id, last_height, updated_at
            FROM ingest_cursor
            WHERE stream_id = $1
            "#,
        )
        .bind(stream_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(row.map(CursorRow::into_cursor))
    }

    async fn set_cursor(&self, cursor: &IngestCursor) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ingest_cursor (stream_id, last_height, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (stream_id) DO UPDATE SET
                last_height = EXCLUDED.last_height,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&cursor.stream_id)
        .bind(cursor.last_height as i64)
        .bind(cursor.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(())
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(sqlx::FromRow)]
struct CursorRow {
    stream_id: String,
    last_height: i64,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl CursorRow {
    fn into_cursor(self) -> IngestCursor {
        IngestCursor {
            stream_id: self.stream_id,
            last_height: self.last_height as u64,
            updated_at: self.updated_at,
        }
    }
}
