//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Detection jobs, one per submitted image
CREATE TABLE IF NOT EXISTS detection_jobs (
    id TEXT PRIMARY KEY,
    user_id TEXT,
    image_url TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'processing', 'completed', 'failed')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_detection_jobs_user_id ON detection_jobs(user_id);
CREATE INDEX IF NOT EXISTS idx_detection_jobs_status ON detection_jobs(status);

-- Detected text. Position 0 is the whole-image text, the rest are elements
-- in the order the Vision API reported them.
CREATE TABLE IF NOT EXISTS detected_text (
    id TEXT PRIMARY KEY,
    job_id TEXT NOT NULL REFERENCES detection_jobs(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    text_content TEXT NOT NULL,
    confidence REAL NOT NULL CHECK (confidence >= 0 AND confidence <= 1),
    -- JSON array of {x, y} vertices
    bounding_box TEXT,
    language TEXT,
    created_at TEXT NOT NULL,

    UNIQUE(job_id, position)
);

CREATE INDEX IF NOT EXISTS idx_detected_text_job_id ON detected_text(job_id);
"#;

#[cfg(test)]
mod tests {
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let (_dir, pool) = test_pool().await;
        super::initialize_schema(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_status_constraint() {
        let (_dir, pool) = test_pool().await;

        let result = sqlx::query(
            "INSERT INTO detection_jobs (id, image_url, status, created_at, updated_at)
             VALUES ('j1', 'x', 'queued', 'now', 'now')",
        )
        .execute(&pool)
        .await;

        assert!(result.is_err());
    }
}
