//! Detected text database operations

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::vision::Vertex;

/// Detected text record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: String,
    pub job_id: String,
    pub position: i64,
    pub text_content: String,
    pub confidence: f64,
    pub bounding_box: Option<Vec<Vertex>>,
    pub language: Option<String>,
    pub created_at: String,
}

/// Row as stored, with the polygon still JSON encoded
#[derive(Debug, sqlx::FromRow)]
struct DetectionRow {
    id: String,
    job_id: String,
    position: i64,
    text_content: String,
    confidence: f64,
    bounding_box: Option<String>,
    language: Option<String>,
    created_at: String,
}

impl TryFrom<DetectionRow> for Detection {
    type Error = AppError;

    fn try_from(row: DetectionRow) -> Result<Self> {
        let bounding_box = row
            .bounding_box
            .as_deref()
            .map(serde_json::from_str::<Vec<Vertex>>)
            .transpose()
            .map_err(|e| {
                AppError::Internal(format!("Corrupt bounding box on detection {}: {}", row.id, e))
            })?;

        Ok(Self {
            id: row.id,
            job_id: row.job_id,
            position: row.position,
            text_content: row.text_content,
            confidence: row.confidence,
            bounding_box,
            language: row.language,
            created_at: row.created_at,
        })
    }
}

/// Detection to be inserted; its position is its index in the batch
#[derive(Debug, Clone, PartialEq)]
pub struct NewDetection {
    pub text_content: String,
    pub confidence: f64,
    pub bounding_box: Option<Vec<Vertex>>,
    pub language: Option<String>,
}

/// Detection repository
pub struct DetectionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DetectionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert every detection for a job in one transaction.
    ///
    /// Rows are written in slice order with `position` = index, so the first
    /// entry stays first when read back. Either all rows land or none do.
    pub async fn insert_all(&self, job_id: &str, detections: &[NewDetection]) -> Result<Vec<Detection>> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(detections.len());

        for (position, detection) in detections.iter().enumerate() {
            let id = Uuid::new_v4().to_string();
            let position = position as i64;
            let bounding_box = detection
                .bounding_box
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| AppError::Internal(format!("Failed to encode bounding box: {}", e)))?;

            sqlx::query(
                r#"
                INSERT INTO detected_text (id, job_id, position, text_content, confidence, bounding_box, language, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(job_id)
            .bind(position)
            .bind(&detection.text_content)
            .bind(detection.confidence)
            .bind(&bounding_box)
            .bind(&detection.language)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

            inserted.push(Detection {
                id,
                job_id: job_id.to_string(),
                position,
                text_content: detection.text_content.clone(),
                confidence: detection.confidence,
                bounding_box: detection.bounding_box.clone(),
                language: detection.language.clone(),
                created_at: now.clone(),
            });
        }

        tx.commit().await?;

        Ok(inserted)
    }

    /// List detections for a job, aggregate text first
    pub async fn list_for_job(&self, job_id: &str) -> Result<Vec<Detection>> {
        let rows = sqlx::query_as::<_, DetectionRow>(
            r#"
            SELECT id, job_id, position, text_content, confidence, bounding_box, language, created_at
            FROM detected_text
            WHERE job_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Detection::try_from).collect()
    }

    /// Count detections for a job
    pub async fn count_for_job(&self, job_id: &str) -> Result<i64> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM detected_text WHERE job_id = ?")
            .bind(job_id)
            .fetch_one(self.pool)
            .await?;

        Ok(result.0)
    }
}
