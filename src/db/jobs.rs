//! Detection job database operations

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Placeholder stored when a job is created before its image has a URL
pub const PLACEHOLDER_IMAGE_URL: &str = "pending-upload";

/// Job lifecycle.
///
/// `Pending` is the only entry state. `Completed` and `Failed` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown job status: {0}")]
pub struct UnknownStatus(String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Detection job record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionJob {
    pub id: String,
    pub user_id: Option<String>,
    pub image_url: String,
    pub status: JobStatus,
    pub created_at: String,
    pub updated_at: String,
    pub error_message: Option<String>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for DetectionJob {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = status.parse().map_err(|e| sqlx::Error::ColumnDecode {
            index: "status".to_string(),
            source: Box::new(e),
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            image_url: row.try_get("image_url")?,
            status,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            error_message: row.try_get("error_message")?,
        })
    }
}

/// Create job request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJob {
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Job repository
pub struct JobRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> JobRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a pending job
    pub async fn create(&self, user_id: Option<&str>, data: &CreateJob) -> Result<DetectionJob> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let image_url = data
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(PLACEHOLDER_IMAGE_URL);

        sqlx::query(
            r#"
            INSERT INTO detection_jobs (id, user_id, image_url, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(image_url)
        .bind(JobStatus::Pending.as_str())
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await?;

        self.get(&id)
            .await?
            .ok_or_else(|| AppError::Internal("Failed to fetch created job".to_string()))
    }

    /// Get a job regardless of owner
    pub async fn get(&self, id: &str) -> Result<Option<DetectionJob>> {
        let job = sqlx::query_as::<_, DetectionJob>(
            r#"
            SELECT id, user_id, image_url, status, created_at, updated_at, error_message
            FROM detection_jobs
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(job)
    }

    /// Get a job if the caller may see it: anonymous jobs are visible to
    /// everyone, owned jobs only to their owner.
    pub async fn get_visible(&self, id: &str, caller: Option<&str>) -> Result<Option<DetectionJob>> {
        let job = sqlx::query_as::<_, DetectionJob>(
            r#"
            SELECT id, user_id, image_url, status, created_at, updated_at, error_message
            FROM detection_jobs
            WHERE id = ? AND (user_id IS NULL OR user_id = ?)
            "#,
        )
        .bind(id)
        .bind(caller)
        .fetch_optional(self.pool)
        .await?;

        Ok(job)
    }

    /// List jobs visible to the caller, newest first
    pub async fn list_visible(&self, caller: Option<&str>, limit: i64) -> Result<Vec<DetectionJob>> {
        let jobs = sqlx::query_as::<_, DetectionJob>(
            r#"
            SELECT id, user_id, image_url, status, created_at, updated_at, error_message
            FROM detection_jobs
            WHERE user_id IS NULL OR user_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(caller)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(jobs)
    }

    /// Move a job from `from` to `to`, only if it is still in `from`.
    ///
    /// Returns `false` when the job does not exist or has already left `from`.
    /// The conditional update is the only serialization point between
    /// concurrent requests for the same job.
    pub async fn transition(
        &self,
        id: &str,
        from: JobStatus,
        to: JobStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        if !from.can_transition_to(to) {
            return Err(AppError::Internal(format!(
                "Illegal job transition {} -> {}",
                from, to
            )));
        }

        let now = Utc::now().to_rfc3339();
        let error_message = if to == JobStatus::Failed {
            error_message
        } else {
            None
        };

        let result = sqlx::query(
            r#"
            UPDATE detection_jobs
            SET status = ?, updated_at = ?, error_message = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(to.as_str())
        .bind(&now)
        .bind(error_message)
        .bind(id)
        .bind(from.as_str())
        .execute(self.pool)
        .await?;

        let applied = result.rows_affected() > 0;
        if applied {
            tracing::debug!(job_id = %id, from = %from, to = %to, "Job transitioned");
        }

        Ok(applied)
    }

    /// Claim a pending job for processing
    pub async fn start_processing(&self, id: &str) -> Result<bool> {
        self.transition(id, JobStatus::Pending, JobStatus::Processing, None)
            .await
    }

    pub async fn complete(&self, id: &str) -> Result<bool> {
        self.transition(id, JobStatus::Processing, JobStatus::Completed, None)
            .await
    }

    pub async fn fail(&self, id: &str, error_message: &str) -> Result<bool> {
        self.transition(id, JobStatus::Processing, JobStatus::Failed, Some(error_message))
            .await
    }

    /// Delete a job and, through the foreign key, its detections
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM detection_jobs WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
