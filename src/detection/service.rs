//! Detection Service
//!
//! Drives one job through pending -> processing -> completed | failed and
//! calls the text detector exactly once per job.

use std::sync::Arc;

use sqlx::SqlitePool;

use super::error::DetectError;
use super::payload::ImagePayload;
use crate::db::{Detection, DetectionRepository, JobRepository, JobStatus, NewDetection};
use crate::vision::{ImageSource, TextAnnotation, TextDetector};

/// Confidence recorded when the backend does not report one
pub const DEFAULT_CONFIDENCE: f64 = 0.95;

/// Failure recorded on a job when no detector credentials are configured
pub const MISSING_CREDENTIALS_MESSAGE: &str = "Vision API key is not configured";

/// Job orchestrator
#[derive(Clone)]
pub struct DetectionService {
    pool: SqlitePool,
    detector: Option<Arc<dyn TextDetector>>,
    max_image_bytes: usize,
}

impl DetectionService {
    /// `detector` is `None` when the backend credentials are missing; jobs
    /// then fail after being claimed.
    pub fn new(
        pool: SqlitePool,
        detector: Option<Arc<dyn TextDetector>>,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            pool,
            detector,
            max_image_bytes,
        }
    }

    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }

    /// Run text detection for a pending job.
    ///
    /// Runs on its own task: once the job is claimed, a dropped connection
    /// must not leave it in `processing`.
    pub async fn process(
        &self,
        job_id: &str,
        payload: ImagePayload,
    ) -> Result<Vec<Detection>, DetectError> {
        let service = self.clone();
        let job_id = job_id.trim().to_string();

        tokio::spawn(async move { service.process_job(&job_id, &payload).await })
            .await
            .map_err(|e| DetectError::Internal(format!("Detection task failed: {}", e)))?
    }

    async fn process_job(
        &self,
        job_id: &str,
        payload: &ImagePayload,
    ) -> Result<Vec<Detection>, DetectError> {
        if job_id.is_empty() {
            return Err(DetectError::InvalidInput("jobId is required".to_string()));
        }

        // Nothing below may touch the job until it has been claimed
        let image = payload.resolve(self.max_image_bytes)?;

        let jobs = JobRepository::new(&self.pool);
        let job = jobs
            .get(job_id)
            .await?
            .ok_or_else(|| DetectError::NotFound(job_id.to_string()))?;

        if job.status != JobStatus::Pending {
            return Err(DetectError::Conflict {
                job_id: job.id,
                status: job.status,
            });
        }

        if !jobs.start_processing(job_id).await? {
            // Lost the race to another request for the same job
            let status = jobs
                .get(job_id)
                .await?
                .map(|j| j.status)
                .ok_or_else(|| DetectError::NotFound(job_id.to_string()))?;
            return Err(DetectError::Conflict {
                job_id: job_id.to_string(),
                status,
            });
        }

        tracing::info!(job_id = %job_id, "Processing detection job");

        match self.run(job_id, &image).await {
            Ok(detections) => {
                tracing::info!(
                    job_id = %job_id,
                    count = detections.len(),
                    "Detection job completed"
                );
                Ok(detections)
            }
            Err(err) => {
                self.record_failure(job_id, &err).await;
                Err(err)
            }
        }
    }

    /// Everything after the job is claimed. Any error returned here is
    /// recorded on the job by the caller.
    async fn run(&self, job_id: &str, image: &ImageSource) -> Result<Vec<Detection>, DetectError> {
        let detector = self
            .detector
            .as_ref()
            .ok_or_else(|| DetectError::ServiceUnavailable(MISSING_CREDENTIALS_MESSAGE.to_string()))?;

        let annotations = detector.detect(image).await.map_err(|e| {
            tracing::warn!(
                job_id = %job_id,
                provider = detector.provider_name(),
                "Text detection failed: {}",
                e
            );
            DetectError::Upstream(e.to_string())
        })?;

        let rows = build_detections(annotations);

        let detections = if rows.is_empty() {
            Vec::new()
        } else {
            DetectionRepository::new(&self.pool)
                .insert_all(job_id, &rows)
                .await
                .map_err(|e| DetectError::Persistence(format!("Failed to store detections: {}", e)))?
        };

        let completed = JobRepository::new(&self.pool)
            .complete(job_id)
            .await
            .map_err(|e| DetectError::Persistence(format!("Failed to complete job: {}", e)))?;
        if !completed {
            return Err(DetectError::Persistence(format!(
                "Job {} left processing before it could be completed",
                job_id
            )));
        }

        Ok(detections)
    }

    async fn record_failure(&self, job_id: &str, err: &DetectError) {
        let message = err.to_string();
        match JobRepository::new(&self.pool).fail(job_id, &message).await {
            Ok(true) => {
                tracing::warn!(job_id = %job_id, "Detection job failed: {}", message);
            }
            Ok(false) => {
                tracing::warn!(
                    job_id = %job_id,
                    "Detection job failed but was no longer processing: {}",
                    message
                );
            }
            Err(store_err) => {
                tracing::error!(
                    job_id = %job_id,
                    "Failed to record job failure ({}): {}",
                    message,
                    store_err
                );
            }
        }
    }
}

/// Map backend annotations to rows. The first annotation is the whole-image
/// text and stays first; the rest follow in backend order.
pub fn build_detections(annotations: Vec<TextAnnotation>) -> Vec<NewDetection> {
    annotations
        .into_iter()
        .map(|annotation| NewDetection {
            text_content: annotation.text,
            confidence: normalize_confidence(annotation.confidence),
            bounding_box: annotation.bounding_box,
            language: annotation.language,
        })
        .collect()
}

fn normalize_confidence(confidence: Option<f64>) -> f64 {
    match confidence {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
        _ => DEFAULT_CONFIDENCE,
    }
}
