//! Application state management

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::detection::DetectionService;
use crate::vision::{GoogleVisionDetector, TextDetector, VisionError};

/// Error type for state initialization
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to initialize Vision client: {0}")]
    VisionInit(#[from] VisionError),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    db: SqlitePool,
    detection: DetectionService,
}

impl AppState {
    /// Create a new application state
    ///
    /// Builds the one Vision client this process uses. Without an API key no
    /// client is built and detect requests fail their job.
    pub fn new(config: Config, db: SqlitePool) -> Result<Self, StateError> {
        let detector = match &config.vision.api_key {
            Some(api_key) => {
                let detector = GoogleVisionDetector::new(
                    &config.vision.endpoint,
                    api_key,
                    Duration::from_secs(config.vision.timeout_secs),
                )?;
                Some(Arc::new(detector) as Arc<dyn TextDetector>)
            }
            None => {
                tracing::warn!("VISION_API_KEY is not set; detection jobs will fail");
                None
            }
        };

        Ok(Self::with_detector(config, db, detector))
    }

    /// Create application state around an already built detector
    pub fn with_detector(
        config: Config,
        db: SqlitePool,
        detector: Option<Arc<dyn TextDetector>>,
    ) -> Self {
        let detection =
            DetectionService::new(db.clone(), detector, config.limits.max_image_bytes);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                detection,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the database pool
    pub fn db(&self) -> &SqlitePool {
        &self.inner.db
    }

    /// Get the job orchestrator
    pub fn detection(&self) -> &DetectionService {
        &self.inner.detection
    }
}
