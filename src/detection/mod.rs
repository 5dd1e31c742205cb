//! Detection Module
//!
//! Turns one image and one pending job into stored detections, or into a
//! failure recorded on the job.
//!
//! Job lifecycle:
//!
//! ```text
//! pending --> processing --> completed
//!                       \--> failed
//! ```
//!
//! Input problems, unknown jobs and non-pending jobs are rejected before the
//! job is touched. Anything that goes wrong after the job is claimed is
//! written back to the job before the error is returned.

mod error;
mod payload;
mod service;

pub use error::DetectError;
pub use payload::{DetectRequest, DetectResponse, ImagePayload};
pub use service::{build_detections, DetectionService, DEFAULT_CONFIDENCE, MISSING_CREDENTIALS_MESSAGE};
