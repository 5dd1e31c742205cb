//! Vision Module
//!
//! Wraps the external OCR provider behind [`TextDetector`]. The provider is
//! called once per job and its annotation list is returned untouched: no
//! reordering, no dedup, no retries.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use text_detect_server::vision::{GoogleVisionDetector, ImageSource, TextDetector};
//!
//! let detector = GoogleVisionDetector::new(endpoint, api_key, Duration::from_secs(30))?;
//! let annotations = detector
//!     .detect(&ImageSource::Remote("https://example.com/receipt.jpg".into()))
//!     .await?;
//! ```

mod provider;
mod types;

pub use provider::{GoogleVisionDetector, TextDetector};
pub use types::{ImageSource, TextAnnotation, Vertex, VisionError};

#[cfg(test)]
pub use provider::MockDetector;
