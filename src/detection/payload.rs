//! Detect request types and image payload validation

use base64::Engine;
use serde::{Deserialize, Serialize};

use super::error::DetectError;
use crate::db::Detection;
use crate::vision::ImageSource;

/// URI schemes the Vision API can fetch from
const REMOTE_SCHEMES: &[&str] = &["http", "https", "gs"];

/// Detect request body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectRequest {
    #[serde(default)]
    pub job_id: String,
    #[serde(flatten)]
    pub image: ImagePayload,
}

/// Image to run detection on: exactly one of a URL or inline base64
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_base64: Option<String>,
}

/// Detect response body
#[derive(Debug, Serialize, Deserialize)]
pub struct DetectResponse {
    pub success: bool,
    pub message: String,
    pub count: usize,
    pub detections: Vec<Detection>,
}

impl DetectResponse {
    pub fn new(detections: Vec<Detection>) -> Self {
        let message = if detections.is_empty() {
            "No text detected".to_string()
        } else {
            format!("Detected {} text elements", detections.len())
        };

        Self {
            success: true,
            message,
            count: detections.len(),
            detections,
        }
    }
}

impl ImagePayload {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            image_url: Some(url.into()),
            image_base64: None,
        }
    }

    pub fn from_base64(data: impl Into<String>) -> Self {
        Self {
            image_url: None,
            image_base64: Some(data.into()),
        }
    }

    /// Validate the payload and turn it into something a detector accepts.
    ///
    /// Inline data is decoded here so size and encoding problems are caught
    /// before the job is touched.
    pub fn resolve(&self, max_image_bytes: usize) -> Result<ImageSource, DetectError> {
        let url = non_blank(&self.image_url);
        let data = non_blank(&self.image_base64);

        match (url, data) {
            (Some(_), Some(_)) => Err(DetectError::InvalidInput(
                "Provide either imageUrl or imageBase64, not both".to_string(),
            )),
            (None, None) => Err(DetectError::InvalidInput(
                "Either imageUrl or imageBase64 is required".to_string(),
            )),
            (Some(url), None) => parse_remote(url),
            (None, Some(data)) => decode_inline(data, max_image_bytes),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_remote(url: &str) -> Result<ImageSource, DetectError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| DetectError::InvalidInput(format!("Invalid imageUrl: {}", e)))?;

    if !REMOTE_SCHEMES.contains(&parsed.scheme()) {
        return Err(DetectError::InvalidInput(format!(
            "Unsupported imageUrl scheme: {}",
            parsed.scheme()
        )));
    }

    Ok(ImageSource::Remote(url.to_string()))
}

fn decode_inline(data: &str, max_image_bytes: usize) -> Result<ImageSource, DetectError> {
    // Browsers hand over data URLs: "data:image/png;base64,...."
    let encoded = match data.strip_prefix("data:") {
        Some(rest) => match rest.split_once(";base64,") {
            Some((_, encoded)) => encoded,
            None => {
                return Err(DetectError::InvalidInput(
                    "Data URL is not base64 encoded".to_string(),
                ))
            }
        },
        None => data,
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| DetectError::InvalidInput(format!("Invalid base64 image data: {}", e)))?;

    if bytes.len() > max_image_bytes {
        return Err(DetectError::PayloadTooLarge {
            size: bytes.len(),
            max: max_image_bytes,
        });
    }

    if bytes.is_empty() {
        return Err(DetectError::InvalidInput("Image data is empty".to_string()));
    }

    Ok(ImageSource::Inline(bytes))
}
