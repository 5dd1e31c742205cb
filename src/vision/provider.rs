//! Text detection backends
//!
//! Defines the detector trait and the Google Cloud Vision implementation.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;

use super::types::{
    AnnotateImageRequest, BatchAnnotateRequest, BatchAnnotateResponse, Feature, ImageSource,
    TextAnnotation, VisionError, WireImage, WireImageSource,
};

/// Header carrying the Cloud Vision API key. The key never goes in the URL.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Longest non-2xx response body kept in an error
pub const MAX_ERROR_BODY_BYTES: usize = 2048;

/// Text detector trait
#[async_trait]
pub trait TextDetector: Send + Sync {
    /// Short backend name for logs
    fn provider_name(&self) -> &'static str;

    /// Detect text in one image.
    ///
    /// Annotations come back in the backend's order. For Cloud Vision the
    /// first entry is the text of the whole image.
    async fn detect(&self, image: &ImageSource) -> Result<Vec<TextAnnotation>, VisionError>;
}

/// Google Cloud Vision `TEXT_DETECTION` backend
pub struct GoogleVisionDetector {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GoogleVisionDetector {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self, VisionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VisionError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn build_request(image: &ImageSource) -> BatchAnnotateRequest {
        let image = match image {
            ImageSource::Inline(bytes) => WireImage {
                content: Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
                source: None,
            },
            ImageSource::Remote(uri) => WireImage {
                content: None,
                source: Some(WireImageSource {
                    image_uri: uri.clone(),
                }),
            },
        };

        BatchAnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image,
                features: vec![Feature::text_detection()],
            }],
        }
    }
}

/// Pull the annotation list for the single submitted image out of a batch
/// response, keeping the provider's order.
pub(crate) fn parse_response(body: &str) -> Result<Vec<TextAnnotation>, VisionError> {
    let batch: BatchAnnotateResponse =
        serde_json::from_str(body).map_err(|e| VisionError::Malformed(e.to_string()))?;

    let Some(response) = batch.responses.into_iter().next() else {
        return Ok(Vec::new());
    };

    if let Some(status) = response.error {
        let message = match status.code {
            Some(code) => format!("{} (code {})", status.message, code),
            None => status.message,
        };
        return Err(VisionError::Api(message));
    }

    Ok(response
        .text_annotations
        .into_iter()
        .map(TextAnnotation::from)
        .collect())
}

/// Cut an error body down to at most `max` bytes on a char boundary.
fn truncate_body(mut body: String, max: usize) -> String {
    if body.len() <= max {
        return body;
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body.truncate(end);
    body.push_str("... (truncated)");
    body
}

#[async_trait]
impl TextDetector for GoogleVisionDetector {
    fn provider_name(&self) -> &'static str {
        "google-vision"
    }

    async fn detect(&self, image: &ImageSource) -> Result<Vec<TextAnnotation>, VisionError> {
        let request = Self::build_request(image);

        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| VisionError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            VisionError::Transport(format!("Failed to read response: {}", e.without_url()))
        })?;

        if !status.is_success() {
            return Err(VisionError::Status {
                status: status.as_u16(),
                body: truncate_body(body, MAX_ERROR_BODY_BYTES),
            });
        }

        parse_response(&body)
    }
}

/// Scripted detector for tests
#[cfg(test)]
pub struct MockDetector {
    outcome: Result<Vec<TextAnnotation>, String>,
    delay: Option<Duration>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockDetector {
    pub fn returning(annotations: Vec<TextAnnotation>) -> Self {
        Self {
            outcome: Ok(annotations),
            delay: None,
            calls: Default::default(),
        }
    }

    pub fn failing(body: &str) -> Self {
        Self {
            outcome: Err(body.to_string()),
            delay: None,
            calls: Default::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl TextDetector for MockDetector {
    fn provider_name(&self) -> &'static str {
        "mock"
    }

    async fn detect(&self, _image: &ImageSource) -> Result<Vec<TextAnnotation>, VisionError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.outcome {
            Ok(annotations) => Ok(annotations.clone()),
            Err(body) => Err(VisionError::Status {
                status: 503,
                body: body.clone(),
            }),
        }
    }
}
