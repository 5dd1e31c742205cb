//! Vision Types
//!
//! Backend-agnostic annotation types, plus the Cloud Vision wire format they
//! are decoded from.

use serde::{Deserialize, Serialize};

/// Image handed to a detector
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// Decoded image bytes
    Inline(Vec<u8>),
    /// Publicly reachable URI (http, https or gs)
    Remote(String),
}

/// Polygon vertex in source image pixels. The Vision API leaves out
/// coordinates that are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
}

/// One text element reported by a detector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextAnnotation {
    pub text: String,
    pub confidence: Option<f64>,
    pub bounding_box: Option<Vec<Vertex>>,
    pub language: Option<String>,
}

/// Vision error types
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Failed to call Vision API: {0}")]
    Transport(String),

    #[error("Vision API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse Vision API response: {0}")]
    Malformed(String),

    #[error("Vision API error: {0}")]
    Api(String),
}

// ============================================================================
// Cloud Vision wire format (images:annotate)
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct BatchAnnotateRequest {
    pub requests: Vec<AnnotateImageRequest>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnnotateImageRequest {
    pub image: WireImage,
    pub features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireImage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<WireImageSource>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireImageSource {
    pub image_uri: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct Feature {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl Feature {
    pub fn text_detection() -> Self {
        Self {
            kind: "TEXT_DETECTION",
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchAnnotateResponse {
    #[serde(default)]
    pub responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnnotateImageResponse {
    #[serde(default)]
    pub text_annotations: Vec<EntityAnnotation>,
    #[serde(default)]
    pub error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiStatus {
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EntityAnnotation {
    pub description: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub bounding_poly: Option<BoundingPoly>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BoundingPoly {
    #[serde(default)]
    pub vertices: Vec<Vertex>,
}

impl From<EntityAnnotation> for TextAnnotation {
    fn from(annotation: EntityAnnotation) -> Self {
        let bounding_box = annotation
            .bounding_poly
            .map(|poly| poly.vertices)
            .filter(|vertices| !vertices.is_empty());

        Self {
            text: annotation.description,
            confidence: annotation.confidence.or(annotation.score),
            bounding_box,
            language: annotation.locale.filter(|l| !l.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = BatchAnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: WireImage {
                    content: None,
                    source: Some(WireImageSource {
                        image_uri: "gs://bucket/sign.jpg".to_string(),
                    }),
                },
                features: vec![Feature::text_detection()],
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "requests": [{
                    "image": { "source": { "imageUri": "gs://bucket/sign.jpg" } },
                    "features": [{ "type": "TEXT_DETECTION" }]
                }]
            })
        );
    }

    #[test]
    fn test_annotation_defaults() {
        let raw = r#"{
            "description": "STOP",
            "boundingPoly": { "vertices": [{ "x": 5 }, { "x": 40, "y": 3 }, {}, { "y": 30 }] }
        }"#;
        let entity: EntityAnnotation = serde_json::from_str(raw).unwrap();
        let annotation = TextAnnotation::from(entity);

        assert_eq!(annotation.text, "STOP");
        assert_eq!(annotation.confidence, None);
        assert_eq!(annotation.language, None);
        assert_eq!(
            annotation.bounding_box,
            Some(vec![
                Vertex { x: 5, y: 0 },
                Vertex { x: 40, y: 3 },
                Vertex { x: 0, y: 0 },
                Vertex { x: 0, y: 30 },
            ])
        );
    }

    #[test]
    fn test_score_used_when_confidence_missing() {
        let raw = r#"{ "description": "a", "score": 0.7, "locale": "en", "boundingPoly": {} }"#;
        let annotation = TextAnnotation::from(serde_json::from_str::<EntityAnnotation>(raw).unwrap());

        assert_eq!(annotation.confidence, Some(0.7));
        assert_eq!(annotation.language.as_deref(), Some("en"));
        assert_eq!(annotation.bounding_box, None);
    }

    #[test]
    fn test_missing_text_is_malformed() {
        let raw = r#"{ "locale": "en" }"#;
        assert!(serde_json::from_str::<EntityAnnotation>(raw).is_err());
    }
}
