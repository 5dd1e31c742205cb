//! Detect endpoint
//!
//! POST /api/v1/detect - run text detection for a pending job

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::detection::{DetectError, DetectRequest, DetectResponse};
use crate::state::AppState;

/// POST /api/v1/detect
///
/// Body: `{ "jobId": string, "imageUrl"?: string, "imageBase64"?: string }`
pub async fn detect_text(
    State(state): State<AppState>,
    payload: Result<Json<DetectRequest>, JsonRejection>,
) -> Result<Json<DetectResponse>, DetectError> {
    let Json(request) = payload.map_err(|e| DetectError::InvalidInput(e.body_text()))?;

    let detections = state
        .detection()
        .process(&request.job_id, request.image)
        .await?;

    Ok(Json(DetectResponse::new(detections)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use base64::Engine;
    use serde_json::{json, Value};

    use crate::db::{DetectionJob, JobStatus};
    use crate::detection::{DetectResponse, MISSING_CREDENTIALS_MESSAGE};
    use crate::routes::test_server;
    use crate::vision::{MockDetector, TextAnnotation, TextDetector};

    fn annotation(text: &str) -> TextAnnotation {
        TextAnnotation {
            text: text.to_string(),
            confidence: None,
            bounding_box: None,
            language: None,
        }
    }

    fn mock(annotations: Vec<TextAnnotation>) -> Option<Arc<dyn TextDetector>> {
        Some(Arc::new(MockDetector::returning(annotations)))
    }

    #[tokio::test]
    async fn test_detect_flow() {
        let (_dir, server) = test_server(mock(vec![
            annotation("EXIT 12"),
            annotation("EXIT"),
            annotation("12"),
        ]))
        .await;

        let job: DetectionJob = server
            .post("/api/v1/jobs")
            .json(&json!({ "imageUrl": "https://example.com/sign.jpg" }))
            .await
            .json();

        let response = server
            .post("/api/v1/detect")
            .json(&json!({ "jobId": job.id, "imageUrl": "https://example.com/sign.jpg" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let body: DetectResponse = response.json();
        assert!(body.success);
        assert_eq!(body.count, 3);
        assert_eq!(body.detections[0].text_content, "EXIT 12");
        assert_eq!(body.detections[0].confidence, 0.95);

        let stored: Vec<Value> = server
            .get(&format!("/api/v1/jobs/{}/detections", job.id))
            .await
            .json();
        let texts: Vec<_> = stored.iter().map(|d| d["text_content"].clone()).collect();
        assert_eq!(texts, vec![json!("EXIT 12"), json!("EXIT"), json!("12")]);

        let job: DetectionJob = server.get(&format!("/api/v1/jobs/{}", job.id)).await.json();
        assert_eq!(job.status, JobStatus::Completed);

        // Re-entrant call is rejected
        let again = server
            .post("/api/v1/detect")
            .json(&json!({ "jobId": job.id, "imageUrl": "https://example.com/sign.jpg" }))
            .await;
        assert_eq!(again.status_code(), StatusCode::CONFLICT);
        assert!(again.json::<Value>()["error"].as_str().unwrap().contains("completed"));
    }

    #[tokio::test]
    async fn test_unknown_job_is_404() {
        let (_dir, server) = test_server(mock(vec![])).await;

        let response = server
            .post("/api/v1/detect")
            .json(&json!({ "jobId": "nope", "imageBase64": "aGVsbG8=" }))
            .await;

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert!(response.json::<Value>()["error"].is_string());
    }

    #[tokio::test]
    async fn test_oversized_image_is_400() {
        let (_dir, server) = test_server(mock(vec![])).await;
        let job: DetectionJob = server.post("/api/v1/jobs").json(&json!({})).await.json();

        let big = base64::engine::general_purpose::STANDARD.encode(vec![7u8; 12 * 1024 * 1024]);
        let response = server
            .post("/api/v1/detect")
            .json(&json!({ "jobId": job.id, "imageBase64": big }))
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert!(response.json::<Value>()["error"]
            .as_str()
            .unwrap()
            .starts_with("Image too large"));

        let job: DetectionJob = server.get(&format!("/api/v1/jobs/{}", job.id)).await.json();
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let (_dir, server) = test_server(mock(vec![])).await;

        let response = server
            .post("/api/v1/detect")
            .bytes("{ not json".into())
            .content_type("application/json")
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert!(response.json::<Value>()["error"].is_string());
    }

    #[tokio::test]
    async fn test_missing_image_is_400() {
        let (_dir, server) = test_server(mock(vec![])).await;
        let job: DetectionJob = server.post("/api/v1/jobs").json(&json!({})).await.json();

        let response = server
            .post("/api/v1/detect")
            .json(&json!({ "jobId": job.id }))
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_backend_failure_is_500_and_recorded() {
        let (_dir, server) =
            test_server(Some(Arc::new(MockDetector::failing("backend exploded")))).await;
        let job: DetectionJob = server.post("/api/v1/jobs").json(&json!({})).await.json();

        let response = server
            .post("/api/v1/detect")
            .json(&json!({ "jobId": job.id, "imageBase64": "aGVsbG8=" }))
            .await;

        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let error = response.json::<Value>()["error"].as_str().unwrap().to_string();
        assert!(error.contains("backend exploded"));

        let job: DetectionJob = server.get(&format!("/api/v1/jobs/{}", job.id)).await.json();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some(error.as_str()));
    }

    #[tokio::test]
    async fn test_missing_credentials_is_500() {
        let (_dir, server) = test_server(None).await;
        let job: DetectionJob = server.post("/api/v1/jobs").json(&json!({})).await.json();

        let response = server
            .post("/api/v1/detect")
            .json(&json!({ "jobId": job.id, "imageUrl": "https://example.com/a.png" }))
            .await;

        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.json::<Value>()["error"], MISSING_CREDENTIALS_MESSAGE);
    }
}
