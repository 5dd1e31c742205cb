//! Detection job API routes
//!
//! Callers only see jobs that are anonymous or their own. Deleting a job is
//! reserved for the service identity.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::caller::Caller;
use crate::db::{CreateJob, Detection, DetectionJob, DetectionRepository, JobRepository};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Create the jobs router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_jobs).post(create_job))
        .route("/:id", get(get_job).delete(delete_job))
        .route("/:id/detections", get(list_detections))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<i64>,
}

/// Create a pending job
async fn create_job(
    State(state): State<AppState>,
    caller: Caller,
    payload: std::result::Result<Json<CreateJob>, JsonRejection>,
) -> Result<(StatusCode, Json<DetectionJob>)> {
    let Json(data) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let repo = JobRepository::new(state.db());
    let job = repo.create(caller.user_id(), &data).await?;

    tracing::info!(job_id = %job.id, owner = ?job.user_id, "Detection job created");

    Ok((StatusCode::CREATED, Json(job)))
}

/// List jobs visible to the caller
async fn list_jobs(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<DetectionJob>>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 100);
    let repo = JobRepository::new(state.db());
    let jobs = repo.list_visible(caller.user_id(), limit).await?;
    Ok(Json(jobs))
}

/// Get a specific job
async fn get_job(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<DetectionJob>> {
    let job = visible_job(&state, &caller, &id).await?;
    Ok(Json(job))
}

/// List detections for a job, aggregate text first
async fn list_detections(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Vec<Detection>>> {
    let job = visible_job(&state, &caller, &id).await?;
    let detections = DetectionRepository::new(state.db())
        .list_for_job(&job.id)
        .await?;
    Ok(Json(detections))
}

/// Delete a job and its detections
async fn delete_job(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !caller.is_service {
        return Err(AppError::Forbidden(
            "Deleting jobs requires the service key".to_string(),
        ));
    }

    let repo = JobRepository::new(state.db());
    if repo.delete(&id).await? {
        tracing::info!(job_id = %id, "Detection job deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Job not found: {}", id)))
    }
}

async fn visible_job(state: &AppState, caller: &Caller, id: &str) -> Result<DetectionJob> {
    JobRepository::new(state.db())
        .get_visible(id, caller.user_id())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job not found: {}", id)))
}

#[cfg(test)]
mod tests {
    use axum::http::{header, HeaderName, HeaderValue, StatusCode};
    use serde_json::{json, Value};

    use crate::db::{DetectionJob, JobStatus};
    use crate::routes::{test_server, TEST_SERVICE_KEY};

    fn user(id: &'static str) -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static("x-user-id"),
            HeaderValue::from_static(id),
        )
    }

    #[tokio::test]
    async fn test_create_and_get_job() {
        let (_dir, server) = test_server(None).await;

        let response = server
            .post("/api/v1/jobs")
            .json(&json!({ "imageUrl": "https://example.com/a.png" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        let job: DetectionJob = response.json();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.user_id.is_none());

        let fetched: DetectionJob = server.get(&format!("/api/v1/jobs/{}", job.id)).await.json();
        assert_eq!(fetched.id, job.id);
        assert_eq!(fetched.image_url, "https://example.com/a.png");

        let detections: Vec<Value> = server
            .get(&format!("/api/v1/jobs/{}/detections", job.id))
            .await
            .json();
        assert!(detections.is_empty());
    }

    #[tokio::test]
    async fn test_create_job_rejects_malformed_body() {
        let (_dir, server) = test_server(None).await;

        let response = server
            .post("/api/v1/jobs")
            .bytes("{ nope".into())
            .content_type("application/json")
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert!(response.json::<Value>()["error"].is_string());

        let response = server
            .post("/api/v1/jobs")
            .json(&json!({ "imageUrl": 42 }))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert!(response.json::<Value>()["error"]
            .as_str()
            .unwrap()
            .contains("imageUrl"));

        let jobs: Vec<DetectionJob> = server.get("/api/v1/jobs").await.json();
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn test_owned_jobs_are_private() {
        let (_dir, server) = test_server(None).await;
        let (name, alice) = user("alice");

        let job: DetectionJob = server
            .post("/api/v1/jobs")
            .add_header(name.clone(), alice.clone())
            .json(&json!({}))
            .await
            .json();
        assert_eq!(job.user_id.as_deref(), Some("alice"));

        let path = format!("/api/v1/jobs/{}", job.id);
        let own = server.get(&path).add_header(name.clone(), alice).await;
        assert_eq!(own.status_code(), StatusCode::OK);

        let (_, bob) = user("bob");
        let other = server.get(&path).add_header(name, bob).await;
        assert_eq!(other.status_code(), StatusCode::NOT_FOUND);

        let anonymous = server.get(&path).await;
        assert_eq!(anonymous.status_code(), StatusCode::NOT_FOUND);
        assert!(anonymous.json::<Value>()["error"].is_string());
    }

    #[tokio::test]
    async fn test_list_jobs() {
        let (_dir, server) = test_server(None).await;
        let (name, alice) = user("alice");

        server.post("/api/v1/jobs").json(&json!({})).await;
        server
            .post("/api/v1/jobs")
            .add_header(name.clone(), alice.clone())
            .json(&json!({}))
            .await;

        let mine: Vec<DetectionJob> = server
            .get("/api/v1/jobs")
            .add_header(name, alice)
            .await
            .json();
        assert_eq!(mine.len(), 2);

        let anonymous: Vec<DetectionJob> = server.get("/api/v1/jobs").await.json();
        assert_eq!(anonymous.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_requires_service_key() {
        let (_dir, server) = test_server(None).await;
        let job: DetectionJob = server.post("/api/v1/jobs").json(&json!({})).await.json();
        let path = format!("/api/v1/jobs/{}", job.id);

        let denied = server.delete(&path).await;
        assert_eq!(denied.status_code(), StatusCode::FORBIDDEN);

        let wrong = server
            .delete(&path)
            .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer guess"))
            .await;
        assert_eq!(wrong.status_code(), StatusCode::FORBIDDEN);

        let bearer = HeaderValue::from_str(&format!("Bearer {}", TEST_SERVICE_KEY)).unwrap();
        let deleted = server
            .delete(&path)
            .add_header(header::AUTHORIZATION, bearer.clone())
            .await;
        assert_eq!(deleted.status_code(), StatusCode::NO_CONTENT);

        assert_eq!(server.get(&path).await.status_code(), StatusCode::NOT_FOUND);

        let again = server
            .delete(&path)
            .add_header(header::AUTHORIZATION, bearer)
            .await;
        assert_eq!(again.status_code(), StatusCode::NOT_FOUND);
    }
}
