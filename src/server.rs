use crate::config::{AppConfig, SearchConfig};
use crate::data::{CandidateSchedule, CatalogInput, GenerationRequest, GenerationResponse, ScheduleEntry};
use crate::error::{CatalogIssue, GenerationError, UnservableRequirement};
use crate::solver::{self, AuditReport};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    pub catalog: CatalogInput,
    pub request: GenerationRequest,
}

#[derive(Debug, Deserialize)]
pub struct AuditBody {
    pub catalog: CatalogInput,
    pub entries: Vec<ScheduleEntry>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<CatalogIssue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unservable: Vec<UnservableRequirement>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub best_partial: Vec<CandidateSchedule>,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn error_response(e: GenerationError) -> ApiError {
    let mut body = ErrorBody {
        error: e.to_string(),
        kind: "",
        issues: Vec::new(),
        unservable: Vec::new(),
        best_partial: Vec::new(),
    };
    let status = match e {
        GenerationError::InvalidCatalog(issues) => {
            body.kind = "invalid_catalog";
            body.issues = issues;
            StatusCode::BAD_REQUEST
        }
        GenerationError::IncompleteCatalog(unservable) => {
            body.kind = "incomplete_catalog";
            body.unservable = unservable;
            StatusCode::BAD_REQUEST
        }
        GenerationError::InfeasibleRequest { best_partial } => {
            body.kind = "infeasible_request";
            body.best_partial = best_partial;
            StatusCode::UNPROCESSABLE_ENTITY
        }
    };
    (status, Json(body))
}

fn internal_error(message: String) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: message,
            kind: "internal",
            issues: Vec::new(),
            unservable: Vec::new(),
            best_partial: Vec::new(),
        }),
    )
}

// Raises the flag when the handler future is dropped, e.g. on client disconnect.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

#[derive(Clone)]
struct AppState {
    search: Arc<SearchConfig>,
}

async fn generate_handler(
    State(state): State<AppState>,
    Json(body): Json<GenerateBody>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let cancel = Arc::new(AtomicBool::new(false));
    let _guard = CancelOnDrop(cancel.clone());
    let search = state.search.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        solver::generate(&body.catalog, &body.request, &search, &cancel)
    })
    .await;

    match outcome {
        Ok(Ok(response)) => Ok(Json(response)),
        Ok(Err(e)) => Err(error_response(e)),
        Err(join_error) => {
            error!("Generation task failed: {}", join_error);
            Err(internal_error("timetable generation failed".to_string()))
        }
    }
}

async fn audit_handler(Json(body): Json<AuditBody>) -> Result<Json<AuditReport>, ApiError> {
    solver::audit(&body.catalog, &body.entries)
        .map(Json)
        .map_err(error_response)
}

pub fn router(config: &AppConfig) -> Router {
    let state = AppState {
        search: Arc::new(config.search.clone()),
    };
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/v1/timetable/generate", post(generate_handler))
        .route("/v1/timetable/audit", post(audit_handler))
        .with_state(state)
}

pub async fn run_server(config: AppConfig) -> std::io::Result<()> {
    let app = router(&config);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    info!("Server running at http://{}", listener.local_addr()?);
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn post_json(uri: &str, body: Value) -> (StatusCode, Value) {
        let response = router(&AppConfig::default())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn request() -> Value {
        json!({ "department_id": "dept_1", "academic_year": "2025-26", "semester": 3, "num_options": 1 })
    }

    #[tokio::test]
    async fn generate_returns_ranked_options() {
        let (status, body) = post_json(
            "/v1/timetable/generate",
            json!({ "catalog": single_subject_catalog(2, 5), "request": request() }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let options = body["options"].as_array().unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0]["entries"].as_array().unwrap().len(), 2);
        assert_eq!(options[0]["conflicts"], 0);
        assert_eq!(options[0]["entries"][0]["class_type"], "lecture");
        assert_eq!(body["stats"]["runs"], 1);
    }

    #[tokio::test]
    async fn infeasible_request_carries_partial_options() {
        let (status, body) = post_json(
            "/v1/timetable/generate",
            json!({ "catalog": single_subject_catalog(2, 1), "request": request() }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "infeasible_request");
        let partial = &body["best_partial"][0];
        assert_eq!(partial["entries"].as_array().unwrap().len(), 1);
        assert_eq!(partial["unmet_requirements"][0]["session_number"], 2);
    }

    #[tokio::test]
    async fn incomplete_catalog_is_a_bad_request() {
        let mut catalog = single_subject_catalog(2, 5);
        catalog.classrooms.clear();
        let (status, body) = post_json(
            "/v1/timetable/generate",
            json!({ "catalog": catalog, "request": request() }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "incomplete_catalog");
        assert_eq!(body["unservable"][0]["reason"], "no_eligible_classroom");
    }

    #[tokio::test]
    async fn audit_lists_conflicts() {
        let entry = json!({
            "time_slot_id": "slot_1",
            "subject_id": "subj_1",
            "faculty_id": "fac_1",
            "classroom_id": "room_1",
            "batch_id": "batch_1",
            "class_type": "lecture",
        });
        let (status, body) = post_json(
            "/v1/timetable/audit",
            json!({ "catalog": single_subject_catalog(2, 5), "entries": [entry.clone(), entry] }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let kinds: Vec<&str> = body["conflicts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["kind"].as_str().unwrap())
            .collect();
        assert!(kinds.contains(&"faculty_overlap"));
        assert!(kinds.contains(&"classroom_overlap"));
        assert!(kinds.contains(&"batch_overlap"));
    }

    #[test]
    fn dropping_the_guard_cancels() {
        let flag = Arc::new(AtomicBool::new(false));
        drop(CancelOnDrop(flag.clone()));
        assert!(flag.load(Ordering::Relaxed));
    }
}
