//! HTTP API server for the video player front end.
//!
//! Provides REST endpoints for asking questions, managing videos and reading
//! student progress.

use crate::catalog::Video;
use crate::cli::Output;
use crate::config::Settings;
use crate::error::SporError;
use crate::orchestrator::Orchestrator;
use crate::qa::{Query, SearchMode};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, instrument, warn};

/// Header carrying the authenticated student's ID.
const STUDENT_ID_HEADER: &str = "x-student-id";

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
}

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);

    let orchestrator = Orchestrator::new(settings)?;
    let index_reachable = orchestrator.probe_index().await;

    let state = Arc::new(AppState { orchestrator });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/qa", post(ask))
        .route("/videos", get(list_videos).post(add_video))
        .route("/videos/{video_id}", get(get_video).delete(remove_video))
        .route("/progress/{student_id}", get(student_progress))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Spør API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    if !index_reachable {
        Output::warning("Semantic index is not reachable; general questions will use full transcripts.");
    }
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Ask", "POST   /qa");
    Output::kv("Add Video", "POST   /videos");
    Output::kv("List Videos", "GET    /videos");
    Output::kv("Get Video", "GET    /videos/:video_id");
    Output::kv("Remove Video", "DELETE /videos/:video_id");
    Output::kv("Progress", "GET    /progress/:student_id");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QaRequest {
    video_id: String,
    question: String,
    /// "near" selects proximity context; anything else is a general question.
    /// The value is echoed back unchanged in the answer.
    #[serde(default)]
    search_type: Option<String>,
    #[serde(default)]
    current_time: Option<f64>,
}

impl QaRequest {
    fn into_query(self) -> Query {
        let mode = self
            .search_type
            .as_deref()
            .and_then(|s| s.parse::<SearchMode>().ok())
            .unwrap_or_default();

        Query {
            video_id: self.video_id,
            question: self.question,
            mode,
            playback_time_seconds: self.current_time,
            requested_search_type: self.search_type,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddVideoRequest {
    id: String,
    teacher_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    duration_seconds: f64,
}

impl AddVideoRequest {
    fn into_video(self) -> Video {
        let title = self.title.unwrap_or_else(|| self.id.clone());
        Video::new(self.id, self.teacher_id, title, self.transcript, self.duration_seconds)
    }
}

#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    data: T,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoSummary {
    id: String,
    teacher_id: String,
    title: String,
    duration_seconds: f64,
    word_count: usize,
}

impl From<&Video> for VideoSummary {
    fn from(video: &Video) -> Self {
        Self {
            id: video.id.clone(),
            teacher_id: video.teacher_id.clone(),
            title: video.title.clone(),
            duration_seconds: video.duration_seconds,
            word_count: video.word_count(),
        }
    }
}

fn ok<T: Serialize>(data: T) -> Response {
    Json(ApiResponse { success: true, data }).into_response()
}

fn status_for(err: &SporError) -> StatusCode {
    match err {
        SporError::VideoNotFound(_) => StatusCode::NOT_FOUND,
        SporError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: SporError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("Request failed: {}", err);
    }
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: err.to_string(),
        }),
    )
        .into_response()
}

fn rejection_response(rejection: JsonRejection) -> Response {
    warn!("Rejected request body: {}", rejection.body_text());
    error_response(SporError::InvalidInput(rejection.body_text()))
}

fn student_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(STUDENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
async fn ask(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<QaRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return rejection_response(rejection),
    };

    let student = student_id(&headers);
    let query = req.into_query();

    match state
        .orchestrator
        .answer_question(&query, student.as_deref())
        .await
    {
        Ok(result) => ok(result),
        Err(e) => error_response(e),
    }
}

async fn add_video(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AddVideoRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return rejection_response(rejection),
    };

    if req.id.trim().is_empty() || req.teacher_id.trim().is_empty() {
        return error_response(SporError::InvalidInput(
            "id and teacherId must not be empty".to_string(),
        ));
    }

    match state.orchestrator.add_video(&req.into_video(), true).await {
        Ok(result) => (StatusCode::CREATED, Json(ApiResponse { success: true, data: result }))
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn list_videos(State(state): State<Arc<AppState>>) -> Response {
    match state.orchestrator.catalog().list_videos().await {
        Ok(videos) => ok(videos.iter().map(VideoSummary::from).collect::<Vec<_>>()),
        Err(e) => error_response(e),
    }
}

async fn get_video(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
) -> Response {
    match state.orchestrator.catalog().get_video(&video_id).await {
        Ok(Some(video)) => ok(video),
        Ok(None) => error_response(SporError::VideoNotFound(video_id)),
        Err(e) => error_response(e),
    }
}

async fn remove_video(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
) -> Response {
    match state.orchestrator.remove_video(&video_id).await {
        Ok(()) => ok(serde_json::json!({ "videoId": video_id })),
        Err(e) => error_response(e),
    }
}

async fn student_progress(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<String>,
) -> Response {
    match state.orchestrator.tracker().progress_for_student(&student_id).await {
        Ok(progress) => ok(progress),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_qa_request_modes() {
        let near: QaRequest = serde_json::from_str(
            r#"{"videoId": "v1", "question": "What?", "searchType": "near", "currentTime": 12.5}"#,
        )
        .unwrap();
        let query = near.into_query();
        assert_eq!(query.mode, SearchMode::Proximity);
        assert_eq!(query.playback_time_seconds, Some(12.5));

        let general: QaRequest =
            serde_json::from_str(r#"{"videoId": "v1", "question": "What?"}"#).unwrap();
        assert_eq!(general.into_query().mode, SearchMode::Semantic);

        let unknown: QaRequest = serde_json::from_str(
            r#"{"videoId": "v1", "question": "What?", "searchType": "everywhere"}"#,
        )
        .unwrap();
        let unknown = unknown.into_query();
        assert_eq!(unknown.mode, SearchMode::Semantic);
        assert_eq!(unknown.search_type_label(), "everywhere");
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(status_for(&SporError::VideoNotFound("v".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&SporError::InvalidInput("q".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&SporError::SynthesisFailed("timeout".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_student_id_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(student_id(&headers), None);

        headers.insert(STUDENT_ID_HEADER, HeaderValue::from_static("  "));
        assert_eq!(student_id(&headers), None);

        headers.insert(STUDENT_ID_HEADER, HeaderValue::from_static("student-7"));
        assert_eq!(student_id(&headers), Some("student-7".to_string()));
    }

    #[test]
    fn test_add_video_title_defaults_to_id() {
        let req: AddVideoRequest = serde_json::from_str(
            r#"{"id": "v1", "teacherId": "t1", "transcript": "hello class"}"#,
        )
        .unwrap();
        let video = req.into_video();
        assert_eq!(video.title, "v1");
        assert_eq!(video.teacher_id, "t1");
        assert_eq!(video.duration_seconds, 0.0);
    }
}
