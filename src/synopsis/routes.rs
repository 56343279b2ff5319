//! REST endpoints for conversation, progress, documents and manual research.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;
use uuid::Uuid;

use crate::error::{DocumentError, Error};

use super::manager::SynopsisManager;
use super::model::Profile;
use super::research::{ResearchItem, ResearchOrchestrator};
use super::turn::TurnResponse;

const DEFAULT_SEARCH_LIMIT: usize = 5;
const MAX_SEARCH_LIMIT: usize = 20;

/// Shared state for the synopsis routes.
#[derive(Clone)]
pub struct SynopsisRouteState {
    pub manager: Arc<SynopsisManager>,
    pub research: Arc<ResearchOrchestrator>,
}

/// Maps crate errors onto HTTP responses.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Document(DocumentError::Locked { .. }) => StatusCode::CONFLICT,
            Error::Document(DocumentError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            Error::Document(DocumentError::NotFound(_)) => StatusCode::NOT_FOUND,
            other => {
                error!(error = %other, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({"error": self.0.to_string()}))).into_response()
    }
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": message}))).into_response()
}

/// GET /api/health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// POST /api/session
///
/// Issues a fresh session token. Nothing is stored until the first turn.
async fn create_session() -> impl IntoResponse {
    Json(serde_json::json!({"session_id": Uuid::new_v4().to_string()}))
}

#[derive(Debug, Deserialize)]
struct ConversationRequest {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    message: String,
    /// Client-held profile, used only to seed a session the server has never seen.
    #[serde(default)]
    profile: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ConversationResponse {
    session_id: String,
    #[serde(flatten)]
    turn: TurnResponse,
}

/// POST /api/conversation
async fn conversation(
    State(state): State<SynopsisRouteState>,
    Json(req): Json<ConversationRequest>,
) -> Result<Response, ApiError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Ok(bad_request("message is required"));
    }
    let session_id = req
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let turn = state
        .manager
        .process_turn(&session_id, message, req.profile.as_ref())
        .await?;
    Ok(Json(ConversationResponse { session_id, turn }).into_response())
}

/// GET /api/session/{id}
async fn get_session(
    State(state): State<SynopsisRouteState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    Ok(Json(state.manager.session(&session_id).await?).into_response())
}

/// GET /api/progress/{id}
async fn get_progress(
    State(state): State<SynopsisRouteState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    Ok(Json(state.manager.progress(&session_id).await?).into_response())
}

/// POST /api/session/{id}/reset
async fn reset_session(
    State(state): State<SynopsisRouteState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    let existed = state.manager.reset(&session_id).await?;
    Ok(Json(serde_json::json!({"session_id": session_id, "reset": existed})).into_response())
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    session_id: String,
}

/// POST /api/generate-synopsis
///
/// 409 while fewer than the required sections are filled.
async fn generate_synopsis(
    State(state): State<SynopsisRouteState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Response, ApiError> {
    let doc = state.manager.generate_document(&req.session_id).await?;
    Ok(Json(serde_json::json!({
        "filename": doc.filename,
        "download_url": format!("/api/download/{}", doc.filename),
    }))
    .into_response())
}

/// GET /api/download/{filename}
async fn download(
    State(state): State<SynopsisRouteState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let path = state.manager.locate_document(&filename)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| Error::Document(DocumentError::Io(e)))?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    #[serde(default)]
    limit: Option<usize>,
}

impl SearchParams {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT)
    }
}

/// GET /api/github-search?q=&limit=
async fn github_search(
    State(state): State<SynopsisRouteState>,
    Query(params): Query<SearchParams>,
) -> Response {
    if params.q.trim().is_empty() {
        return bad_request("q is required");
    }
    Json(state.research.search_repositories(params.q.trim(), params.limit()).await).into_response()
}

/// GET /api/research-papers?q=&limit=
async fn research_papers(
    State(state): State<SynopsisRouteState>,
    Query(params): Query<SearchParams>,
) -> Response {
    if params.q.trim().is_empty() {
        return bad_request("q is required");
    }
    Json(state.research.search_papers(params.q.trim(), params.limit()).await).into_response()
}

#[derive(Debug, Deserialize)]
struct AnalysisRequest {
    #[serde(default)]
    title: String,
    #[serde(default)]
    items: Vec<ResearchItem>,
}

/// POST /api/professional-analysis
async fn professional_analysis(
    State(state): State<SynopsisRouteState>,
    Json(req): Json<AnalysisRequest>,
) -> Response {
    if req.title.trim().is_empty() {
        return bad_request("title is required");
    }
    let analysis = state.research.analyze(req.title.trim(), &req.items).await;
    Json(serde_json::json!({"analysis": analysis})).into_response()
}

#[derive(Debug, Deserialize)]
struct SuggestionsRequest {
    /// Profile to advise on, in the same loose shape the conversation accepts.
    #[serde(default)]
    memory: Option<serde_json::Value>,
    #[serde(default)]
    session_id: Option<String>,
}

/// POST /api/ai-suggestions
///
/// Advises on `memory` when given, else on the stored profile of `session_id`.
async fn ai_suggestions(
    State(state): State<SynopsisRouteState>,
    Json(req): Json<SuggestionsRequest>,
) -> Result<Response, ApiError> {
    let profile = match (req.memory, req.session_id) {
        (Some(memory), _) => Profile::from_client_value(Some(&memory)),
        (None, Some(id)) if !id.trim().is_empty() => state.manager.session(id.trim()).await?.profile,
        _ => return Ok(bad_request("memory or session_id is required")),
    };
    let suggestions = state.research.suggest(&profile).await;
    Ok(Json(serde_json::json!({"suggestions": suggestions})).into_response())
}

/// Build the synopsis REST routes with CORS and request tracing.
pub fn synopsis_routes(state: SynopsisRouteState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/session", post(create_session))
        .route("/api/session/{id}", get(get_session))
        .route("/api/session/{id}/reset", post(reset_session))
        .route("/api/progress/{id}", get(get_progress))
        .route("/api/conversation", post(conversation))
        .route("/api/generate-synopsis", post(generate_synopsis))
        .route("/api/download/{filename}", get(download))
        .route("/api/github-search", get(github_search))
        .route("/api/research-papers", get(research_papers))
        .route("/api/professional-analysis", post(professional_analysis))
        .route("/api/ai-suggestions", post(ai_suggestions))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
