//! Editing session routes.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::routes::{bad_request, error_response};
use crate::state::AppState;

const DEFAULT_REVISION_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenRequest {
    pub text: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FieldEditRequest {
    pub ordinal: usize,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct TextEditRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct RegenerateRequest {
    pub instruction: String,
}

#[derive(Debug, Deserialize)]
pub struct RevisionsQuery {
    pub limit: Option<usize>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", post(open_session))
        .route("/sessions/{id}", get(get_session).delete(close_session))
        .route("/sessions/{id}/fields", post(edit_field))
        .route("/sessions/{id}/text", put(edit_text))
        .route("/sessions/{id}/regenerate", post(regenerate))
        .route("/sessions/{id}/save", post(save))
        .route("/sessions/{id}/revisions", get(list_revisions))
}

// ---------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------

/// POST /api/sessions: open on new text, or reopen persisted text by id.
async fn open_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OpenRequest>,
) -> Response {
    if req.text.is_none() && req.session_id.is_none() {
        return bad_request("Either text or sessionId is required");
    }

    match state.open_session(req.session_id, req.text) {
        Ok(session) => Json(session.snapshot()).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/sessions/{id}
async fn get_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.session(&id) {
        Ok(session) => Json(session.snapshot()).into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /api/sessions/{id}
async fn close_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.close_session(&id) {
        Ok(()) => Json(serde_json::json!({ "closed": id })).into_response(),
        Err(e) => error_response(e),
    }
}

// ---------------------------------------------------------------
// Edits
// ---------------------------------------------------------------

/// POST /api/sessions/{id}/fields: fill one placeholder by ordinal.
async fn edit_field(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<FieldEditRequest>,
) -> Response {
    let result = state
        .session(&id)
        .and_then(|s| s.edit_field(req.ordinal, req.value).map(|_| s));
    match result {
        Ok(session) => Json(session.snapshot()).into_response(),
        Err(e) => error_response(e),
    }
}

/// PUT /api/sessions/{id}/text: replace the whole text.
async fn edit_text(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<TextEditRequest>,
) -> Response {
    let result = state
        .session(&id)
        .and_then(|s| s.edit_full_text(req.text).map(|_| s));
    match result {
        Ok(session) => Json(session.snapshot()).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/sessions/{id}/regenerate: rewrite through the LLM and save.
async fn regenerate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RegenerateRequest>,
) -> Response {
    if req.instruction.trim().is_empty() {
        return bad_request("Instruction is required");
    }
    let session = match state.session(&id) {
        Ok(s) => s,
        Err(e) => return error_response(e),
    };

    info!("Regeneration requested for session {}", id);
    match session.request_regeneration(&req.instruction).await {
        Ok(text) => Json(serde_json::json!({
            "text": text,
            "session": session.snapshot(),
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

// ---------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------

/// POST /api/sessions/{id}/save: save now instead of waiting for the debounce.
async fn save(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let session = match state.session(&id) {
        Ok(s) => s,
        Err(e) => return error_response(e),
    };
    match session.save_now().await {
        Ok(outcome) => Json(serde_json::json!({
            "outcome": outcome,
            "saveState": session.save_state(),
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/sessions/{id}/revisions: persisted history, newest first.
async fn list_revisions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<RevisionsQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_REVISION_LIMIT);
    match state.store.list_revisions(&id, limit) {
        Ok(revisions) => Json(serde_json::json!({
            "sessionId": id,
            "revisions": revisions,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}
