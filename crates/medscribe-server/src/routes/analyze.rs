//! Stateless analysis of a report text.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use crate::state::AppState;
use medscribe_extract::{analyze_all, Analysis};

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/analyze", post(analyze))
}

/// POST /api/analyze: blocks, sections, action items and confidence.
async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Json<Analysis> {
    Json(analyze_all(&req.text, &state.config.sentinel))
}
