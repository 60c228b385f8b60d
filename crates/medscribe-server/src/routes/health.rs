//! Liveness and summary counters.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;
use medscribe_core::ReportGenerator;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

/// GET /api/health
async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "openSessions": state.session_count(),
        "storedReports": state.store.count_reports().unwrap_or(0),
        "generatorAvailable": state.generator.is_available(),
    }))
}
