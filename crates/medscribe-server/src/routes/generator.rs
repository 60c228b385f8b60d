//! Generator configuration routes.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::routes::error_response;
use crate::state::AppState;
use medscribe_generate::GeneratorConfigUpdate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/generator/config", get(get_config).put(update_config))
}

/// GET /api/generator/config: provider settings with keys masked.
async fn get_config(State(state): State<Arc<AppState>>) -> Response {
    Json(state.generator.config_response()).into_response()
}

/// PUT /api/generator/config
async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(update): Json<GeneratorConfigUpdate>,
) -> Response {
    match state.generator.update_config(&update) {
        Ok(response) => Json(response).into_response(),
        Err(e) => error_response(e),
    }
}
