//! HTTP route handlers.

pub mod analyze;
pub mod generator;
pub mod health;
pub mod sessions;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use crate::state::AppState;
use medscribe_core::Error;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::routes())
        .merge(analyze::routes())
        .merge(sessions::routes())
        .merge(generator::routes())
}

/// Map a domain error onto a JSON error response.
pub(crate) fn error_response(err: Error) -> Response {
    let status = match &err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::RegenerationInFlight => StatusCode::CONFLICT,
        Error::Unmounted => StatusCode::GONE,
        Error::Regeneration(_) | Error::Persistence(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}

pub(crate) fn bad_request(msg: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": msg })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use medscribe_core::MedscribeConfig;
    use medscribe_generate::{LLMConfig, LlmGenerator};
    use medscribe_store::SqliteStore;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const REPORT: &str = "Na: Value_to_be_filled mmol/L, K: Value_to_be_filled mmol/L";

    fn test_app() -> (Router, Arc<AppState>, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = MedscribeConfig {
            port: 0,
            data_paths: medscribe_core::DataPaths::new(dir.path()).unwrap(),
            debounce_ms: 60_000,
            sentinel: medscribe_core::DEFAULT_SENTINEL.to_string(),
        };
        let store = SqliteStore::open(&config.data_paths.db).unwrap();
        // No keys, regardless of the environment.
        let generator = LlmGenerator::new(LLMConfig {
            config_path: config.data_paths.llm_config_file.clone(),
            ..Default::default()
        });
        let state = Arc::new(AppState::new(config, store, generator));
        (build_router(state.clone()), state, dir)
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Wait for the autosave task to persist a freshly opened session.
    async fn settle(state: &AppState, id: &str) {
        let session = state.session(id).unwrap();
        for _ in 0..200 {
            let save_state = session.save_state();
            if !save_state.dirty && !save_state.saving {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("session {} never settled", id);
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _state, _dir) = test_app();
        let (status, body) = call(&app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["generatorAvailable"], false);
    }

    #[tokio::test]
    async fn test_analyze() {
        let (app, _state, _dir) = test_app();
        let text = "## Issue 1: Hypoxemia\nDetails...\n## Issue 2: Acidosis\nMore...";
        let (status, body) = call(&app, Method::POST, "/api/analyze", Some(json!({ "text": text }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["actionItems"][0]["title"], "Hypoxemia");
        assert_eq!(body["actionItems"][1]["category"], "immediate");
        assert_eq!(body["actionItems"][1]["priority"], "critical");
    }

    #[tokio::test]
    async fn test_session_edit_and_save() {
        let (app, state, _dir) = test_app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/sessions",
            Some(json!({ "text": REPORT, "sessionId": "abg-1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessionId"], "abg-1");
        assert_eq!(body["placeholders"].as_array().unwrap().len(), 2);
        settle(&state, "abg-1").await;
        assert_eq!(state.store.get_report("abg-1").unwrap().unwrap().text, REPORT);

        call(&app, Method::POST, "/api/sessions/abg-1/fields", Some(json!({ "ordinal": 0, "value": "140" }))).await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/sessions/abg-1/fields",
            Some(json!({ "ordinal": 1, "value": "4.0" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["saveState"]["currentText"], "Na: 140 mmol/L, K: 4.0 mmol/L");
        assert_eq!(body["phase"], "dirty");

        let (status, body) = call(&app, Method::POST, "/api/sessions/abg-1/save", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "saved");
        assert_eq!(body["saveState"]["dirty"], false);

        let (_, body) = call(&app, Method::GET, "/api/sessions/abg-1/revisions", None).await;
        assert_eq!(body["revisions"][0]["text"], "Na: 140 mmol/L, K: 4.0 mmol/L");
        assert_eq!(body["revisions"][1]["text"], REPORT);
        assert_eq!(
            state.store.get_report("abg-1").unwrap().unwrap().version,
            2
        );
    }

    #[tokio::test]
    async fn test_reopen_from_store() {
        let (app, state, _dir) = test_app();
        state.store.save_report("kept", "pH: 7.31").unwrap();
        let (status, body) = call(&app, Method::POST, "/api/sessions", Some(json!({ "sessionId": "kept" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sourceText"], "pH: 7.31");

        let (status, _) = call(&app, Method::POST, "/api/sessions", Some(json!({ "sessionId": "missing" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, Method::POST, "/api/sessions", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_open_new_text_reaches_store() {
        let (app, state, _dir) = test_app();
        let (status, body) = call(&app, Method::POST, "/api/sessions", Some(json!({ "text": REPORT }))).await;
        assert_eq!(status, StatusCode::OK);
        let id = body["sessionId"].as_str().unwrap().to_string();
        assert_eq!(body["phase"], "dirty");
        settle(&state, &id).await;

        let uri = format!("/api/sessions/{}/revisions", id);
        let (_, body) = call(&app, Method::GET, &uri, None).await;
        assert_eq!(body["revisions"].as_array().unwrap().len(), 1);

        // New text for the open session replaces it and is saved too.
        let (_, body) = call(
            &app,
            Method::POST,
            "/api/sessions",
            Some(json!({ "text": "pH: 7.31", "sessionId": id })),
        )
        .await;
        assert_eq!(body["saveState"]["baselineText"], REPORT);
        assert_eq!(body["saveState"]["currentText"], "pH: 7.31");
        settle(&state, &id).await;
        assert_eq!(state.store.get_report(&id).unwrap().unwrap().text, "pH: 7.31");
        assert_eq!(state.session_count(), 1);
    }

    #[tokio::test]
    async fn test_regenerate_without_provider() {
        let (app, _state, _dir) = test_app();
        call(&app, Method::POST, "/api/sessions", Some(json!({ "text": REPORT, "sessionId": "s" }))).await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/sessions/s/regenerate",
            Some(json!({ "instruction": "fill in normal values" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("No LLM provider"));

        let (_, body) = call(&app, Method::GET, "/api/sessions/s", None).await;
        assert_eq!(body["saveState"]["currentText"], REPORT);
    }

    #[tokio::test]
    async fn test_close_session() {
        let (app, state, _dir) = test_app();
        call(&app, Method::POST, "/api/sessions", Some(json!({ "text": REPORT, "sessionId": "gone" }))).await;
        assert_eq!(state.session_count(), 1);

        let (status, _) = call(&app, Method::DELETE, "/api/sessions/gone", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.session_count(), 0);

        let (status, _) = call(&app, Method::GET, "/api/sessions/gone", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_generator_config_masks_keys() {
        let (app, _state, _dir) = test_app();
        let (status, body) = call(
            &app,
            Method::PUT,
            "/api/generator/config",
            Some(json!({ "groqApiKey": "gsk-secret", "preferredProvider": "groq" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["activeProvider"], "groq");
        assert!(!body.to_string().contains("gsk-secret"));

        let (_, body) = call(&app, Method::GET, "/api/generator/config", None).await;
        assert_eq!(body["groqConfigured"], true);
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(
            error_response(Error::RegenerationInFlight).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(error_response(Error::Unmounted).status(), StatusCode::GONE);
        assert_eq!(
            error_response(Error::Persistence("x".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            error_response(Error::Internal("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
