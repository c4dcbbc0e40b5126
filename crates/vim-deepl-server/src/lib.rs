//! HTTP façade for the vocabulary engine
//!
//! Thin axum layer: handlers deserialize, call into [`Services`], and map
//! [`AppError`] onto HTTP statuses in exactly one place. All bodies are JSON
//! except the audio file endpoint, which streams `audio/mpeg`.

pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::json;

use vim_deepl_core::{AppError, Services};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
}

/// Build the full route table.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/entries", get(routes::get_entry).post(routes::create_entry))
        .route("/entries/use", post(routes::mark_used))
        .route("/translate/word", post(routes::translate_word))
        .route("/translate/selection", post(routes::translate_selection))
        .route("/train/next", post(routes::train_next))
        .route("/train/review", post(routes::train_review))
        .route("/train/mark_hard", post(routes::train_mark_hard))
        .route("/train/mark_ignore", post(routes::train_mark_ignore))
        .route("/mw/audio/play", post(routes::audio_play))
        .route("/mw/audio/file/{audio_id}", get(routes::audio_file))
        .route("/bookmarks/mark", post(routes::bookmarks_mark))
        .route("/bookmarks/list", get(routes::bookmarks_list))
        .with_state(state)
}

/// `AppError` carrier with the single HTTP mapping.
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            AppError::Args(msg) => (
                StatusCode::BAD_REQUEST,
                json!({"code": "ARGS", "message": msg}),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({"detail": msg})),
            AppError::Provider(msg) => (StatusCode::BAD_GATEWAY, json!({"detail": msg})),
            AppError::Storage(e) => {
                tracing::error!("storage error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"detail": e.to_string()}),
                )
            }
            other => {
                tracing::error!("internal error: {other}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"detail": other.to_string()}),
                )
            }
        };
        (status, axum::Json(body)).into_response()
    }
}
