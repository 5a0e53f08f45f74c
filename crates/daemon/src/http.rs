use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use keeper_core::api::{ErrorResponse, StatusResponse};
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::status::StatusCache;

#[derive(Clone)]
pub struct AppState {
    cache: StatusCache,
}

/// Read-only status API. Handlers only ever look at the cache.
pub fn router(cache: StatusCache) -> Router {
    let state = AppState { cache };
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/status", get(status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn status(State(st): State<AppState>) -> Result<Json<StatusResponse>, StatusError> {
    let snapshot = st.cache.latest().ok_or(StatusError::NotReady)?;
    Ok(Json(snapshot.into()))
}

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("status not yet available")]
    NotReady,
}

impl IntoResponse for StatusError {
    fn into_response(self) -> Response {
        let code = match self {
            StatusError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (code, body).into_response()
    }
}
