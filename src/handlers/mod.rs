pub mod auth;
pub mod proxy;

use crate::health::{check_health, UpstreamChecker};
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let backend = UpstreamChecker::new(state.http.clone(), state.config.backend_url.clone());
    let frontend = UpstreamChecker::new(state.http.clone(), state.config.frontend_url.clone());

    let health_response = check_health(&backend, &frontend, state.started_at).await;

    // Return 503 only when the backend is gone
    let status_code = if health_response.status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(health_response))
}
