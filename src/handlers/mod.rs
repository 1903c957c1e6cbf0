pub mod invoices;
pub mod users;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub db: String,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = match state.invoices.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("health check database ping failed: {}", e);
            false
        }
    };

    let health_response = HealthStatus {
        status: if db_ok { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        db: if db_ok { "connected" } else { "disconnected" }.to_string(),
    };

    let status_code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health_response))
}
