use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};

use crate::error::AppError;
use crate::middleware::auth::{bearer_token, AuthenticatedPurchaser};
use crate::use_cases::{Credentials, Registration};
use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Registration>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(registration) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let issued = state.account_service.register(registration).await?;

    Ok(Json(issued))
}

pub async fn get_token(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(credentials) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let issued = state.account_service.issue_token(credentials).await?;

    Ok(Json(issued))
}

/// Revokes the bearer token this request was authenticated with.
pub async fn remove_token(
    State(state): State<AppState>,
    AuthenticatedPurchaser(purchaser): AuthenticatedPurchaser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;
    state.account_service.revoke_token(token).await?;

    Ok(Json(purchaser))
}
