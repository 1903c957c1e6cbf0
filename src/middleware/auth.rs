use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::domain::Purchaser;
use crate::error::AppError;
use crate::utils::token::tokens_match;
use crate::AppState;

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The account behind the request's bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedPurchaser(pub Purchaser);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedPurchaser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

        state
            .accounts
            .find_by_token(token)
            .await?
            .map(AuthenticatedPurchaser)
            .ok_or_else(|| AppError::Unauthorized("invalid bearer token".to_string()))
    }
}

pub async fn admin_auth<B>(
    State(state): State<AppState>,
    req: Request<B>,
    next: Next<B>,
) -> Result<Response, AppError> {
    match bearer_token(req.headers()) {
        Some(key) if tokens_match(key, &state.admin_api_key) => Ok(next.run(req).await),
        _ => Err(AppError::Unauthorized("invalid admin key".to_string())),
    }
}
