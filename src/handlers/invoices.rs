use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use crate::domain::{InvoiceView, InvoiceWithItems};
use crate::error::AppError;
use crate::middleware::auth::AuthenticatedPurchaser;
use crate::use_cases::{CallbackPayload, Page, PageRequest, CALLBACK_TOKEN_HEADER};
use crate::AppState;

fn view(aggregate: InvoiceWithItems) -> InvoiceView {
    InvoiceView::at(aggregate, Utc::now())
}

fn page_view(page: Page<InvoiceWithItems>) -> Page<InvoiceView> {
    let now = Utc::now();
    Page {
        total: page.total,
        data: page.data.into_iter().map(|i| InvoiceView::at(i, now)).collect(),
    }
}

pub async fn create(
    State(state): State<AppState>,
    AuthenticatedPurchaser(purchaser): AuthenticatedPurchaser,
    Path(product_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let created = state.checkout.execute(product_id, &purchaser).await?;

    Ok(Json(view(created)))
}

pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CallbackPayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let token = headers
        .get(CALLBACK_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok());
    state.callbacks.authenticate(token)?;

    let Json(payload) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let invoice = state.callbacks.apply(&payload).await?;

    Ok(Json(view(invoice)))
}

pub async fn find(
    State(state): State<AppState>,
    AuthenticatedPurchaser(purchaser): AuthenticatedPurchaser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = state.queries.find_owned(purchaser.id, id).await?;

    Ok(Json(view(invoice)))
}

pub async fn find_by_external_id(
    State(state): State<AppState>,
    AuthenticatedPurchaser(purchaser): AuthenticatedPurchaser,
    Path(external_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = state
        .queries
        .find_owned_by_external_id(purchaser.id, &external_id)
        .await?;

    Ok(Json(view(invoice)))
}

pub async fn index(
    State(state): State<AppState>,
    AuthenticatedPurchaser(purchaser): AuthenticatedPurchaser,
    pagination: Result<Query<PageRequest>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(pagination) = pagination.map_err(|e| AppError::Validation(e.body_text()))?;
    let page = state.queries.list(Some(purchaser.id), pagination).await?;

    Ok(Json(page_view(page)))
}

/// Every account's invoices. Guarded by the admin key middleware.
pub async fn admin_index(
    State(state): State<AppState>,
    pagination: Result<Query<PageRequest>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(pagination) = pagination.map_err(|e| AppError::Validation(e.body_text()))?;
    let page = state.queries.list(None, pagination).await?;

    Ok(Json(page_view(page)))
}
