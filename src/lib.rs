pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod use_cases;
pub mod utils;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::ports::{AccountDirectory, InvoiceRepository, PaymentGateway, ProductCatalog};
use crate::use_cases::{
    AccountService, CheckoutWorkflow, InvoiceQueries, PaymentCallbackHandler,
};

#[derive(Clone)]
pub struct AppState {
    pub invoices: Arc<dyn InvoiceRepository>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub account_service: Arc<AccountService>,
    pub checkout: Arc<CheckoutWorkflow>,
    pub callbacks: Arc<PaymentCallbackHandler>,
    pub queries: Arc<InvoiceQueries>,
    pub admin_api_key: String,
}

impl AppState {
    /// Wires the use cases over explicitly supplied collaborators.
    pub fn new(
        config: &Config,
        invoices: Arc<dyn InvoiceRepository>,
        catalog: Arc<dyn ProductCatalog>,
        accounts: Arc<dyn AccountDirectory>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let checkout = CheckoutWorkflow::new(invoices.clone(), catalog, gateway)
            .with_gateway_timeout(config.gateway_timeout());
        let callbacks = PaymentCallbackHandler::new(invoices.clone(), config.callback_token.clone());
        let queries = InvoiceQueries::new(invoices.clone());
        let account_service = AccountService::new(accounts.clone());

        Self {
            invoices,
            accounts,
            account_service: Arc::new(account_service),
            checkout: Arc::new(checkout),
            callbacks: Arc::new(callbacks),
            queries: Arc::new(queries),
            admin_api_key: config.admin_api_key.clone(),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let admin: Router<AppState> = Router::new()
        .route("/admin/invoices", get(handlers::invoices::admin_index))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::admin_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/user", post(handlers::users::register))
        .route(
            "/user/get-token",
            get(handlers::users::get_token).post(handlers::users::get_token),
        )
        .route("/user/remove-token", delete(handlers::users::remove_token))
        .route("/invoice", get(handlers::invoices::index))
        .route("/invoice/callback", post(handlers::invoices::callback))
        .route(
            "/invoice/inv/:external_id",
            get(handlers::invoices::find_by_external_id),
        )
        .route(
            "/invoice/:id",
            get(handlers::invoices::find).post(handlers::invoices::create),
        )
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
