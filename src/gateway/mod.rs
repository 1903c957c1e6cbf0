pub mod xendit;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use xendit::XenditClient;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Gateway rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Invalid response from gateway: {0}")]
    InvalidResponse(String),
    #[error("Gateway call timed out")]
    Timeout,
    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayLineItem {
    pub name: String,
    pub quantity: u32,
    pub price: i64,
}

/// Narrow contract the checkout flow needs from a payment gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayInvoiceRequest {
    pub external_id: String,
    pub amount: i64,
    pub customer_name: String,
    pub customer_email: String,
    pub items: Vec<GatewayLineItem>,
}
