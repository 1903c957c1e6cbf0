//! Payment callback use case.
//! Applies a gateway status notification to a stored invoice. Only `PAID`
//! changes state, and it can only move `is_paid` from false to true; every
//! other status is acknowledged without a write.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::{InvoiceWithItems, PaymentStatus};
use crate::error::AppError;
use crate::ports::InvoiceRepository;
use crate::utils::token::tokens_match;

/// Header the gateway uses to present the shared callback token.
pub const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackPayload {
    pub external_id: String,
    pub status: String,
}

pub struct PaymentCallbackHandler {
    invoices: Arc<dyn InvoiceRepository>,
    callback_token: String,
}

impl PaymentCallbackHandler {
    pub fn new(invoices: Arc<dyn InvoiceRepository>, callback_token: String) -> Self {
        Self {
            invoices,
            callback_token,
        }
    }

    /// Authenticates the caller, then applies the payload.
    pub async fn handle(
        &self,
        presented_token: Option<&str>,
        payload: &CallbackPayload,
    ) -> Result<InvoiceWithItems, AppError> {
        self.authenticate(presented_token)?;
        self.apply(payload).await
    }

    pub fn authenticate(&self, presented_token: Option<&str>) -> Result<(), AppError> {
        let authorized = presented_token
            .map(|token| tokens_match(token, &self.callback_token))
            .unwrap_or(false);

        if !authorized {
            tracing::warn!(
                token_present = presented_token.is_some(),
                "rejected payment callback with invalid token"
            );
            return Err(AppError::Unauthorized("invalid callback token".to_string()));
        }
        Ok(())
    }

    /// Applies a status without authentication. Also used for manual
    /// reconciliation from the command line.
    pub async fn apply(&self, payload: &CallbackPayload) -> Result<InvoiceWithItems, AppError> {
        let current = self.find(&payload.external_id).await?;

        match PaymentStatus::parse(&payload.status) {
            PaymentStatus::Paid if !current.invoice.is_paid => {
                let changed = self.invoices.mark_paid(current.invoice.id).await?;
                tracing::info!(
                    external_id = %payload.external_id,
                    changed,
                    "invoice marked paid"
                );
                self.find(&payload.external_id).await
            }
            PaymentStatus::Paid => {
                tracing::debug!(external_id = %payload.external_id, "invoice already paid");
                Ok(current)
            }
            PaymentStatus::Other(status) => {
                tracing::info!(
                    external_id = %payload.external_id,
                    status = %status,
                    "payment status does not change invoice state"
                );
                Ok(current)
            }
        }
    }

    async fn find(&self, external_id: &str) -> Result<InvoiceWithItems, AppError> {
        self.invoices
            .find_by_external_id(external_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Invoice {} not found", external_id)))
    }
}
