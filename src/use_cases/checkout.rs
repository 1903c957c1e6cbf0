//! Checkout use case.
//! Turns "purchaser wants product P" into a persisted invoice carrying a
//! gateway-hosted payment link.
//!
//! Ordering: the gateway call completes before anything is written, and the
//! invoice and its line item are written in one transaction. A gateway
//! invoice whose local write later fails is left orphaned upstream; nothing
//! here cancels it.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{InvoiceWithItems, NewInvoice, NewLineItem, Product, Purchaser};
use crate::error::AppError;
use crate::gateway::{GatewayError, GatewayInvoiceRequest, GatewayLineItem};
use crate::ports::{InvoiceRepository, PaymentGateway, ProductCatalog, RepositoryError};
use crate::services::InvoiceIdGenerator;

/// Gateway item names are cut to this many characters.
pub const GATEWAY_ITEM_NAME_LIMIT: usize = 250;

/// Inserts retried after losing an external-id race to a concurrent checkout.
pub const MAX_INSERT_ATTEMPTS: usize = 3;

pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

pub struct CheckoutWorkflow {
    invoices: Arc<dyn InvoiceRepository>,
    catalog: Arc<dyn ProductCatalog>,
    gateway: Arc<dyn PaymentGateway>,
    id_generator: InvoiceIdGenerator,
    gateway_timeout: Duration,
}

impl CheckoutWorkflow {
    pub fn new(
        invoices: Arc<dyn InvoiceRepository>,
        catalog: Arc<dyn ProductCatalog>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let id_generator = InvoiceIdGenerator::new(invoices.clone());
        Self {
            invoices,
            catalog,
            gateway,
            id_generator,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    pub async fn execute(
        &self,
        product_id: i64,
        purchaser: &Purchaser,
    ) -> Result<InvoiceWithItems, AppError> {
        let product = self
            .catalog
            .find_product(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {} not found", product_id)))?;

        for attempt in 1..=MAX_INSERT_ATTEMPTS {
            let external_id = self.id_generator.generate(Utc::now().date_naive()).await?;
            let payment_link = self
                .request_payment_link(&external_id, &product, purchaser)
                .await?;

            let new_invoice = NewInvoice {
                external_id: external_id.clone(),
                user_id: purchaser.id,
                payment_link,
                line_items: vec![NewLineItem::snapshot(&product)],
            };

            match self.invoices.create(new_invoice).await {
                Ok(created) => {
                    tracing::info!(
                        external_id = %created.invoice.external_id,
                        product_id = product.id,
                        user_id = purchaser.id,
                        "invoice created"
                    );
                    return Ok(created);
                }
                Err(RepositoryError::DuplicateExternalId(taken)) => {
                    tracing::warn!(
                        attempt,
                        external_id = %taken,
                        "external id claimed concurrently; gateway invoice orphaned, redrawing"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        external_id = %external_id,
                        "failed to persist invoice, gateway invoice orphaned: {}",
                        e
                    );
                    return Err(e.into());
                }
            }
        }

        Err(AppError::Conflict(format!(
            "could not reserve a unique invoice id after {} attempts",
            MAX_INSERT_ATTEMPTS
        )))
    }

    async fn request_payment_link(
        &self,
        external_id: &str,
        product: &Product,
        purchaser: &Purchaser,
    ) -> Result<String, AppError> {
        let request = gateway_request(external_id, product, purchaser);

        let result = tokio::time::timeout(self.gateway_timeout, self.gateway.create_invoice(&request))
            .await
            .unwrap_or(Err(GatewayError::Timeout));

        result.map_err(|e| {
            tracing::warn!(external_id = %external_id, "payment gateway call failed: {}", e);
            AppError::from(e)
        })
    }
}

pub fn gateway_request(
    external_id: &str,
    product: &Product,
    purchaser: &Purchaser,
) -> GatewayInvoiceRequest {
    GatewayInvoiceRequest {
        external_id: external_id.to_string(),
        amount: product.price,
        customer_name: purchaser.given_name().to_string(),
        customer_email: purchaser.email.clone(),
        items: vec![GatewayLineItem {
            name: product.name.chars().take(GATEWAY_ITEM_NAME_LIMIT).collect(),
            quantity: 1,
            price: product.price,
        }],
    }
}
