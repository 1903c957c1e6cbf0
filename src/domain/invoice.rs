//! Invoice aggregate.
//! An invoice is one purchase attempt: a gateway-hosted payment link plus a
//! paid flag that only ever moves from `false` to `true`.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::Product;

/// Hours after creation at which an unpaid invoice is reported as expired.
pub const EXPIRY_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invoice {
    pub id: i64,
    pub external_id: String,
    pub user_id: i64,
    pub is_paid: bool,
    pub payment_link: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > Duration::hours(EXPIRY_HOURS)
    }
}

/// Line item with name and price copied from the product at checkout time.
/// `product_id` becomes `None` once the product is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceLineItem {
    pub id: i64,
    pub invoice_id: i64,
    pub product_id: Option<i64>,
    pub name: String,
    pub price: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceWithItems {
    pub invoice: Invoice,
    pub line_items: Vec<InvoiceLineItem>,
}

impl InvoiceWithItems {
    /// The checkout flow writes exactly one line item per invoice.
    pub fn detail(&self) -> Option<&InvoiceLineItem> {
        self.line_items.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLineItem {
    pub product_id: Option<i64>,
    pub name: String,
    pub price: i64,
}

impl NewLineItem {
    pub fn snapshot(product: &Product) -> Self {
        Self {
            product_id: Some(product.id),
            name: product.name.clone(),
            price: product.price,
        }
    }
}

/// Everything needed to persist an invoice and its line items in one go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvoice {
    pub external_id: String,
    pub user_id: i64,
    pub payment_link: String,
    pub line_items: Vec<NewLineItem>,
}

/// Status reported by the payment gateway callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Paid,
    Other(String),
}

impl PaymentStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "PAID" => PaymentStatus::Paid,
            other => PaymentStatus::Other(other.to_string()),
        }
    }
}

/// Wire representation of an invoice. `expired` is computed, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceView {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub expired: bool,
    pub detail: Option<InvoiceLineItem>,
}

impl InvoiceView {
    pub fn at(aggregate: InvoiceWithItems, now: DateTime<Utc>) -> Self {
        let expired = aggregate.invoice.is_expired_at(now);
        let InvoiceWithItems {
            invoice,
            line_items,
        } = aggregate;

        Self {
            invoice,
            expired,
            detail: line_items.into_iter().next(),
        }
    }
}
