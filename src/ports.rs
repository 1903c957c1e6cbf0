//! Seams between the checkout core and its collaborators.
//! Implementations live in `adapters` (persistence) and `gateway` (upstream).

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    AccountCredentials, InvoiceWithItems, NewAccount, NewInvoice, Product, Purchaser,
};
use crate::gateway::{GatewayError, GatewayInvoiceRequest};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("external id already in use: {0}")]
    DuplicateExternalId(String),

    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn external_id_exists(&self, external_id: &str) -> RepositoryResult<bool>;

    /// Persists the invoice and all of its line items atomically.
    /// A taken `external_id` yields [`RepositoryError::DuplicateExternalId`]
    /// and leaves nothing behind.
    async fn create(&self, invoice: NewInvoice) -> RepositoryResult<InvoiceWithItems>;

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<InvoiceWithItems>>;

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> RepositoryResult<Option<InvoiceWithItems>>;

    /// Sets `is_paid` on an unpaid invoice. Returns whether a row changed:
    /// `false` both for an already-paid invoice, which is left untouched,
    /// and for an id that matches no invoice.
    async fn mark_paid(&self, id: i64) -> RepositoryResult<bool>;

    /// Newest first. `owner = None` lists every account's invoices.
    async fn list(
        &self,
        owner: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<InvoiceWithItems>>;

    async fn count(&self, owner: Option<i64>) -> RepositoryResult<i64>;

    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn find_product(&self, id: i64) -> RepositoryResult<Option<Product>>;
}

/// Accounts and their API tokens. Tokens cross this boundary in plain form;
/// implementations persist only their digest.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Resolves a bearer token to the account it was issued for.
    async fn find_by_token(&self, token: &str) -> RepositoryResult<Option<Purchaser>>;

    /// A taken email yields [`RepositoryError::DuplicateEmail`].
    async fn create_account(&self, account: NewAccount) -> RepositoryResult<Purchaser>;

    async fn find_credentials(&self, email: &str) -> RepositoryResult<Option<AccountCredentials>>;

    async fn issue_token(&self, user_id: i64, token: &str) -> RepositoryResult<()>;

    /// Returns whether the token existed.
    async fn revoke_token(&self, token: &str) -> RepositoryResult<bool>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a hosted invoice upstream and returns its payment URL.
    async fn create_invoice(&self, request: &GatewayInvoiceRequest) -> Result<String, GatewayError>;
}
