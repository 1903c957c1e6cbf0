//! In-memory implementation of the persistence ports.
//! Used by the test suites and for running the HTTP surface without Postgres.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::{
    AccountCredentials, Invoice, InvoiceLineItem, InvoiceWithItems, NewAccount, NewInvoice,
    Product, Purchaser,
};
use crate::ports::{
    AccountDirectory, InvoiceRepository, ProductCatalog, RepositoryError, RepositoryResult,
};
use crate::utils::token::hash_token;

#[derive(Default)]
struct State {
    invoices: Vec<Invoice>,
    line_items: Vec<InvoiceLineItem>,
    products: HashMap<i64, Product>,
    accounts: HashMap<i64, AccountCredentials>,
    /// Token digest to account id.
    tokens: HashMap<String, i64>,
    next_invoice_id: i64,
    next_line_item_id: i64,
}

impl State {
    fn with_items(&self, invoice: &Invoice) -> InvoiceWithItems {
        InvoiceWithItems {
            invoice: invoice.clone(),
            line_items: self
                .line_items
                .iter()
                .filter(|item| item.invoice_id == invoice.id)
                .cloned()
                .collect(),
        }
    }
}

/// A single lock guards every table, so each write is atomic with respect to readers.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_product(&self, product: Product) {
        self.state().products.insert(product.id, product);
    }

    pub fn remove_product(&self, id: i64) {
        let mut state = self.state();
        state.products.remove(&id);
        for item in state.line_items.iter_mut().filter(|i| i.product_id == Some(id)) {
            item.product_id = None;
        }
    }

    pub fn update_product_price(&self, id: i64, price: i64) {
        if let Some(product) = self.state().products.get_mut(&id) {
            product.price = price;
        }
    }

    /// Registers `purchaser` if needed, without a usable password, and issues `token` to it.
    pub fn add_token(&self, token: &str, purchaser: Purchaser) {
        let mut state = self.state();
        let user_id = purchaser.id;
        state
            .accounts
            .entry(user_id)
            .or_insert_with(|| AccountCredentials {
                purchaser,
                password_hash: String::new(),
            });
        state.tokens.insert(hash_token(token), user_id);
    }

    pub fn token_count(&self) -> usize {
        self.state().tokens.len()
    }

    pub fn invoice_count(&self) -> usize {
        self.state().invoices.len()
    }

    pub fn line_item_count(&self) -> usize {
        self.state().line_items.len()
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryStore {
    async fn external_id_exists(&self, external_id: &str) -> RepositoryResult<bool> {
        Ok(self
            .state()
            .invoices
            .iter()
            .any(|i| i.external_id == external_id))
    }

    async fn create(&self, invoice: NewInvoice) -> RepositoryResult<InvoiceWithItems> {
        let mut state = self.state();
        if state
            .invoices
            .iter()
            .any(|i| i.external_id == invoice.external_id)
        {
            return Err(RepositoryError::DuplicateExternalId(invoice.external_id));
        }

        let now = Utc::now();
        state.next_invoice_id += 1;
        let stored = Invoice {
            id: state.next_invoice_id,
            external_id: invoice.external_id,
            user_id: invoice.user_id,
            is_paid: false,
            payment_link: invoice.payment_link,
            created_at: now,
            updated_at: now,
        };

        let mut line_items = Vec::with_capacity(invoice.line_items.len());
        for item in invoice.line_items {
            state.next_line_item_id += 1;
            line_items.push(InvoiceLineItem {
                id: state.next_line_item_id,
                invoice_id: stored.id,
                product_id: item.product_id,
                name: item.name,
                price: item.price,
                created_at: now,
                updated_at: now,
            });
        }

        state.invoices.push(stored.clone());
        state.line_items.extend(line_items.iter().cloned());

        Ok(InvoiceWithItems {
            invoice: stored,
            line_items,
        })
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<InvoiceWithItems>> {
        let state = self.state();
        Ok(state
            .invoices
            .iter()
            .find(|i| i.id == id)
            .map(|i| state.with_items(i)))
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> RepositoryResult<Option<InvoiceWithItems>> {
        let state = self.state();
        Ok(state
            .invoices
            .iter()
            .find(|i| i.external_id == external_id)
            .map(|i| state.with_items(i)))
    }

    async fn mark_paid(&self, id: i64) -> RepositoryResult<bool> {
        let mut state = self.state();
        match state.invoices.iter_mut().find(|i| i.id == id) {
            Some(invoice) if !invoice.is_paid => {
                invoice.is_paid = true;
                invoice.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(
        &self,
        owner: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<InvoiceWithItems>> {
        let state = self.state();
        let mut owned: Vec<&Invoice> = state
            .invoices
            .iter()
            .filter(|i| owner.map_or(true, |o| i.user_id == o))
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(owned
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|i| state.with_items(i))
            .collect())
    }

    async fn count(&self, owner: Option<i64>) -> RepositoryResult<i64> {
        Ok(self
            .state()
            .invoices
            .iter()
            .filter(|i| owner.map_or(true, |o| i.user_id == o))
            .count() as i64)
    }
}

#[async_trait]
impl ProductCatalog for InMemoryStore {
    async fn find_product(&self, id: i64) -> RepositoryResult<Option<Product>> {
        Ok(self.state().products.get(&id).cloned())
    }
}

#[async_trait]
impl AccountDirectory for InMemoryStore {
    async fn find_by_token(&self, token: &str) -> RepositoryResult<Option<Purchaser>> {
        let state = self.state();
        Ok(state
            .tokens
            .get(&hash_token(token))
            .and_then(|user_id| state.accounts.get(user_id))
            .map(|account| account.purchaser.clone()))
    }

    async fn create_account(&self, account: NewAccount) -> RepositoryResult<Purchaser> {
        let mut state = self.state();
        if state
            .accounts
            .values()
            .any(|existing| existing.purchaser.email == account.email)
        {
            return Err(RepositoryError::DuplicateEmail(account.email));
        }

        let id = state.accounts.keys().max().copied().unwrap_or(0) + 1;
        let purchaser = Purchaser {
            id,
            email: account.email,
            full_name: account.full_name,
        };
        state.accounts.insert(
            id,
            AccountCredentials {
                purchaser: purchaser.clone(),
                password_hash: account.password_hash,
            },
        );
        Ok(purchaser)
    }

    async fn find_credentials(&self, email: &str) -> RepositoryResult<Option<AccountCredentials>> {
        Ok(self
            .state()
            .accounts
            .values()
            .find(|account| account.purchaser.email == email)
            .cloned())
    }

    async fn issue_token(&self, user_id: i64, token: &str) -> RepositoryResult<()> {
        self.state().tokens.insert(hash_token(token), user_id);
        Ok(())
    }

    async fn revoke_token(&self, token: &str) -> RepositoryResult<bool> {
        Ok(self.state().tokens.remove(&hash_token(token)).is_some())
    }
}
