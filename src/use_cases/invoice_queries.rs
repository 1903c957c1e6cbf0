use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::InvoiceWithItems;
use crate::error::AppError;
use crate::ports::InvoiceRepository;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 20;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

impl PageRequest {
    /// Returns `(limit, page)` with defaults applied.
    pub fn resolve(&self) -> Result<(i64, i64), AppError> {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        let page = self.page.unwrap_or(1);

        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        if page < 1 {
            return Err(AppError::Validation("page must be at least 1".to_string()));
        }

        Ok((limit, page))
    }
}

/// `total` is the number of pages, not the number of rows.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub total: i64,
    pub data: Vec<T>,
}

pub struct InvoiceQueries {
    invoices: Arc<dyn InvoiceRepository>,
}

impl InvoiceQueries {
    pub fn new(invoices: Arc<dyn InvoiceRepository>) -> Self {
        Self { invoices }
    }

    /// Another account's invoice is reported as missing.
    pub async fn find_owned(&self, owner: i64, id: i64) -> Result<InvoiceWithItems, AppError> {
        self.invoices
            .find_by_id(id)
            .await?
            .filter(|found| found.invoice.user_id == owner)
            .ok_or_else(|| AppError::NotFound(format!("Invoice {} not found", id)))
    }

    pub async fn find_owned_by_external_id(
        &self,
        owner: i64,
        external_id: &str,
    ) -> Result<InvoiceWithItems, AppError> {
        self.invoices
            .find_by_external_id(external_id)
            .await?
            .filter(|found| found.invoice.user_id == owner)
            .ok_or_else(|| AppError::NotFound(format!("Invoice {} not found", external_id)))
    }

    pub async fn find_by_external_id(&self, external_id: &str) -> Result<InvoiceWithItems, AppError> {
        self.invoices
            .find_by_external_id(external_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Invoice {} not found", external_id)))
    }

    /// Lists newest first. `owner = None` covers every account.
    pub async fn list(
        &self,
        owner: Option<i64>,
        request: PageRequest,
    ) -> Result<Page<InvoiceWithItems>, AppError> {
        let (limit, page) = request.resolve()?;

        let rows = self.invoices.count(owner).await?;
        let total = (rows + limit - 1) / limit;

        // With no rows there are zero pages, so even page 1 is past the end.
        if page > total {
            return Err(AppError::NotFound(format!(
                "page {} is past the last page ({})",
                page, total
            )));
        }

        let data = self.invoices.list(owner, limit, (page - 1) * limit).await?;
        Ok(Page { total, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStore;
    use crate::domain::{NewInvoice, NewLineItem};

    async fn store_with_invoices(owner: i64, count: usize) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for n in 0..count {
            store
                .create(NewInvoice {
                    external_id: format!("24-05-01-A{:06}", n),
                    user_id: owner,
                    payment_link: format!("https://pay.example/{}", n),
                    line_items: vec![NewLineItem {
                        product_id: Some(1),
                        name: "Pattern pack".to_string(),
                        price: 50_000,
                    }],
                })
                .await
                .unwrap();
        }
        store
    }

    #[test]
    fn test_page_request_defaults_and_bounds() {
        assert_eq!(PageRequest::default().resolve().unwrap(), (10, 1));
        assert!(PageRequest { limit: Some(0), page: None }.resolve().is_err());
        assert!(PageRequest { limit: Some(21), page: None }.resolve().is_err());
        assert!(PageRequest { limit: Some(5), page: Some(0) }.resolve().is_err());
        assert_eq!(
            PageRequest { limit: Some(20), page: Some(3) }.resolve().unwrap(),
            (20, 3)
        );
    }

    #[tokio::test]
    async fn test_list_counts_pages() {
        let store = store_with_invoices(1, 25).await;
        let queries = InvoiceQueries::new(store);

        let page = queries
            .list(Some(1), PageRequest { limit: Some(10), page: Some(3) })
            .await
            .unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.data.len(), 5);
    }

    #[tokio::test]
    async fn test_list_past_last_page_is_not_found() {
        let store = store_with_invoices(1, 3).await;
        let queries = InvoiceQueries::new(store);

        let result = queries
            .list(Some(1), PageRequest { limit: Some(10), page: Some(2) })
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_first_page_without_invoices_is_not_found() {
        let store = store_with_invoices(1, 3).await;
        let queries = InvoiceQueries::new(store);

        let result = queries.list(Some(2), PageRequest::default()).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_find_owned_hides_other_accounts() {
        let store = store_with_invoices(1, 1).await;
        let queries = InvoiceQueries::new(store);

        assert!(queries.find_owned(1, 1).await.is_ok());
        assert!(matches!(
            queries.find_owned(2, 1).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            queries.find_owned_by_external_id(2, "24-05-01-A000000").await,
            Err(AppError::NotFound(_))
        ));
        assert!(queries
            .find_owned_by_external_id(1, "24-05-01-A000000")
            .await
            .is_ok());
    }
}
