//! Postgres implementation of InvoiceRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;

use crate::domain::{Invoice, InvoiceLineItem, InvoiceWithItems, NewInvoice};
use crate::ports::{InvoiceRepository, RepositoryError, RepositoryResult};

/// Unique constraint guarding `invoices.external_id`.
pub const EXTERNAL_ID_CONSTRAINT: &str = "invoices_external_id_key";

const INVOICE_COLUMNS: &str =
    "id, external_id, user_id, is_paid, payment_link, created_at, updated_at";
const LINE_ITEM_COLUMNS: &str =
    "id, invoice_id, product_id, name, price, created_at, updated_at";

/// Postgres-backed invoice repository.
#[derive(Clone)]
pub struct PostgresInvoiceRepository {
    pool: PgPool,
}

impl PostgresInvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn attach_items(&self, rows: Vec<InvoiceRow>) -> RepositoryResult<Vec<InvoiceWithItems>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let items = sqlx::query_as::<_, LineItemRow>(&format!(
            "SELECT {} FROM invoice_line_items WHERE invoice_id = ANY($1) ORDER BY id",
            LINE_ITEM_COLUMNS
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_invoice: HashMap<i64, Vec<InvoiceLineItem>> = HashMap::new();
        for item in items {
            by_invoice
                .entry(item.invoice_id)
                .or_default()
                .push(item.into_domain());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let line_items = by_invoice.remove(&row.id).unwrap_or_default();
                InvoiceWithItems {
                    invoice: row.into_domain(),
                    line_items,
                }
            })
            .collect())
    }

    async fn find_one(&self, row: Option<InvoiceRow>) -> RepositoryResult<Option<InvoiceWithItems>> {
        match row {
            Some(row) => Ok(self.attach_items(vec![row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }
}

fn map_insert_error(err: sqlx::Error, external_id: &str) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.constraint() == Some(EXTERNAL_ID_CONSTRAINT) => {
            RepositoryError::DuplicateExternalId(external_id.to_string())
        }
        _ => RepositoryError::Database(err),
    }
}

#[async_trait]
impl InvoiceRepository for PostgresInvoiceRepository {
    async fn external_id_exists(&self, external_id: &str) -> RepositoryResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM invoices WHERE external_id = $1)",
        )
        .bind(external_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn create(&self, invoice: NewInvoice) -> RepositoryResult<InvoiceWithItems> {
        // Dropping `tx` on any early return rolls both inserts back.
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            INSERT INTO invoices (external_id, user_id, is_paid, payment_link, created_at, updated_at)
            VALUES ($1, $2, FALSE, $3, NOW(), NOW())
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(&invoice.external_id)
        .bind(invoice.user_id)
        .bind(&invoice.payment_link)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_insert_error(e, &invoice.external_id))?;

        let mut line_items = Vec::with_capacity(invoice.line_items.len());
        for item in &invoice.line_items {
            let item_row = sqlx::query_as::<_, LineItemRow>(&format!(
                r#"
                INSERT INTO invoice_line_items (invoice_id, product_id, name, price, created_at, updated_at)
                VALUES ($1, $2, $3, $4, NOW(), NOW())
                RETURNING {}
                "#,
                LINE_ITEM_COLUMNS
            ))
            .bind(row.id)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(item.price)
            .fetch_one(&mut *tx)
            .await?;
            line_items.push(item_row.into_domain());
        }

        tx.commit().await?;

        Ok(InvoiceWithItems {
            invoice: row.into_domain(),
            line_items,
        })
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<InvoiceWithItems>> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE id = $1",
            INVOICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        self.find_one(row).await
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> RepositoryResult<Option<InvoiceWithItems>> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE external_id = $1",
            INVOICE_COLUMNS
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        self.find_one(row).await
    }

    async fn mark_paid(&self, id: i64) -> RepositoryResult<bool> {
        let result = sqlx::query(
            "UPDATE invoices SET is_paid = TRUE, updated_at = NOW() WHERE id = $1 AND is_paid = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list(
        &self,
        owner: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<InvoiceWithItems>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            SELECT {} FROM invoices
            WHERE ($1::BIGINT IS NULL OR user_id = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            INVOICE_COLUMNS
        ))
        .bind(owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        self.attach_items(rows).await
    }

    async fn count(&self, owner: Option<i64>) -> RepositoryResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM invoices WHERE ($1::BIGINT IS NULL OR user_id = $1)",
        )
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: i64,
    external_id: String,
    user_id: i64,
    is_paid: bool,
    payment_link: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InvoiceRow {
    fn into_domain(self) -> Invoice {
        Invoice {
            id: self.id,
            external_id: self.external_id,
            user_id: self.user_id,
            is_paid: self.is_paid,
            payment_link: self.payment_link,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineItemRow {
    id: i64,
    invoice_id: i64,
    product_id: Option<i64>,
    name: String,
    price: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LineItemRow {
    fn into_domain(self) -> InvoiceLineItem {
        InvoiceLineItem {
            id: self.id,
            invoice_id: self.invoice_id,
            product_id: self.product_id,
            name: self.name,
            price: self.price,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
