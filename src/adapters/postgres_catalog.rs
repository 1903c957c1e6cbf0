//! Postgres lookups for products, plus accounts and their API tokens.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::{AccountCredentials, NewAccount, Product, Purchaser};
use crate::ports::{AccountDirectory, ProductCatalog, RepositoryError, RepositoryResult};
use crate::utils::token::hash_token;

/// Unique constraint guarding `users.email`.
pub const EMAIL_CONSTRAINT: &str = "users_email_key";

/// Name recorded on tokens issued through password login or registration.
const API_TOKEN_NAME: &str = "api";

#[derive(Clone)]
pub struct PostgresProductCatalog {
    pool: PgPool,
}

impl PostgresProductCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalog for PostgresProductCatalog {
    async fn find_product(&self, id: i64) -> RepositoryResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, slug, price FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Product {
            id: r.id,
            name: r.name,
            slug: r.slug,
            price: r.price,
        }))
    }
}

#[derive(Clone)]
pub struct PostgresAccountDirectory {
    pool: PgPool,
}

impl PostgresAccountDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountDirectory for PostgresAccountDirectory {
    async fn find_by_token(&self, token: &str) -> RepositoryResult<Option<Purchaser>> {
        let row = sqlx::query_as::<_, PurchaserRow>(
            r#"
            SELECT u.id, u.email, u.fullname
            FROM api_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.token_hash = $1
              AND (t.expires_at IS NULL OR t.expires_at > NOW())
            "#,
        )
        .bind(hash_token(token))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PurchaserRow::into_domain))
    }

    async fn create_account(&self, account: NewAccount) -> RepositoryResult<Purchaser> {
        let row = sqlx::query_as::<_, PurchaserRow>(
            r#"
            INSERT INTO users (email, fullname, password, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            RETURNING id, email, fullname
            "#,
        )
        .bind(&account.email)
        .bind(&account.full_name)
        .bind(&account.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.constraint() == Some(EMAIL_CONSTRAINT) => {
                RepositoryError::DuplicateEmail(account.email.clone())
            }
            _ => RepositoryError::Database(e),
        })?;

        Ok(row.into_domain())
    }

    async fn find_credentials(&self, email: &str) -> RepositoryResult<Option<AccountCredentials>> {
        let row = sqlx::query_as::<_, CredentialsRow>(
            "SELECT id, email, fullname, password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| AccountCredentials {
            purchaser: Purchaser {
                id: r.id,
                email: r.email,
                full_name: r.fullname,
            },
            password_hash: r.password,
        }))
    }

    async fn issue_token(&self, user_id: i64, token: &str) -> RepositoryResult<()> {
        sqlx::query("INSERT INTO api_tokens (user_id, name, token_hash) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(API_TOKEN_NAME)
            .bind(hash_token(token))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn revoke_token(&self, token: &str) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM api_tokens WHERE token_hash = $1")
            .bind(hash_token(token))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    slug: String,
    price: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct PurchaserRow {
    id: i64,
    email: String,
    fullname: String,
}

impl PurchaserRow {
    fn into_domain(self) -> Purchaser {
        Purchaser {
            id: self.id,
            email: self.email,
            full_name: self.fullname,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CredentialsRow {
    id: i64,
    email: String,
    fullname: String,
    password: String,
}
