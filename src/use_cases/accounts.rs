//! Account use cases.
//! Registration and password login both hand out a fresh bearer token for
//! the purchaser routes; removal revokes the token the caller presented.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::account::{is_plausible_email, normalize_email};
use crate::domain::{NewAccount, Purchaser};
use crate::error::AppError;
use crate::ports::AccountDirectory;
use crate::utils::{password, token};

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub fullname: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// An account together with a newly issued bearer token. The token is only
/// ever shown here; the store keeps its digest.
#[derive(Debug, Serialize)]
pub struct IssuedToken {
    #[serde(flatten)]
    pub account: Purchaser,
    pub token: String,
}

pub struct AccountService {
    accounts: Arc<dyn AccountDirectory>,
}

impl AccountService {
    pub fn new(accounts: Arc<dyn AccountDirectory>) -> Self {
        Self { accounts }
    }

    pub async fn register(&self, registration: Registration) -> Result<IssuedToken, AppError> {
        let email = normalize_email(&registration.email);
        let full_name = registration.fullname.trim().to_string();

        if !is_plausible_email(&email) {
            return Err(AppError::Validation("email is not a valid address".to_string()));
        }
        if full_name.is_empty() {
            return Err(AppError::Validation("fullname must not be empty".to_string()));
        }
        if registration.password.is_empty() {
            return Err(AppError::Validation("password must not be empty".to_string()));
        }

        let password_hash = hash_off_thread(registration.password).await?;
        let account = self
            .accounts
            .create_account(NewAccount {
                email,
                full_name,
                password_hash,
            })
            .await?;

        tracing::info!(user_id = account.id, "account registered");
        self.issue(account).await
    }

    /// Unknown email and wrong password are both reported as Unauthorized.
    pub async fn issue_token(&self, credentials: Credentials) -> Result<IssuedToken, AppError> {
        let email = normalize_email(&credentials.email);
        let stored = self.accounts.find_credentials(&email).await?;

        let account = match stored {
            Some(stored) => verify_off_thread(credentials.password, stored.password_hash)
                .await?
                .then_some(stored.purchaser),
            None => None,
        };

        match account {
            Some(account) => self.issue(account).await,
            None => {
                tracing::warn!("rejected token request with invalid credentials");
                Err(AppError::Unauthorized("invalid email or password".to_string()))
            }
        }
    }

    pub async fn revoke_token(&self, token: &str) -> Result<(), AppError> {
        if self.accounts.revoke_token(token).await? {
            Ok(())
        } else {
            Err(AppError::Unauthorized("token already revoked".to_string()))
        }
    }

    async fn issue(&self, account: Purchaser) -> Result<IssuedToken, AppError> {
        let token = token::generate_token();
        self.accounts.issue_token(account.id, &token).await?;
        tracing::info!(user_id = account.id, "api token issued");

        Ok(IssuedToken { account, token })
    }
}

async fn hash_off_thread(plain: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(|e| AppError::Internal(format!("password hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
}

async fn verify_off_thread(plain: String, stored: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || password::verify_password(&plain, &stored))
        .await
        .map_err(|e| AppError::Internal(format!("password verification task failed: {}", e)))
}
