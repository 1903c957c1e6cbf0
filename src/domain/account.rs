use serde::Serialize;

/// The authenticated account on whose behalf a checkout runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Purchaser {
    pub id: i64,
    pub email: String,
    pub full_name: String,
}

impl Purchaser {
    /// First whitespace-separated token of the full name, used as the
    /// customer's given name at the payment gateway.
    pub fn given_name(&self) -> &str {
        self.full_name
            .split_whitespace()
            .next()
            .unwrap_or(self.full_name.as_str())
    }
}

/// An account about to be registered. `email` is already normalized and
/// `password_hash` is a PHC string; the plain password never gets this far.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
}

/// What password login needs from the store.
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub purchaser: Purchaser,
    pub password_hash: String,
}

/// Lower-cased, trimmed form under which emails are stored and looked up.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `local@domain` with both parts non-empty and no whitespace.
pub fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
