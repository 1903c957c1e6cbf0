use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::invoice_id;
use crate::ports::{InvoiceRepository, RepositoryResult};

/// Draws external invoice identifiers that no persisted invoice uses yet.
///
/// Redraws until a free id turns up; there are 18^7 suffixes per day. The
/// existence check is advisory. Uniqueness is enforced by the constraint on
/// insert.
pub struct InvoiceIdGenerator {
    invoices: Arc<dyn InvoiceRepository>,
    rng: Mutex<StdRng>,
}

impl InvoiceIdGenerator {
    pub fn new(invoices: Arc<dyn InvoiceRepository>) -> Self {
        Self {
            invoices,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic draws, for tests.
    pub fn with_seed(invoices: Arc<dyn InvoiceRepository>, seed: u64) -> Self {
        Self {
            invoices,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn draw(&self, date: NaiveDate) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        invoice_id::candidate(date, &mut *rng)
    }

    pub async fn generate(&self, date: NaiveDate) -> RepositoryResult<String> {
        loop {
            let candidate = self.draw(date);
            if !self.invoices.external_id_exists(&candidate).await? {
                return Ok(candidate);
            }
            tracing::debug!(external_id = %candidate, "external id already taken, redrawing");
        }
    }
}
