pub mod memory;
pub mod postgres_catalog;
pub mod postgres_invoice_repository;

pub use memory::InMemoryStore;
pub use postgres_catalog::{PostgresAccountDirectory, PostgresProductCatalog};
pub use postgres_invoice_repository::PostgresInvoiceRepository;
