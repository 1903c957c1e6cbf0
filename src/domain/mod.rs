//! Framework-agnostic checkout entities.

pub mod account;
pub mod invoice;
pub mod invoice_id;
pub mod product;

pub use account::{AccountCredentials, NewAccount, Purchaser};
pub use invoice::{
    Invoice, InvoiceLineItem, InvoiceView, InvoiceWithItems, NewInvoice, NewLineItem,
    PaymentStatus,
};
pub use product::Product;
