pub mod accounts;
pub mod checkout;
pub mod invoice_queries;
pub mod payment_callback;

pub use accounts::{AccountService, Credentials, IssuedToken, Registration};
pub use checkout::CheckoutWorkflow;
pub use invoice_queries::{InvoiceQueries, Page, PageRequest};
pub use payment_callback::{CallbackPayload, PaymentCallbackHandler, CALLBACK_TOKEN_HEADER};
