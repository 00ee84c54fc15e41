pub mod invoice_repository;
pub mod mysql_invoice_repository;

pub use invoice_repository::{InMemoryInvoiceRepository, InvoiceRepository};
pub use mysql_invoice_repository::MySqlInvoiceRepository;
