pub mod invoice_service;
pub mod status_resolver;
pub mod totals_calculator;

pub use invoice_service::{InvoiceService, PaymentReceipt, ReminderReceipt};
pub use status_resolver::{StatusAction, StatusResolver};
pub use totals_calculator::{Totals, TotalsCalculator, TotalsWarning};
