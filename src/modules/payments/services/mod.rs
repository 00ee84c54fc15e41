pub mod payment_ledger;

pub use payment_ledger::{PaymentLedger, PaymentOutcome, PaymentSummary};
