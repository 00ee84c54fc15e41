//! Invoice & payment ledger
//!
//! Invoice aggregate with derived totals, an append-only payment ledger,
//! rule-driven status resolution and idempotent payment reminders, served
//! over actix-web.

pub mod config;
pub mod core;
pub mod middleware;
pub mod modules;

// Re-export commonly used types
pub use modules::invoices;
pub use modules::payments;
pub use modules::reminders;
pub use modules::AppState;
