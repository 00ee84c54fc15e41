// Payments module

pub mod controllers;
pub mod models;
pub mod services;

pub use models::{NewPayment, Payment, PaymentMethod};
pub use services::{PaymentLedger, PaymentOutcome, PaymentSummary};
