use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{AppError, Currency, Result};

/// How a payment was received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CardProcessor,
    AlternateProcessor,
    BankTransfer,
    Cash,
    Other,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::CardProcessor => write!(f, "card_processor"),
            PaymentMethod::AlternateProcessor => write!(f, "alternate_processor"),
            PaymentMethod::BankTransfer => write!(f, "bank_transfer"),
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "card_processor" => Ok(PaymentMethod::CardProcessor),
            "alternate_processor" => Ok(PaymentMethod::AlternateProcessor),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "cash" => Ok(PaymentMethod::Cash),
            "other" => Ok(PaymentMethod::Other),
            _ => Err(format!("Invalid payment method: {}", s)),
        }
    }
}

/// A recorded receipt of money against an invoice
///
/// Immutable once appended to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub amount: Decimal,
    pub payment_date: DateTime<Utc>,
    pub payment_method: PaymentMethod,
    /// External transaction reference; doubles as the idempotency key
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Payment event as delivered by the API layer or a webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub amount: Decimal,
    pub payment_date: DateTime<Utc>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewPayment {
    pub fn new(amount: Decimal, payment_date: DateTime<Utc>, payment_method: PaymentMethod) -> Self {
        Self {
            amount,
            payment_date,
            payment_method,
            reference: None,
            notes: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Trimmed reference; blank references count as absent
    pub fn normalized_reference(&self) -> Option<String> {
        self.reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
    }
}

impl Payment {
    /// Validate a payment event and stamp it for appending
    ///
    /// Rejects non-positive amounts and amounts finer than the currency's
    /// minor unit.
    pub fn from_new(
        new_payment: NewPayment,
        currency: Currency,
        recorded_at: DateTime<Utc>,
    ) -> Result<Self> {
        if new_payment.amount <= Decimal::ZERO {
            return Err(AppError::validation(format!(
                "Payment amount must be positive, got: {}",
                new_payment.amount
            )));
        }

        currency
            .validate_amount(new_payment.amount)
            .map_err(AppError::validation)?;

        let reference = new_payment.normalized_reference();
        let notes = new_payment
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            amount: new_payment.amount,
            payment_date: new_payment.payment_date,
            payment_method: new_payment.payment_method,
            reference,
            notes,
            recorded_at,
        })
    }
}
