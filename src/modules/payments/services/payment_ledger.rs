use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{AppError, Currency, Result, MAX_AMOUNT};
use crate::modules::payments::models::{NewPayment, Payment};

/// Result of applying a payment event to a ledger
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    /// The payment was appended
    Recorded(Payment),
    /// A payment with the same reference already exists; nothing changed
    Duplicate { existing_payment_id: String },
}

impl PaymentOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, PaymentOutcome::Duplicate { .. })
    }
}

/// Append-only record of payments against one invoice
///
/// `amount_paid` is a plain sum, so the final figure does not depend on the
/// order in which payment events arrive. Events carrying a reference are
/// applied at most once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentLedger {
    payments: Vec<Payment>,
}

impl PaymentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn len(&self) -> usize {
        self.payments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payments.is_empty()
    }

    pub fn find_by_reference(&self, reference: &str) -> Option<&Payment> {
        self.payments
            .iter()
            .find(|p| p.reference.as_deref() == Some(reference))
    }

    /// Validate and append a payment, deduplicating on reference
    pub fn record(
        &mut self,
        new_payment: NewPayment,
        currency: Currency,
        recorded_at: DateTime<Utc>,
    ) -> Result<PaymentOutcome> {
        if let Some(reference) = new_payment.normalized_reference() {
            if let Some(existing) = self.find_by_reference(&reference) {
                return Ok(PaymentOutcome::Duplicate {
                    existing_payment_id: existing.id.clone(),
                });
            }
        }

        let payment = Payment::from_new(new_payment, currency, recorded_at)?;
        let amount_paid = self.amount_paid().checked_add(payment.amount);
        if amount_paid.map_or(true, |paid| paid > MAX_AMOUNT) {
            return Err(AppError::validation(format!(
                "Total payments cannot exceed {}",
                MAX_AMOUNT
            )));
        }
        self.payments.push(payment.clone());

        Ok(PaymentOutcome::Recorded(payment))
    }

    /// Formula: amount_paid = Σ payment.amount
    pub fn amount_paid(&self) -> Decimal {
        self.payments
            .iter()
            .fold(Decimal::ZERO, |acc, p| acc.saturating_add(p.amount))
    }

    /// Formula: amount_due = total_amount − amount_paid (negative means credit owed)
    pub fn amount_due(&self, total_amount: Decimal) -> Decimal {
        total_amount.saturating_sub(self.amount_paid())
    }

    pub fn last_payment_date(&self) -> Option<DateTime<Utc>> {
        self.payments.iter().map(|p| p.payment_date).max()
    }

    pub fn summary(&self, total_amount: Decimal) -> PaymentSummary {
        let amount_paid = self.amount_paid();
        PaymentSummary {
            total_amount,
            amount_paid,
            amount_due: total_amount.saturating_sub(amount_paid),
            payment_count: self.payments.len(),
            is_fully_paid: total_amount > Decimal::ZERO && amount_paid >= total_amount,
            last_payment_date: self.last_payment_date(),
        }
    }
}

/// Payment statistics for an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub amount_due: Decimal,
    pub payment_count: usize,
    pub is_fully_paid: bool,
    pub last_payment_date: Option<DateTime<Utc>>,
}
