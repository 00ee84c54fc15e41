use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{AppError, Currency, Result};

const ONE_HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Non-fatal findings from a totals pass, kept on the invoice snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum TotalsWarning {
    /// discount > subtotal + tax_amount; total_amount was clamped to zero
    DiscountExceedsTotal {
        discount: Decimal,
        gross_amount: Decimal,
    },
}

impl std::fmt::Display for TotalsWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TotalsWarning::DiscountExceedsTotal {
                discount,
                gross_amount,
            } => write!(
                f,
                "discount {} exceeds subtotal plus tax {}; total clamped to 0",
                discount, gross_amount
            ),
        }
    }
}

/// Output of [`TotalsCalculator::calculate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Totals {
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub warnings: Vec<TotalsWarning>,
}

/// Turns (subtotal, tax rate, discount) into (tax amount, total amount)
#[derive(Debug, Clone, Copy)]
pub struct TotalsCalculator;

impl TotalsCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Pure totals pass
    ///
    /// tax_amount = round_half_up(subtotal × tax_rate / 100)
    /// total_amount = max(0, subtotal + tax_amount − discount)
    ///
    /// Inputs stored on an invoice are bounded by `MAX_AMOUNT`; arithmetic
    /// saturates for anything larger.
    pub fn calculate(
        &self,
        subtotal: Decimal,
        tax_rate: Decimal,
        discount: Decimal,
        currency: Currency,
    ) -> Totals {
        let tax_amount = currency.round(subtotal.saturating_mul(tax_rate) / ONE_HUNDRED);
        let gross_amount = subtotal.saturating_add(tax_amount);
        let raw_total = gross_amount.saturating_sub(discount);

        let mut warnings = Vec::new();
        let total_amount = if raw_total < Decimal::ZERO {
            warnings.push(TotalsWarning::DiscountExceedsTotal {
                discount,
                gross_amount,
            });
            Decimal::ZERO
        } else {
            currency.round(raw_total)
        };

        Totals {
            tax_amount,
            total_amount,
            warnings,
        }
    }

    /// tax_rate is a percentage in [0, 100]
    pub fn validate_tax_rate(&self, tax_rate: Decimal) -> Result<()> {
        if tax_rate < Decimal::ZERO {
            return Err(AppError::validation("Tax rate cannot be negative"));
        }

        if tax_rate > ONE_HUNDRED {
            return Err(AppError::validation("Tax rate cannot exceed 100"));
        }

        Ok(())
    }

    /// discount is an absolute amount in the invoice currency
    pub fn validate_discount(&self, discount: Decimal, currency: Currency) -> Result<()> {
        if discount < Decimal::ZERO {
            return Err(AppError::validation("Discount cannot be negative"));
        }

        currency
            .validate_amount(discount)
            .map_err(|e| AppError::validation(format!("Invalid discount: {}", e)))
    }
}

impl Default for TotalsCalculator {
    fn default() -> Self {
        Self::new()
    }
}
