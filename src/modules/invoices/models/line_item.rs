// Billable rows of an invoice and their aggregate subtotal.
//
// Each line item derives `amount = quantity × rate`, rounded half-up to the
// invoice currency's minor unit. The set recomputes the affected item on
// every mutation, and `subtotal` is always the sum of item amounts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{AppError, Currency, Result, MAX_AMOUNT};

const MAX_DESCRIPTION_LEN: usize = 500;
const MAX_QUANTITY: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// A single billable row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Description of the work or product
    pub description: String,

    /// Quantity billed (hours, units); fractional values allowed
    pub quantity: Decimal,

    /// Price per unit
    pub rate: Decimal,

    /// Derived: quantity × rate, rounded per currency
    #[serde(default)]
    pub amount: Decimal,
}

/// Caller-supplied fields for a new line item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemInput {
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
}

/// Partial update of an existing line item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineItemPatch {
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub rate: Option<Decimal>,
}

impl LineItem {
    /// Create a new line item with validation
    ///
    /// # Arguments
    /// * `description` - Work/product description (non-empty)
    /// * `quantity` - Must be non-negative and at most one billion
    /// * `rate` - Must be non-negative and within `MAX_AMOUNT`
    /// * `currency` - Invoice currency, used to round the amount
    pub fn new(
        description: String,
        quantity: Decimal,
        rate: Decimal,
        currency: Currency,
    ) -> Result<Self> {
        Self::validate_description(&description)?;
        Self::validate_quantity(quantity)?;
        Self::validate_rate(rate)?;

        let amount = Self::checked_amount(quantity, rate, currency)?;

        Ok(Self {
            description,
            quantity,
            rate,
            amount,
        })
    }

    /// Formula: amount = quantity × rate, rounded half-up per currency scale
    pub fn calculate_amount(&mut self, currency: Currency) {
        // Bounded by validation; None only for rows built outside `new`
        if let Some(product) = self.quantity.checked_mul(self.rate) {
            self.amount = currency.round(product);
        }
    }

    fn checked_amount(quantity: Decimal, rate: Decimal, currency: Currency) -> Result<Decimal> {
        let amount = quantity
            .checked_mul(rate)
            .map(|product| currency.round(product))
            .filter(|amount| *amount <= MAX_AMOUNT)
            .ok_or_else(|| {
                AppError::validation(format!(
                    "Line item amount {} × {} exceeds the maximum of {}",
                    quantity, rate, MAX_AMOUNT
                ))
            })?;

        Ok(amount)
    }

    fn validate_description(description: &str) -> Result<()> {
        if description.trim().is_empty() {
            return Err(AppError::validation(
                "Line item description cannot be empty",
            ));
        }

        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(AppError::validation(format!(
                "Line item description cannot exceed {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }

        Ok(())
    }

    fn validate_quantity(quantity: Decimal) -> Result<()> {
        if quantity < Decimal::ZERO {
            return Err(AppError::validation(format!(
                "Quantity must be non-negative, got: {}",
                quantity
            )));
        }

        if quantity > MAX_QUANTITY {
            return Err(AppError::validation(format!(
                "Quantity cannot exceed {}, got: {}",
                MAX_QUANTITY, quantity
            )));
        }

        Ok(())
    }

    fn validate_rate(rate: Decimal) -> Result<()> {
        if rate < Decimal::ZERO {
            return Err(AppError::validation(format!(
                "Rate must be non-negative, got: {}",
                rate
            )));
        }

        if rate > MAX_AMOUNT {
            return Err(AppError::validation(format!(
                "Rate cannot exceed {}, got: {}",
                MAX_AMOUNT, rate
            )));
        }

        Ok(())
    }
}

/// Sum of item amounts, rejected once it passes `MAX_AMOUNT`
fn checked_subtotal(items: &[LineItem]) -> Result<Decimal> {
    items
        .iter()
        .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(item.amount))
        .filter(|subtotal| *subtotal <= MAX_AMOUNT)
        .ok_or_else(|| {
            AppError::validation(format!(
                "Invoice subtotal cannot exceed {}",
                MAX_AMOUNT
            ))
        })
}

impl LineItemInput {
    pub fn into_line_item(self, currency: Currency) -> Result<LineItem> {
        LineItem::new(self.description, self.quantity, self.rate, currency)
    }
}

/// Ordered collection of line items owned by one invoice
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineItemSet {
    items: Vec<LineItem>,
}

impl LineItemSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from caller input, validating every row
    pub fn from_inputs(inputs: Vec<LineItemInput>, currency: Currency) -> Result<Self> {
        let items = inputs
            .into_iter()
            .enumerate()
            .map(|(idx, input)| {
                input.into_line_item(currency).map_err(|e| match e {
                    AppError::Validation(msg) => {
                        AppError::validation(format!("Line item {}: {}", idx, msg))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        checked_subtotal(&items)?;

        Ok(Self { items })
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add_item(
        &mut self,
        description: String,
        quantity: Decimal,
        rate: Decimal,
        currency: Currency,
    ) -> Result<&LineItem> {
        let item = LineItem::new(description, quantity, rate, currency)?;
        let subtotal = self.subtotal().checked_add(item.amount);
        if subtotal.map_or(true, |subtotal| subtotal > MAX_AMOUNT) {
            return Err(AppError::validation(format!(
                "Invoice subtotal cannot exceed {}",
                MAX_AMOUNT
            )));
        }

        self.items.push(item);
        Ok(&self.items[self.items.len() - 1])
    }

    /// Apply a partial update; the item is left untouched if validation fails
    pub fn update_item(
        &mut self,
        index: usize,
        patch: LineItemPatch,
        currency: Currency,
    ) -> Result<&LineItem> {
        let current = self
            .items
            .get(index)
            .ok_or_else(|| AppError::validation(format!("Line item {} does not exist", index)))?;

        let updated = LineItem::new(
            patch.description.unwrap_or_else(|| current.description.clone()),
            patch.quantity.unwrap_or(current.quantity),
            patch.rate.unwrap_or(current.rate),
            currency,
        )?;

        let mut items = self.items.clone();
        items[index] = updated;
        checked_subtotal(&items)?;

        self.items = items;
        Ok(&self.items[index])
    }

    pub fn remove_item(&mut self, index: usize) -> Result<LineItem> {
        if index >= self.items.len() {
            return Err(AppError::validation(format!(
                "Line item {} does not exist",
                index
            )));
        }

        Ok(self.items.remove(index))
    }

    /// Re-derive every item amount (used after deserialization and before writes)
    pub fn recompute(&mut self, currency: Currency) {
        for item in &mut self.items {
            item.calculate_amount(currency);
        }
    }

    /// Sum of item amounts; bounded by `MAX_AMOUNT` for every stored set
    pub fn subtotal(&self) -> Decimal {
        checked_subtotal(&self.items).unwrap_or(MAX_AMOUNT)
    }
}
