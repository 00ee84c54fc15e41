// Invoice aggregate root.
//
// Owns line items, the payment ledger and the sent-reminder log, and keeps
// every derived field (subtotal, tax, total, amount paid/due, status) in step
// with them. Each mutating method validates first, applies, then runs
// `recompute` so a caller never observes a half-updated invoice. The
// service layer calls `recompute` again right before every write.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::line_item::{LineItemInput, LineItemPatch, LineItemSet};
use super::status::{InvoiceStatus, LifecycleStage};
use crate::core::{AppError, Currency, Result};
use crate::modules::invoices::services::status_resolver::{
    StatusAction, StatusInputs, StatusResolver,
};
use crate::modules::invoices::services::totals_calculator::{TotalsCalculator, TotalsWarning};
use crate::modules::payments::models::NewPayment;
use crate::modules::payments::services::{PaymentLedger, PaymentOutcome, PaymentSummary};
use crate::modules::reminders::models::{
    Reminder, ReminderCandidate, ReminderSettings, ReminderType,
};
use crate::modules::reminders::services::reminder_scheduler::{ReminderScheduler, ScheduleInputs};

const MAX_TITLE_LEN: usize = 200;
const MAX_INVOICE_NUMBER_LEN: usize = 50;

/// Client details captured when the invoice is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSnapshot {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
}

impl ClientSnapshot {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("Client name cannot be empty"));
        }

        let email = self.email.trim();
        if email.is_empty() {
            return Err(AppError::validation("Client email cannot be empty"));
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err(AppError::validation(format!(
                "Client email '{}' is not a valid address",
                email
            ))),
        }
    }
}

/// Sender branding captured for rendering
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrandingSnapshot {
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub accent_color: Option<String>,
    #[serde(default)]
    pub footer: Option<String>,
}

/// Fallbacks applied when a create request leaves fields out
#[derive(Debug, Clone)]
pub struct InvoiceDefaults {
    pub currency: Currency,
    pub due_days: u32,
    pub reminder_settings: ReminderSettings,
}

impl Default for InvoiceDefaults {
    fn default() -> Self {
        Self {
            currency: Currency::USD,
            due_days: 30,
            reminder_settings: ReminderSettings::default(),
        }
    }
}

/// Create request for a new invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoiceRequest {
    pub title: String,
    pub client: ClientSnapshot,
    pub line_items: Vec<LineItemInput>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub issue_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub reminder_settings: Option<ReminderSettings>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub terms: Option<String>,
    #[serde(default)]
    pub branding: Option<BrandingSnapshot>,
}

impl CreateInvoiceRequest {
    pub fn new(title: impl Into<String>, client: ClientSnapshot, line_items: Vec<LineItemInput>) -> Self {
        Self {
            title: title.into(),
            client,
            line_items,
            invoice_number: None,
            project_id: None,
            issue_date: None,
            due_date: None,
            currency: None,
            tax_rate: None,
            discount: None,
            reminder_settings: None,
            notes: None,
            terms: None,
            branding: None,
        }
    }
}

/// The invoice aggregate, also its persisted document shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub title: String,
    pub client: ClientSnapshot,
    pub project_id: Option<String>,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub currency: Currency,

    pub line_items: LineItemSet,
    pub tax_rate: Decimal,
    pub discount: Decimal,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,

    pub payments: PaymentLedger,
    pub amount_paid: Decimal,
    pub amount_due: Decimal,

    pub status: InvoiceStatus,
    /// Last explicit delivery stage; status falls back to it
    pub stage: LifecycleStage,

    pub reminders: Vec<Reminder>,
    pub reminder_settings: ReminderSettings,

    pub notes: Option<String>,
    pub terms: Option<String>,
    pub branding: BrandingSnapshot,

    /// Findings from the last totals pass (e.g. clamped discount)
    #[serde(default)]
    pub warnings: Vec<TotalsWarning>,

    /// Optimistic concurrency marker, bumped by the repository on every write
    #[serde(default)]
    pub version: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Invoice {
    /// Create a validated draft invoice with all derived fields computed
    pub fn create(
        request: CreateInvoiceRequest,
        defaults: &InvoiceDefaults,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let calculator = TotalsCalculator::new();

        let title = request.title.trim().to_string();
        Self::validate_title(&title)?;
        request.client.validate()?;

        let currency = request.currency.unwrap_or(defaults.currency);
        let tax_rate = request.tax_rate.unwrap_or(Decimal::ZERO);
        let discount = request.discount.unwrap_or(Decimal::ZERO);
        calculator.validate_tax_rate(tax_rate)?;
        calculator.validate_discount(discount, currency)?;

        if request.line_items.is_empty() {
            return Err(AppError::validation(
                "Invoice must have at least one line item",
            ));
        }
        let line_items = LineItemSet::from_inputs(request.line_items, currency)?;

        let issue_date = request.issue_date.unwrap_or(now);
        let due_date = request
            .due_date
            .unwrap_or_else(|| issue_date + Duration::days(i64::from(defaults.due_days)));
        if due_date < issue_date {
            return Err(AppError::validation(
                "Due date cannot be before the issue date",
            ));
        }

        let reminder_settings = request
            .reminder_settings
            .unwrap_or_else(|| defaults.reminder_settings.clone());
        reminder_settings.validate()?;

        let invoice_number = match request.invoice_number {
            Some(number) => {
                let number = number.trim().to_string();
                Self::validate_invoice_number(&number)?;
                number
            }
            None => generate_invoice_number(issue_date),
        };

        let mut invoice = Self {
            id: Uuid::new_v4().to_string(),
            invoice_number,
            title,
            client: request.client,
            project_id: request.project_id,
            issue_date,
            due_date,
            currency,
            line_items,
            tax_rate,
            discount,
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            payments: PaymentLedger::new(),
            amount_paid: Decimal::ZERO,
            amount_due: Decimal::ZERO,
            status: InvoiceStatus::Draft,
            stage: LifecycleStage::Draft,
            reminders: Vec::new(),
            reminder_settings,
            notes: request.notes,
            terms: request.terms,
            branding: request.branding.unwrap_or_default(),
            warnings: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
            sent_at: None,
            viewed_at: None,
            paid_at: None,
            cancelled_at: None,
        };

        invoice.recompute(now);
        Ok(invoice)
    }

    /// Re-derive subtotal → totals → payment summary → status
    ///
    /// Idempotent for a fixed `now`.
    pub fn recompute(&mut self, now: DateTime<Utc>) {
        self.line_items.recompute(self.currency);
        self.subtotal = self.line_items.subtotal();

        let totals =
            TotalsCalculator::new().calculate(self.subtotal, self.tax_rate, self.discount, self.currency);
        self.tax_amount = totals.tax_amount;
        self.total_amount = totals.total_amount;
        for warning in &totals.warnings {
            if !self.warnings.contains(warning) {
                tracing::warn!(
                    invoice_id = %self.id,
                    invoice_number = %self.invoice_number,
                    warning = %warning,
                    "Invoice totals adjusted"
                );
            }
        }
        self.warnings = totals.warnings;

        self.amount_paid = self.payments.amount_paid();
        self.amount_due = self.payments.amount_due(self.total_amount);

        self.status = StatusResolver::new().resolve(&StatusInputs {
            current: self.status,
            stage: self.stage,
            amount_paid: self.amount_paid,
            total_amount: self.total_amount,
            due_date: self.due_date,
            now,
        });

        if self.status == InvoiceStatus::Paid && self.paid_at.is_none() {
            self.paid_at = Some(now);
        }
    }

    /// Line items and pricing are editable only before money or client views arrive
    pub fn is_mutable(&self) -> bool {
        matches!(self.status, InvoiceStatus::Draft | InvoiceStatus::Sent) && self.payments.is_empty()
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.is_mutable() {
            return Ok(());
        }

        Err(AppError::validation(format!(
            "Invoice {} can no longer be edited (status: {}, payments: {})",
            self.invoice_number,
            self.status,
            self.payments.len()
        )))
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Replace every line item at once
    pub fn replace_line_items(&mut self, inputs: Vec<LineItemInput>, now: DateTime<Utc>) -> Result<()> {
        self.ensure_mutable()?;
        if inputs.is_empty() {
            return Err(AppError::validation(
                "Invoice must have at least one line item",
            ));
        }

        self.line_items = LineItemSet::from_inputs(inputs, self.currency)?;
        self.touch(now);
        self.recompute(now);
        Ok(())
    }

    pub fn add_line_item(&mut self, input: LineItemInput, now: DateTime<Utc>) -> Result<()> {
        self.ensure_mutable()?;
        self.line_items
            .add_item(input.description, input.quantity, input.rate, self.currency)?;
        self.touch(now);
        self.recompute(now);
        Ok(())
    }

    pub fn update_line_item(
        &mut self,
        index: usize,
        patch: LineItemPatch,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_mutable()?;
        self.line_items.update_item(index, patch, self.currency)?;
        self.touch(now);
        self.recompute(now);
        Ok(())
    }

    pub fn remove_line_item(&mut self, index: usize, now: DateTime<Utc>) -> Result<()> {
        self.ensure_mutable()?;
        if self.line_items.len() == 1 && index == 0 {
            return Err(AppError::validation(
                "Invoice must have at least one line item",
            ));
        }
        self.line_items.remove_item(index)?;
        self.touch(now);
        self.recompute(now);
        Ok(())
    }

    pub fn update_pricing(
        &mut self,
        tax_rate: Decimal,
        discount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_mutable()?;
        let calculator = TotalsCalculator::new();
        calculator.validate_tax_rate(tax_rate)?;
        calculator.validate_discount(discount, self.currency)?;

        self.tax_rate = tax_rate;
        self.discount = discount;
        self.touch(now);
        self.recompute(now);
        Ok(())
    }

    /// Append a payment; a repeated reference is acknowledged without change
    pub fn record_payment(
        &mut self,
        new_payment: NewPayment,
        now: DateTime<Utc>,
    ) -> Result<PaymentOutcome> {
        if let Some(existing) = new_payment
            .normalized_reference()
            .and_then(|reference| self.payments.find_by_reference(&reference))
        {
            return Ok(PaymentOutcome::Duplicate {
                existing_payment_id: existing.id.clone(),
            });
        }

        if self.status == InvoiceStatus::Cancelled {
            return Err(AppError::validation(format!(
                "Cannot record a payment on cancelled invoice {}",
                self.invoice_number
            )));
        }

        let outcome = self.payments.record(new_payment, self.currency, now)?;
        if !outcome.is_duplicate() {
            self.touch(now);
        }
        self.recompute(now);
        Ok(outcome)
    }

    /// Apply an explicit lifecycle action; returns false when nothing changed
    pub fn apply_action(&mut self, action: StatusAction, now: DateTime<Utc>) -> Result<bool> {
        // Time may have moved the status since the last write
        self.recompute(now);
        let effect = StatusResolver::new().apply_action(action, self.status, self.stage)?;

        match action {
            StatusAction::Send => {
                self.sent_at.get_or_insert(now);
            }
            StatusAction::View => {
                self.viewed_at.get_or_insert(now);
            }
            StatusAction::Cancel => {}
        }

        if effect.noop {
            return Ok(false);
        }

        self.stage = effect.stage;
        if effect.cancel {
            self.status = InvoiceStatus::Cancelled;
            self.cancelled_at = Some(now);
        }
        self.touch(now);
        self.recompute(now);

        Ok(true)
    }

    pub fn update_reminder_settings(
        &mut self,
        settings: ReminderSettings,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.status == InvoiceStatus::Cancelled {
            return Err(AppError::validation(
                "Cannot change reminder settings on a cancelled invoice",
            ));
        }
        settings.validate()?;

        self.reminder_settings = settings;
        self.touch(now);
        self.recompute(now);
        Ok(())
    }

    /// Reminders owed at `now`, given the current derived state
    pub fn due_reminders(&self, now: DateTime<Utc>) -> Vec<ReminderCandidate> {
        ReminderScheduler::new().due_reminders(&ScheduleInputs {
            settings: &self.reminder_settings,
            due_date: self.due_date,
            now,
            sent: &self.reminders,
            status: self.status,
            amount_due: self.amount_due,
        })
    }

    /// Record a dispatched reminder; returns false if the log already covers it
    pub fn record_reminder_sent(
        &mut self,
        reminder_type: ReminderType,
        offset_days: Option<u32>,
        sent_by: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let offset_days = match reminder_type {
            ReminderType::PostDue => Some(offset_days.ok_or_else(|| {
                AppError::validation("Post-due reminders must specify offset_days")
            })?),
            _ => None,
        };

        let sent_by = sent_by.trim();
        if sent_by.is_empty() {
            return Err(AppError::validation("sent_by cannot be empty"));
        }

        if self
            .reminders
            .iter()
            .any(|r| r.covers(reminder_type, offset_days))
        {
            return Ok(false);
        }

        self.reminders.push(Reminder {
            reminder_type,
            offset_days,
            sent_date: now,
            sent_by: sent_by.to_string(),
        });
        self.touch(now);
        self.recompute(now);
        Ok(true)
    }

    pub fn payment_summary(&self) -> PaymentSummary {
        self.payments.summary(self.total_amount)
    }

    fn validate_title(title: &str) -> Result<()> {
        if title.is_empty() {
            return Err(AppError::validation("Invoice title cannot be empty"));
        }

        if title.len() > MAX_TITLE_LEN {
            return Err(AppError::validation(format!(
                "Invoice title cannot exceed {} characters",
                MAX_TITLE_LEN
            )));
        }

        Ok(())
    }

    fn validate_invoice_number(number: &str) -> Result<()> {
        if number.is_empty() {
            return Err(AppError::validation("Invoice number cannot be empty"));
        }

        if number.len() > MAX_INVOICE_NUMBER_LEN {
            return Err(AppError::validation(format!(
                "Invoice number cannot exceed {} characters",
                MAX_INVOICE_NUMBER_LEN
            )));
        }

        Ok(())
    }
}

/// `INV-YYYYMM-XXXXXXXX`
pub fn generate_invoice_number(issue_date: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "INV-{}-{}",
        issue_date.format("%Y%m"),
        suffix[..8].to_uppercase()
    )
}
