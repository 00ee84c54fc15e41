use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::core::{AppError, Clock, Result};
use crate::modules::invoices::models::{
    CreateInvoiceRequest, Invoice, InvoiceDefaults, LineItemInput, LineItemPatch,
};
use crate::modules::invoices::repositories::InvoiceRepository;
use crate::modules::invoices::services::status_resolver::StatusAction;
use crate::modules::payments::models::NewPayment;
use crate::modules::payments::services::{PaymentOutcome, PaymentSummary};
use crate::modules::reminders::models::{ReminderCandidate, ReminderSettings, ReminderType};

/// Result of a payment event
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub invoice: Invoice,
    pub outcome: PaymentOutcome,
}

/// Result of recording a dispatched reminder
#[derive(Debug, Clone)]
pub struct ReminderReceipt {
    pub invoice: Invoice,
    /// False when the sent log already held this reminder
    pub recorded: bool,
}

/// Service for invoice ledger operations
///
/// Every mutation loads the aggregate, applies the change, runs
/// `Invoice::recompute` and writes it back with the version it loaded. A
/// write that loses a race is retried against the refreshed aggregate.
pub struct InvoiceService {
    invoice_repo: Arc<dyn InvoiceRepository>,
    clock: Arc<dyn Clock>,
    defaults: InvoiceDefaults,
    max_conflict_retries: u32,
}

impl InvoiceService {
    pub fn new(
        invoice_repo: Arc<dyn InvoiceRepository>,
        clock: Arc<dyn Clock>,
        defaults: InvoiceDefaults,
        max_conflict_retries: u32,
    ) -> Self {
        Self {
            invoice_repo,
            clock,
            defaults,
            max_conflict_retries,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Create a new draft invoice
    pub async fn create_invoice(&self, request: CreateInvoiceRequest) -> Result<Invoice> {
        let now = self.clock.now();
        let invoice = Invoice::create(request, &self.defaults, now)?;
        let stored = self.invoice_repo.insert(&invoice).await?;

        info!(
            invoice_id = %stored.id,
            invoice_number = %stored.invoice_number,
            total_amount = %stored.total_amount,
            currency = %stored.currency,
            "Invoice created"
        );

        Ok(stored)
    }

    /// Read model: the stored invoice recomputed against the current clock
    pub async fn get_invoice(&self, id: &str) -> Result<Invoice> {
        self.invoice_at(id, self.clock.now()).await
    }

    pub async fn list_invoices(&self, limit: i64, offset: i64) -> Result<Vec<Invoice>> {
        let now = self.clock.now();
        let mut invoices = self.invoice_repo.list(limit, offset).await?;
        for invoice in &mut invoices {
            invoice.recompute(now);
        }
        Ok(invoices)
    }

    /// Open invoices as stored, for the reminder sweep
    pub async fn open_invoices(&self) -> Result<Vec<Invoice>> {
        self.invoice_repo.list_open().await
    }

    pub async fn delete_invoice(&self, id: &str) -> Result<()> {
        self.invoice_repo.delete(id).await?;
        info!(invoice_id = %id, "Invoice deleted");
        Ok(())
    }

    pub async fn update_line_items(&self, id: &str, items: Vec<LineItemInput>) -> Result<Invoice> {
        let (invoice, ()) = self
            .mutate(id, "update_line_items", |invoice, now| {
                invoice.replace_line_items(items.clone(), now)
            })
            .await?;

        info!(
            invoice_id = %invoice.id,
            line_items = invoice.line_items.len(),
            subtotal = %invoice.subtotal,
            total_amount = %invoice.total_amount,
            "Invoice line items updated"
        );

        Ok(invoice)
    }

    pub async fn add_line_item(&self, id: &str, item: LineItemInput) -> Result<Invoice> {
        let (invoice, ()) = self
            .mutate(id, "add_line_item", |invoice, now| {
                invoice.add_line_item(item.clone(), now)
            })
            .await?;

        debug!(invoice_id = %invoice.id, subtotal = %invoice.subtotal, "Line item added");
        Ok(invoice)
    }

    pub async fn update_line_item(
        &self,
        id: &str,
        index: usize,
        patch: LineItemPatch,
    ) -> Result<Invoice> {
        let (invoice, ()) = self
            .mutate(id, "update_line_item", |invoice, now| {
                invoice.update_line_item(index, patch.clone(), now)
            })
            .await?;

        debug!(invoice_id = %invoice.id, index = index, subtotal = %invoice.subtotal, "Line item updated");
        Ok(invoice)
    }

    pub async fn remove_line_item(&self, id: &str, index: usize) -> Result<Invoice> {
        let (invoice, ()) = self
            .mutate(id, "remove_line_item", |invoice, now| {
                invoice.remove_line_item(index, now)
            })
            .await?;

        debug!(invoice_id = %invoice.id, index = index, subtotal = %invoice.subtotal, "Line item removed");
        Ok(invoice)
    }

    pub async fn update_pricing(
        &self,
        id: &str,
        tax_rate: Decimal,
        discount: Decimal,
    ) -> Result<Invoice> {
        let (invoice, ()) = self
            .mutate(id, "update_pricing", |invoice, now| {
                invoice.update_pricing(tax_rate, discount, now)
            })
            .await?;

        info!(
            invoice_id = %invoice.id,
            tax_rate = %invoice.tax_rate,
            discount = %invoice.discount,
            total_amount = %invoice.total_amount,
            "Invoice pricing updated"
        );

        Ok(invoice)
    }

    pub async fn update_reminder_settings(
        &self,
        id: &str,
        settings: ReminderSettings,
    ) -> Result<Invoice> {
        let (invoice, ()) = self
            .mutate(id, "update_reminder_settings", |invoice, now| {
                invoice.update_reminder_settings(settings.clone(), now)
            })
            .await?;

        Ok(invoice)
    }

    /// Record a payment; idempotent on the payment reference
    pub async fn record_payment(&self, id: &str, payment: NewPayment) -> Result<PaymentReceipt> {
        let (invoice, outcome) = self
            .mutate(id, "record_payment", |invoice, now| {
                invoice.record_payment(payment.clone(), now)
            })
            .await?;

        match &outcome {
            PaymentOutcome::Recorded(recorded) => info!(
                invoice_id = %invoice.id,
                payment_id = %recorded.id,
                amount = %recorded.amount,
                method = %recorded.payment_method,
                amount_paid = %invoice.amount_paid,
                amount_due = %invoice.amount_due,
                status = %invoice.status,
                "Payment recorded"
            ),
            PaymentOutcome::Duplicate {
                existing_payment_id,
            } => info!(
                invoice_id = %invoice.id,
                payment_id = %existing_payment_id,
                reference = ?payment.reference,
                "Payment already recorded (idempotent request)"
            ),
        }

        Ok(PaymentReceipt { invoice, outcome })
    }

    pub async fn mark_sent(&self, id: &str) -> Result<Invoice> {
        self.apply_action(id, StatusAction::Send).await
    }

    pub async fn mark_viewed(&self, id: &str) -> Result<Invoice> {
        self.apply_action(id, StatusAction::View).await
    }

    pub async fn cancel(&self, id: &str) -> Result<Invoice> {
        self.apply_action(id, StatusAction::Cancel).await
    }

    async fn apply_action(&self, id: &str, action: StatusAction) -> Result<Invoice> {
        let (invoice, changed) = self
            .mutate(id, "apply_action", |invoice, now| invoice.apply_action(action, now))
            .await?;

        info!(
            invoice_id = %invoice.id,
            action = %action,
            changed = changed,
            status = %invoice.status,
            "Invoice lifecycle action applied"
        );

        Ok(invoice)
    }

    /// Reminders owed for one invoice at `now`
    pub async fn compute_due_reminders(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReminderCandidate>> {
        Ok(self.invoice_at(id, now).await?.due_reminders(now))
    }

    /// Fresh read of the stored invoice, recomputed at `now`
    pub async fn invoice_at(&self, id: &str, now: DateTime<Utc>) -> Result<Invoice> {
        let mut invoice = self.load(id).await?;
        invoice.recompute(now);
        Ok(invoice)
    }

    /// Append to the sent-reminder log after a successful dispatch
    pub async fn record_reminder_sent(
        &self,
        id: &str,
        reminder_type: ReminderType,
        offset_days: Option<u32>,
        sent_by: &str,
    ) -> Result<ReminderReceipt> {
        let (invoice, recorded) = self
            .mutate(id, "record_reminder_sent", |invoice, now| {
                invoice.record_reminder_sent(reminder_type, offset_days, sent_by, now)
            })
            .await?;

        if recorded {
            info!(
                invoice_id = %invoice.id,
                reminder_type = %reminder_type,
                offset_days = ?offset_days,
                sent_by = %sent_by,
                "Reminder recorded as sent"
            );
        } else {
            debug!(
                invoice_id = %invoice.id,
                reminder_type = %reminder_type,
                offset_days = ?offset_days,
                "Reminder already recorded"
            );
        }

        Ok(ReminderReceipt { invoice, recorded })
    }

    /// Persist a status change caused purely by time (e.g. becoming overdue)
    pub async fn refresh_status(&self, id: &str) -> Result<Invoice> {
        let (invoice, ()) = self.mutate(id, "refresh_status", |_, _| Ok(())).await?;
        Ok(invoice)
    }

    pub async fn payment_summary(&self, id: &str) -> Result<PaymentSummary> {
        Ok(self.get_invoice(id).await?.payment_summary())
    }

    async fn load(&self, id: &str) -> Result<Invoice> {
        self.invoice_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Invoice '{}' not found", id)))
    }

    /// Load → apply → recompute → versioned write, retrying on conflict
    ///
    /// Validation errors from `apply` abort without writing. When nothing
    /// changed, no write happens and the version stays put.
    async fn mutate<T, F>(&self, id: &str, operation: &str, mut apply: F) -> Result<(Invoice, T)>
    where
        F: FnMut(&mut Invoice, DateTime<Utc>) -> Result<T> + Send,
        T: Send,
    {
        let mut attempt: u32 = 0;

        loop {
            let loaded = self.load(id).await?;
            let expected_version = loaded.version;
            let now = self.clock.now();

            let mut invoice = loaded.clone();
            let value = apply(&mut invoice, now)?;
            invoice.recompute(now);

            if invoice == loaded {
                return Ok((invoice, value));
            }

            match self.invoice_repo.update(&invoice, expected_version).await {
                Ok(stored) => return Ok((stored, value)),
                Err(e) if e.is_conflict() && attempt < self.max_conflict_retries => {
                    attempt += 1;
                    warn!(
                        invoice_id = %id,
                        operation = operation,
                        attempt = attempt,
                        expected_version = expected_version,
                        "Concurrent invoice modification, retrying against latest version"
                    );
                }
                Err(e) => {
                    if e.is_conflict() {
                        warn!(
                            invoice_id = %id,
                            operation = operation,
                            attempts = attempt + 1,
                            "Giving up after repeated invoice version conflicts"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}
