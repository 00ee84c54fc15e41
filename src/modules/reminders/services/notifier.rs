use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Serialize;
use sha2::Sha256;
use tracing::info;

use crate::core::{AppError, Result};
use crate::modules::invoices::models::Invoice;
use crate::modules::reminders::models::ReminderCandidate;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Ledger-Signature";
pub const REMINDER_EVENT: &str = "invoice.reminder";

/// Delivery channel for reminders
///
/// A dispatch that returns `Ok` is recorded in the invoice's sent log; an
/// error leaves the reminder owed for the next sweep.
#[async_trait]
pub trait ReminderNotifier: Send + Sync {
    async fn dispatch(&self, invoice: &Invoice, candidate: &ReminderCandidate) -> Result<()>;
}

/// Writes reminders to the log only
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReminderNotifier for LogNotifier {
    async fn dispatch(&self, invoice: &Invoice, candidate: &ReminderCandidate) -> Result<()> {
        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            client_email = %invoice.client.email,
            reminder_type = %candidate.reminder_type,
            offset_days = ?candidate.offset_days,
            amount_due = %invoice.currency.format_amount(invoice.amount_due),
            due_date = %invoice.due_date,
            "Payment reminder"
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ReminderPayload<'a> {
    event: &'static str,
    invoice: ReminderInvoice<'a>,
    reminder: &'a ReminderCandidate,
    dispatched_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ReminderInvoice<'a> {
    id: &'a str,
    invoice_number: &'a str,
    title: &'a str,
    client_name: &'a str,
    client_email: &'a str,
    currency: String,
    total_amount: String,
    amount_paid: String,
    amount_due: String,
    due_date: DateTime<Utc>,
    status: &'a str,
}

/// POSTs reminder events to an HTTP endpoint
pub struct WebhookNotifier {
    client: Client,
    url: String,
    secret: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: String, secret: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            secret,
        })
    }

    fn payload<'a>(
        invoice: &'a Invoice,
        candidate: &'a ReminderCandidate,
        dispatched_at: DateTime<Utc>,
    ) -> ReminderPayload<'a> {
        ReminderPayload {
            event: REMINDER_EVENT,
            invoice: ReminderInvoice {
                id: &invoice.id,
                invoice_number: &invoice.invoice_number,
                title: &invoice.title,
                client_name: &invoice.client.name,
                client_email: &invoice.client.email,
                currency: invoice.currency.to_string(),
                total_amount: invoice.total_amount.to_string(),
                amount_paid: invoice.amount_paid.to_string(),
                amount_due: invoice.amount_due.to_string(),
                due_date: invoice.due_date,
                status: invoice.status.as_str(),
            },
            reminder: candidate,
            dispatched_at,
        }
    }
}

/// Hex HMAC-SHA256 of `body` keyed with `secret`
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::internal(format!("Invalid webhook secret: {}", e)))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl ReminderNotifier for WebhookNotifier {
    async fn dispatch(&self, invoice: &Invoice, candidate: &ReminderCandidate) -> Result<()> {
        let body = serde_json::to_vec(&Self::payload(invoice, candidate, Utc::now()))?;

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(secret) = &self.secret {
            request = request.header(SIGNATURE_HEADER, sign_payload(secret, &body)?);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::notifier(format!("Reminder webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(AppError::notifier(format!(
                "Reminder webhook returned {}: {}",
                status, error_body
            )));
        }

        info!(
            invoice_id = %invoice.id,
            reminder_type = %candidate.reminder_type,
            offset_days = ?candidate.offset_days,
            "Reminder webhook delivered"
        );
        Ok(())
    }
}
