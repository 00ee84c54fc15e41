use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::core::Result;
use crate::modules::invoices::models::LifecycleStage;
use crate::modules::invoices::services::InvoiceService;
use crate::modules::reminders::services::notifier::ReminderNotifier;

/// Outcome of one sweep over the open invoices
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub invoices_scanned: usize,
    pub status_updates: usize,
    pub reminders_sent: usize,
    pub dispatch_failures: usize,
    /// Another sweep held the lock; nothing was done
    pub skipped: bool,
}

/// Background job dispatching owed reminders
///
/// Also persists status changes driven purely by time, so stored invoices
/// become `overdue` without waiting for the next user mutation. Draft
/// invoices have not been delivered to the client and are never reminded.
pub struct ReminderSweeper {
    service: Arc<InvoiceService>,
    notifier: Arc<dyn ReminderNotifier>,
    sent_by: String,
    running: Mutex<()>,
}

impl ReminderSweeper {
    pub fn new(
        service: Arc<InvoiceService>,
        notifier: Arc<dyn ReminderNotifier>,
        sent_by: impl Into<String>,
    ) -> Self {
        Self {
            service,
            notifier,
            sent_by: sent_by.into(),
            running: Mutex::new(()),
        }
    }

    /// Run sweeps forever; spawn as a tokio task
    pub async fn start(self: Arc<Self>, every: Duration) {
        info!(
            interval_secs = every.as_secs(),
            "Starting reminder sweeper"
        );

        let mut ticker = interval(every);

        loop {
            ticker.tick().await;

            let now = self.service.now();
            match self.run_once(now).await {
                Ok(report) if report.skipped => {
                    debug!("Previous reminder sweep still running, tick skipped");
                }
                Ok(report) => {
                    if report.reminders_sent > 0
                        || report.status_updates > 0
                        || report.dispatch_failures > 0
                    {
                        info!(
                            invoices_scanned = report.invoices_scanned,
                            status_updates = report.status_updates,
                            reminders_sent = report.reminders_sent,
                            dispatch_failures = report.dispatch_failures,
                            "Reminder sweep completed"
                        );
                    }
                }
                Err(e) => {
                    error!(error = %e, "Reminder sweep failed");
                }
            }
        }
    }

    /// One pass over every open invoice at `now`
    ///
    /// Each candidate is checked against a fresh read of the invoice right
    /// before dispatch. Per-invoice failures are logged and counted; only
    /// failing to list the open invoices aborts the sweep.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let Ok(_guard) = self.running.try_lock() else {
            return Ok(SweepReport {
                skipped: true,
                ..Default::default()
            });
        };

        let mut report = SweepReport::default();
        let open = self.service.open_invoices().await?;

        for stored in open {
            report.invoices_scanned += 1;

            let mut invoice = stored.clone();
            invoice.recompute(now);

            if invoice.status != stored.status {
                match self.service.refresh_status(&stored.id).await {
                    Ok(refreshed) => {
                        info!(
                            invoice_id = %stored.id,
                            from = %stored.status,
                            to = %refreshed.status,
                            "Invoice status refreshed"
                        );
                        report.status_updates += 1;
                    }
                    Err(e) => {
                        warn!(invoice_id = %stored.id, error = %e, "Failed to persist refreshed status");
                    }
                }
            }

            if invoice.stage == LifecycleStage::Draft {
                continue;
            }

            for candidate in invoice.due_reminders(now) {
                // Payments or cancellations may land while the sweep runs
                let current = match self.service.invoice_at(&invoice.id, now).await {
                    Ok(current) => current,
                    Err(e) => {
                        warn!(invoice_id = %invoice.id, error = %e, "Invoice could not be reloaded, skipping its reminders");
                        break;
                    }
                };
                if current.stage == LifecycleStage::Draft
                    || !current.due_reminders(now).contains(&candidate)
                {
                    debug!(
                        invoice_id = %current.id,
                        reminder_type = %candidate.reminder_type,
                        offset_days = ?candidate.offset_days,
                        status = %current.status,
                        "Reminder no longer owed"
                    );
                    continue;
                }

                if let Err(e) = self.notifier.dispatch(&current, &candidate).await {
                    report.dispatch_failures += 1;
                    warn!(
                        invoice_id = %current.id,
                        reminder_type = %candidate.reminder_type,
                        offset_days = ?candidate.offset_days,
                        error = %e,
                        "Reminder dispatch failed, will retry next sweep"
                    );
                    continue;
                }

                match self
                    .service
                    .record_reminder_sent(
                        &current.id,
                        candidate.reminder_type,
                        candidate.offset_days,
                        &self.sent_by,
                    )
                    .await
                {
                    Ok(receipt) if receipt.recorded => report.reminders_sent += 1,
                    Ok(_) => {
                        debug!(
                            invoice_id = %current.id,
                            reminder_type = %candidate.reminder_type,
                            offset_days = ?candidate.offset_days,
                            "Reminder was recorded by another sweep"
                        );
                    }
                    Err(e) => {
                        error!(
                            invoice_id = %current.id,
                            reminder_type = %candidate.reminder_type,
                            offset_days = ?candidate.offset_days,
                            error = %e,
                            "Reminder dispatched but could not be recorded"
                        );
                    }
                }
            }
        }

        Ok(report)
    }
}
