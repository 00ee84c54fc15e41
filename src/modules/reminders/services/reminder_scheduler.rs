use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::modules::invoices::models::InvoiceStatus;
use crate::modules::reminders::models::{
    Reminder, ReminderCandidate, ReminderSettings, ReminderType,
};

/// Everything the scheduler needs to decide what is owed
#[derive(Debug, Clone, Copy)]
pub struct ScheduleInputs<'a> {
    pub settings: &'a ReminderSettings,
    pub due_date: DateTime<Utc>,
    pub now: DateTime<Utc>,
    pub sent: &'a [Reminder],
    pub status: InvoiceStatus,
    pub amount_due: Decimal,
}

/// Decides which reminders are owed right now
///
/// Pure: dispatching and recording are left to the caller. A (type, offset)
/// pair already present in the sent log is never emitted again.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReminderScheduler;

impl ReminderScheduler {
    pub fn new() -> Self {
        Self
    }

    pub fn due_reminders(&self, inputs: &ScheduleInputs<'_>) -> Vec<ReminderCandidate> {
        if inputs.amount_due <= Decimal::ZERO
            || matches!(inputs.status, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
        {
            return Vec::new();
        }

        let already_sent = |reminder_type: ReminderType, offset_days: Option<u32>| {
            inputs
                .sent
                .iter()
                .any(|r| r.covers(reminder_type, offset_days))
        };

        let mut candidates = Vec::new();
        let due = inputs.due_date;
        let now = inputs.now;

        // [due − before_due_days, due)
        let pre_due_start = due - Duration::days(i64::from(inputs.settings.before_due_days));
        if now >= pre_due_start && now < due && !already_sent(ReminderType::PreDue, None) {
            candidates.push(ReminderCandidate {
                reminder_type: ReminderType::PreDue,
                offset_days: None,
                due_at: pre_due_start,
            });
        }

        // [due, due + 1 day)
        if inputs.settings.on_due_date
            && now >= due
            && now < due + Duration::days(1)
            && !already_sent(ReminderType::OnDue, None)
        {
            candidates.push(ReminderCandidate {
                reminder_type: ReminderType::OnDue,
                offset_days: None,
                due_at: due,
            });
        }

        for &offset in &inputs.settings.after_due_days {
            let owed_from = due + Duration::days(i64::from(offset));
            if now >= owed_from && !already_sent(ReminderType::PostDue, Some(offset)) {
                candidates.push(ReminderCandidate {
                    reminder_type: ReminderType::PostDue,
                    offset_days: Some(offset),
                    due_at: owed_from,
                });
            }
        }

        candidates
    }
}
