use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{AppError, Result};

const MAX_OFFSET_DAYS: u32 = 365;
const MAX_AFTER_DUE_OFFSETS: usize = 12;

/// When a reminder fires relative to the due date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderType {
    PreDue,
    OnDue,
    PostDue,
}

impl std::fmt::Display for ReminderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReminderType::PreDue => write!(f, "pre_due"),
            ReminderType::OnDue => write!(f, "on_due"),
            ReminderType::PostDue => write!(f, "post_due"),
        }
    }
}

/// Sent-reminder log entry, one per successful dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub reminder_type: ReminderType,
    /// Days after the due date; set for post-due reminders only
    #[serde(default)]
    pub offset_days: Option<u32>,
    pub sent_date: DateTime<Utc>,
    pub sent_by: String,
}

impl Reminder {
    /// Pre-due and on-due are owed once per invoice; post-due once per offset
    pub fn covers(&self, reminder_type: ReminderType, offset_days: Option<u32>) -> bool {
        match reminder_type {
            ReminderType::PostDue => {
                self.reminder_type == ReminderType::PostDue && self.offset_days == offset_days
            }
            other => self.reminder_type == other,
        }
    }
}

/// A reminder owed now, not yet dispatched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderCandidate {
    pub reminder_type: ReminderType,
    pub offset_days: Option<u32>,
    /// Instant the reminder became owed
    pub due_at: DateTime<Utc>,
}

/// Per-invoice reminder cadence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSettings {
    pub before_due_days: u32,
    pub on_due_date: bool,
    pub after_due_days: BTreeSet<u32>,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            before_due_days: 3,
            on_due_date: true,
            after_due_days: [1, 7, 14, 30].into_iter().collect(),
        }
    }
}

impl ReminderSettings {
    pub fn validate(&self) -> Result<()> {
        if self.before_due_days > MAX_OFFSET_DAYS {
            return Err(AppError::validation(format!(
                "before_due_days cannot exceed {}",
                MAX_OFFSET_DAYS
            )));
        }

        if self.after_due_days.len() > MAX_AFTER_DUE_OFFSETS {
            return Err(AppError::validation(format!(
                "At most {} after-due reminder offsets are allowed",
                MAX_AFTER_DUE_OFFSETS
            )));
        }

        if let Some(max) = self.after_due_days.iter().next_back() {
            if *max > MAX_OFFSET_DAYS {
                return Err(AppError::validation(format!(
                    "after_due_days offsets cannot exceed {}",
                    MAX_OFFSET_DAYS
                )));
            }
        }

        Ok(())
    }
}
