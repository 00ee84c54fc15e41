pub mod notifier;
pub mod reminder_scheduler;
pub mod reminder_sweeper;

pub use notifier::{LogNotifier, ReminderNotifier, WebhookNotifier};
pub use reminder_scheduler::{ReminderScheduler, ScheduleInputs};
pub use reminder_sweeper::{ReminderSweeper, SweepReport};
