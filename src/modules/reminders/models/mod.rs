mod reminder;

pub use reminder::{Reminder, ReminderCandidate, ReminderSettings, ReminderType};
