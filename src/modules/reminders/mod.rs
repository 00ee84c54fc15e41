// Reminders module

pub mod controllers;
pub mod models;
pub mod services;

pub use models::{Reminder, ReminderCandidate, ReminderSettings, ReminderType};
pub use services::{ReminderNotifier, ReminderScheduler, ReminderSweeper, SweepReport};
