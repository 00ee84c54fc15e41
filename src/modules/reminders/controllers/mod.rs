pub mod reminder_controller;

pub use reminder_controller::{configure, DefaultSentBy};
