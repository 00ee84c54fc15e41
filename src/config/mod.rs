use crate::core::{AppError, Currency, Result};
use crate::modules::invoices::models::InvoiceDefaults;
use crate::modules::reminders::models::ReminderSettings;
use std::collections::BTreeSet;
use std::env;
use std::str::FromStr;

pub mod database;
pub mod server;

pub use database::DatabaseConfig;
pub use server::ServerConfig;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    /// `None` when DATABASE_URL is unset; the in-memory repository is used then
    pub database: Option<DatabaseConfig>,
    pub server: ServerConfig,
    pub ledger: LedgerConfig,
    pub reminders: ReminderConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub default_currency: Currency,
    pub default_due_days: u32,
    pub max_conflict_retries: u32,
}

#[derive(Debug, Clone)]
pub struct ReminderConfig {
    /// 0 disables the background sweep loop
    pub sweep_interval_secs: u64,
    pub sent_by: String,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub webhook_timeout_secs: u64,
    pub default_settings: ReminderSettings,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_currency: Currency::USD,
            default_due_days: 30,
            max_conflict_retries: 3,
        }
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 3600,
            sent_by: "system".to_string(),
            webhook_url: None,
            webhook_secret: None,
            webhook_timeout_secs: 10,
            default_settings: ReminderSettings::default(),
        }
    }
}

impl LedgerConfig {
    pub fn invoice_defaults(&self, reminders: &ReminderConfig) -> InvoiceDefaults {
        InvoiceDefaults {
            currency: self.default_currency,
            due_days: self.default_due_days,
            reminder_settings: reminders.default_settings.clone(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, default: &str) -> Result<T> {
    env_or(key, default)
        .trim()
        .parse()
        .map_err(|_| AppError::Configuration(format!("Invalid {}", key)))
}

/// Parse a comma-separated list of day offsets, e.g. "1,7,14,30"
pub fn parse_offsets(raw: &str) -> Result<BTreeSet<u32>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>().map_err(|_| {
                AppError::Configuration(format!("Invalid reminder offset '{}'", part))
            })
        })
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let log_format = match env_or("LOG_FORMAT", "pretty").to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" | "text" => LogFormat::Pretty,
            other => {
                return Err(AppError::Configuration(format!(
                    "Invalid LOG_FORMAT '{}'",
                    other
                )))
            }
        };

        let default_currency = Currency::from_str(&env_or("LEDGER_DEFAULT_CURRENCY", "USD"))
            .map_err(AppError::Configuration)?;

        let config = Config {
            app: AppConfig {
                env: env_or("APP_ENV", "development"),
                log_level: env_or("LOG_LEVEL", "info"),
                log_format,
            },
            database: DatabaseConfig::from_env()?,
            server: ServerConfig::from_env()?,
            ledger: LedgerConfig {
                default_currency,
                default_due_days: parse_env("LEDGER_DEFAULT_DUE_DAYS", "30")?,
                max_conflict_retries: parse_env("LEDGER_MAX_CONFLICT_RETRIES", "3")?,
            },
            reminders: ReminderConfig {
                sweep_interval_secs: parse_env("REMINDER_SWEEP_INTERVAL_SECS", "3600")?,
                sent_by: env_or("REMINDER_SENT_BY", "system"),
                webhook_url: optional_env("REMINDER_WEBHOOK_URL"),
                webhook_secret: optional_env("REMINDER_WEBHOOK_SECRET"),
                webhook_timeout_secs: parse_env("REMINDER_WEBHOOK_TIMEOUT_SECS", "10")?,
                default_settings: ReminderSettings {
                    before_due_days: parse_env("REMINDER_BEFORE_DUE_DAYS", "3")?,
                    on_due_date: parse_env("REMINDER_ON_DUE_DATE", "true")?,
                    after_due_days: parse_offsets(&env_or("REMINDER_AFTER_DUE_DAYS", "1,7,14,30"))?,
                },
            },
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.ledger.max_conflict_retries == 0 {
            return Err(AppError::Configuration(
                "LEDGER_MAX_CONFLICT_RETRIES must be greater than 0".to_string(),
            ));
        }

        if self.reminders.sent_by.trim().is_empty() {
            return Err(AppError::Configuration(
                "REMINDER_SENT_BY cannot be empty".to_string(),
            ));
        }

        if self.reminders.webhook_secret.is_some() && self.reminders.webhook_url.is_none() {
            return Err(AppError::Configuration(
                "REMINDER_WEBHOOK_SECRET is set but REMINDER_WEBHOOK_URL is not".to_string(),
            ));
        }

        if self.reminders.webhook_timeout_secs == 0 {
            return Err(AppError::Configuration(
                "REMINDER_WEBHOOK_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        self.reminders
            .default_settings
            .validate()
            .map_err(|e| AppError::Configuration(format!("Default reminder settings: {}", e)))?;

        Ok(())
    }
}
