use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer};
use anyhow::Context;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use invoice_ledger::config::{Config, DatabaseConfig, LogFormat};
use invoice_ledger::core::SystemClock;
use invoice_ledger::middleware::RequestId;
use invoice_ledger::modules::invoices::repositories::{
    InMemoryInvoiceRepository, InvoiceRepository, MySqlInvoiceRepository,
};
use invoice_ledger::modules::reminders::services::{
    LogNotifier, ReminderNotifier, WebhookNotifier,
};
use invoice_ledger::AppState;

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("invoice_ledger={},actix_web=info", config.app.log_level).into()
    });

    match config.app.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(&config);
    config.validate().context("Configuration validation failed")?;

    tracing::info!("Starting invoice ledger");
    tracing::info!("Environment: {}", config.app.env);
    tracing::info!("Server binding to: {}", config.server.bind_address());

    let repository: Arc<dyn InvoiceRepository> = match &config.database {
        Some(database) => {
            let pool = database
                .create_pool()
                .await
                .context("Failed to create database pool")?;
            DatabaseConfig::run_migrations(&pool).await?;

            tracing::info!(
                "Database pool initialized ({} connections)",
                database.max_connections
            );
            Arc::new(MySqlInvoiceRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, invoices are kept in memory only");
            Arc::new(InMemoryInvoiceRepository::new())
        }
    };

    let notifier: Arc<dyn ReminderNotifier> = match &config.reminders.webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "Reminders are delivered by webhook");
            Arc::new(WebhookNotifier::new(
                url.clone(),
                config.reminders.webhook_secret.clone(),
                Duration::from_secs(config.reminders.webhook_timeout_secs),
            )?)
        }
        None => Arc::new(LogNotifier::new()),
    };

    let state = AppState::new(
        repository,
        Arc::new(SystemClock),
        config.ledger.invoice_defaults(&config.reminders),
        config.ledger.max_conflict_retries,
        notifier,
        config.reminders.sent_by.clone(),
    );

    if config.reminders.sweep_interval_secs > 0 {
        tokio::spawn(
            state
                .sweeper
                .clone()
                .start(Duration::from_secs(config.reminders.sweep_interval_secs)),
        );
    } else {
        tracing::info!("Reminder sweep loop disabled; use POST /reminders/sweep");
    }

    let bind_address = config.server.bind_address();
    let server = HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(TracingLogger::default())
            .wrap(RequestId)
            .configure(move |cfg| state.configure(cfg))
    })
    .workers(config.server.workers)
    .bind(&bind_address)?
    .run();

    tracing::info!("Server started at http://{}", bind_address);

    server.await?;
    Ok(())
}
