pub mod health;
pub mod invoices;
pub mod payments;
pub mod reminders;

use std::sync::Arc;

use actix_web::web;

use crate::core::Clock;
use crate::modules::invoices::models::InvoiceDefaults;
use crate::modules::invoices::repositories::InvoiceRepository;
use crate::modules::invoices::services::InvoiceService;
use crate::modules::reminders::controllers::DefaultSentBy;
use crate::modules::reminders::services::{ReminderNotifier, ReminderSweeper};

/// Shared handles the HTTP layer needs
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn InvoiceRepository>,
    pub invoice_service: Arc<InvoiceService>,
    pub sweeper: Arc<ReminderSweeper>,
    pub sent_by: String,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn InvoiceRepository>,
        clock: Arc<dyn Clock>,
        defaults: InvoiceDefaults,
        max_conflict_retries: u32,
        notifier: Arc<dyn ReminderNotifier>,
        sent_by: impl Into<String>,
    ) -> Self {
        let sent_by = sent_by.into();
        let invoice_service = Arc::new(InvoiceService::new(
            repository.clone(),
            clock,
            defaults,
            max_conflict_retries,
        ));
        let sweeper = Arc::new(ReminderSweeper::new(
            invoice_service.clone(),
            notifier,
            sent_by.clone(),
        ));

        Self {
            repository,
            invoice_service,
            sweeper,
            sent_by,
        }
    }

    /// Register app data, extractor error handlers and every route
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.repository.clone()))
            .app_data(web::Data::new(self.invoice_service.clone()))
            .app_data(web::Data::new(self.sweeper.clone()))
            .app_data(web::Data::new(DefaultSentBy(self.sent_by.clone())));

        crate::middleware::error_handler::configure(cfg);
        health::controllers::configure(cfg);
        invoices::controllers::configure(cfg);
        payments::controllers::configure(cfg);
        reminders::controllers::configure(cfg);
    }
}
