use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::core::AppError;
use crate::modules::invoices::services::InvoiceService;
use crate::modules::reminders::models::ReminderType;
use crate::modules::reminders::services::ReminderSweeper;

#[derive(Debug, Deserialize)]
pub struct DueRemindersQuery {
    /// Evaluate at this instant instead of now
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct RecordReminderRequest {
    pub reminder_type: ReminderType,
    #[serde(default)]
    pub offset_days: Option<u32>,
    #[serde(default)]
    pub sent_by: Option<String>,
}

/// Identity recorded for reminders sent through the API without `sent_by`
#[derive(Debug, Clone)]
pub struct DefaultSentBy(pub String);

/// GET /invoices/{id}/reminders/due
pub async fn due_reminders(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
    query: web::Query<DueRemindersQuery>,
) -> Result<HttpResponse, AppError> {
    let now = query.at.unwrap_or_else(|| service.now());
    let candidates = service
        .compute_due_reminders(&path.into_inner(), now)
        .await?;
    Ok(HttpResponse::Ok().json(candidates))
}

/// POST /invoices/{id}/reminders
pub async fn record_reminder(
    service: web::Data<Arc<InvoiceService>>,
    default_sent_by: web::Data<DefaultSentBy>,
    path: web::Path<String>,
    request: web::Json<RecordReminderRequest>,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    let sent_by = request
        .sent_by
        .unwrap_or_else(|| default_sent_by.0.clone());

    let receipt = service
        .record_reminder_sent(
            &path.into_inner(),
            request.reminder_type,
            request.offset_days,
            &sent_by,
        )
        .await?;
    Ok(HttpResponse::Ok().json(receipt.invoice))
}

/// POST /reminders/sweep
pub async fn run_sweep(
    sweeper: web::Data<Arc<ReminderSweeper>>,
    service: web::Data<Arc<InvoiceService>>,
) -> Result<HttpResponse, AppError> {
    let report = sweeper.run_once(service.now()).await?;
    Ok(HttpResponse::Ok().json(report))
}

/// Configure reminder routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/invoices/{id}/reminders/due", web::get().to(due_reminders))
        .route("/invoices/{id}/reminders", web::post().to(record_reminder))
        .route("/reminders/sweep", web::post().to(run_sweep));
}
