use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::core::AppError;
use crate::modules::invoices::models::Invoice;
use crate::modules::invoices::services::InvoiceService;
use crate::modules::payments::models::{NewPayment, Payment};
use crate::modules::payments::services::PaymentOutcome;

#[derive(Debug, Serialize)]
pub struct RecordPaymentResponse {
    pub invoice: Invoice,
    /// The appended payment; absent for a duplicate reference
    pub payment: Option<Payment>,
    pub duplicate: bool,
    pub existing_payment_id: Option<String>,
}

/// POST /invoices/{id}/payments
///
/// 201 when the payment was appended, 200 when the reference had already
/// been recorded.
pub async fn record_payment(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
    request: web::Json<NewPayment>,
) -> Result<HttpResponse, AppError> {
    let receipt = service
        .record_payment(&path.into_inner(), request.into_inner())
        .await?;

    let response = match receipt.outcome {
        PaymentOutcome::Recorded(payment) => RecordPaymentResponse {
            invoice: receipt.invoice,
            payment: Some(payment),
            duplicate: false,
            existing_payment_id: None,
        },
        PaymentOutcome::Duplicate {
            existing_payment_id,
        } => RecordPaymentResponse {
            invoice: receipt.invoice,
            payment: None,
            duplicate: true,
            existing_payment_id: Some(existing_payment_id),
        },
    };

    if response.duplicate {
        Ok(HttpResponse::Ok().json(response))
    } else {
        Ok(HttpResponse::Created().json(response))
    }
}

/// GET /invoices/{id}/payments/summary
pub async fn payment_summary(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let summary = service.payment_summary(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Configure payment routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/invoices/{id}/payments", web::post().to(record_payment))
        .route(
            "/invoices/{id}/payments/summary",
            web::get().to(payment_summary),
        );
}
