use std::sync::Arc;

use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::core::AppError;
use crate::modules::invoices::models::{CreateInvoiceRequest, LineItemInput, LineItemPatch};
use crate::modules::invoices::services::InvoiceService;
use crate::modules::reminders::models::ReminderSettings;

const MAX_PAGE_SIZE: i64 = 200;

/// Query parameters for listing invoices
#[derive(Debug, Deserialize)]
pub struct ListInvoicesQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct UpdateLineItemsRequest {
    pub line_items: Vec<LineItemInput>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePricingRequest {
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub discount: Decimal,
}

/// POST /invoices
pub async fn create_invoice(
    service: web::Data<Arc<InvoiceService>>,
    request: web::Json<CreateInvoiceRequest>,
) -> Result<HttpResponse, AppError> {
    let invoice = service.create_invoice(request.into_inner()).await?;
    Ok(HttpResponse::Created().json(invoice))
}

/// GET /invoices/{id}
pub async fn get_invoice(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let invoice = service.get_invoice(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(invoice))
}

/// GET /invoices
pub async fn list_invoices(
    service: web::Data<Arc<InvoiceService>>,
    query: web::Query<ListInvoicesQuery>,
) -> Result<HttpResponse, AppError> {
    if query.limit <= 0 || query.limit > MAX_PAGE_SIZE {
        return Err(AppError::validation(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    if query.offset < 0 {
        return Err(AppError::validation("offset cannot be negative"));
    }

    let invoices = service.list_invoices(query.limit, query.offset).await?;
    Ok(HttpResponse::Ok().json(invoices))
}

/// DELETE /invoices/{id}
pub async fn delete_invoice(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    service.delete_invoice(&path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// PUT /invoices/{id}/line-items
pub async fn update_line_items(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
    request: web::Json<UpdateLineItemsRequest>,
) -> Result<HttpResponse, AppError> {
    let invoice = service
        .update_line_items(&path.into_inner(), request.into_inner().line_items)
        .await?;
    Ok(HttpResponse::Ok().json(invoice))
}

/// POST /invoices/{id}/line-items
pub async fn add_line_item(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
    request: web::Json<LineItemInput>,
) -> Result<HttpResponse, AppError> {
    let invoice = service
        .add_line_item(&path.into_inner(), request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(invoice))
}

/// PATCH /invoices/{id}/line-items/{index}
pub async fn update_line_item(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<(String, usize)>,
    request: web::Json<LineItemPatch>,
) -> Result<HttpResponse, AppError> {
    let (id, index) = path.into_inner();
    let invoice = service
        .update_line_item(&id, index, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(invoice))
}

/// DELETE /invoices/{id}/line-items/{index}
pub async fn remove_line_item(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<(String, usize)>,
) -> Result<HttpResponse, AppError> {
    let (id, index) = path.into_inner();
    let invoice = service.remove_line_item(&id, index).await?;
    Ok(HttpResponse::Ok().json(invoice))
}

/// PUT /invoices/{id}/pricing
pub async fn update_pricing(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
    request: web::Json<UpdatePricingRequest>,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    let invoice = service
        .update_pricing(&path.into_inner(), request.tax_rate, request.discount)
        .await?;
    Ok(HttpResponse::Ok().json(invoice))
}

/// PUT /invoices/{id}/reminder-settings
pub async fn update_reminder_settings(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
    request: web::Json<ReminderSettings>,
) -> Result<HttpResponse, AppError> {
    let invoice = service
        .update_reminder_settings(&path.into_inner(), request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(invoice))
}

/// POST /invoices/{id}/send
pub async fn mark_sent(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let invoice = service.mark_sent(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(invoice))
}

/// POST /invoices/{id}/view
pub async fn mark_viewed(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let invoice = service.mark_viewed(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(invoice))
}

/// POST /invoices/{id}/cancel
pub async fn cancel_invoice(
    service: web::Data<Arc<InvoiceService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let invoice = service.cancel(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(invoice))
}

/// Configure invoice routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/invoices")
            .route(web::post().to(create_invoice))
            .route(web::get().to(list_invoices)),
    )
    .service(
        web::resource("/invoices/{id}")
            .route(web::get().to(get_invoice))
            .route(web::delete().to(delete_invoice)),
    )
    .service(
        web::resource("/invoices/{id}/line-items")
            .route(web::put().to(update_line_items))
            .route(web::post().to(add_line_item)),
    )
    .service(
        web::resource("/invoices/{id}/line-items/{index}")
            .route(web::patch().to(update_line_item))
            .route(web::delete().to(remove_line_item)),
    )
    .route("/invoices/{id}/pricing", web::put().to(update_pricing))
    .route(
        "/invoices/{id}/reminder-settings",
        web::put().to(update_reminder_settings),
    )
    .route("/invoices/{id}/send", web::post().to(mark_sent))
    .route("/invoices/{id}/view", web::post().to(mark_viewed))
    .route("/invoices/{id}/cancel", web::post().to(cancel_invoice));
}
