// Invoice lifecycle through InvoiceService
//
// create → edit → send → view → overdue → cancel, plus the edit lock once
// money or client views arrive.

#[path = "../helpers/mod.rs"]
mod helpers;

use chrono::Duration;
use helpers::*;
use invoice_ledger::core::AppError;
use invoice_ledger::invoices::models::LifecycleStage;
use invoice_ledger::invoices::InvoiceStatus;
use invoice_ledger::reminders::ReminderSettings;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_scenario_a_create_computes_totals() {
    let app = TestApp::new();
    let invoice = app
        .service()
        .create_invoice(TestDataFactory::scenario_a_request())
        .await
        .unwrap();

    assert_eq!(invoice.subtotal, dec!(700));
    assert_eq!(invoice.tax_amount, dec!(59.50));
    assert_eq!(invoice.total_amount, dec!(749.50));
    assert_eq!(invoice.amount_paid, dec!(0));
    assert_eq!(invoice.amount_due, dec!(749.50));
    assert_eq!(invoice.status, InvoiceStatus::Draft);
    assert_eq!(invoice.version, 1);
    assert_eq!(invoice.due_date, app.now() + Duration::days(30));
}

#[tokio::test]
async fn test_generated_invoice_number_format() {
    let app = TestApp::new();
    let mut request = TestDataFactory::simple_request(dec!(100));
    request.invoice_number = None;
    let invoice = app.service().create_invoice(request).await.unwrap();

    assert!(invoice.invoice_number.starts_with("INV-202503-"));
    assert_eq!(invoice.invoice_number.len(), "INV-202503-".len() + 8);
}

#[tokio::test]
async fn test_duplicate_invoice_number_rejected() {
    let app = TestApp::new();
    let request = TestDataFactory::simple_request(dec!(100));
    app.service().create_invoice(request.clone()).await.unwrap();

    let err = app.service().create_invoice(request).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_create_validation_errors() {
    let app = TestApp::new();

    let mut no_items = TestDataFactory::simple_request(dec!(100));
    no_items.line_items.clear();
    assert!(matches!(
        app.service().create_invoice(no_items).await,
        Err(AppError::Validation(_))
    ));

    let mut bad_tax = TestDataFactory::simple_request(dec!(100));
    bad_tax.tax_rate = Some(dec!(101));
    assert!(app.service().create_invoice(bad_tax).await.is_err());

    let mut bad_email = TestDataFactory::simple_request(dec!(100));
    bad_email.client.email = "not-an-email".to_string();
    assert!(app.service().create_invoice(bad_email).await.is_err());

    let mut backwards = TestDataFactory::simple_request(dec!(100));
    backwards.due_date = Some(app.now() - Duration::days(1));
    assert!(app.service().create_invoice(backwards).await.is_err());

    let mut negative_qty = TestDataFactory::simple_request(dec!(100));
    negative_qty.line_items[0].quantity = dec!(-1);
    assert!(app.service().create_invoice(negative_qty).await.is_err());
}

#[tokio::test]
async fn test_oversized_amounts_are_rejected_without_panicking() {
    let app = TestApp::new();

    let mut huge_quantity = TestDataFactory::simple_request(dec!(2));
    huge_quantity.line_items[0].quantity = Decimal::MAX;
    let err = app.service().create_invoice(huge_quantity).await.unwrap_err();
    assert!(err.to_string().contains("Quantity cannot exceed"));

    let mut huge_discount = TestDataFactory::simple_request(dec!(100));
    huge_discount.discount = Some(Decimal::MAX);
    assert!(matches!(
        app.service().create_invoice(huge_discount).await,
        Err(AppError::Validation(_))
    ));

    let invoice = app
        .service()
        .create_invoice(TestDataFactory::simple_request(dec!(999999999999)))
        .await
        .unwrap();
    let err = app
        .service()
        .add_line_item(&invoice.id, TestDataFactory::item("Extra", dec!(1), dec!(1)))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("subtotal cannot exceed"));

    let stored = app.stored(&invoice.id).await;
    assert_eq!(stored.line_items.len(), 1);
    assert_eq!(stored.version, invoice.version);
}

#[tokio::test]
async fn test_edits_recompute_totals_and_bump_version() {
    let app = TestApp::new();
    let invoice = app
        .service()
        .create_invoice(TestDataFactory::scenario_a_request())
        .await
        .unwrap();

    let updated = app
        .service()
        .update_line_items(
            &invoice.id,
            vec![TestDataFactory::item("Retainer", dec!(2), dec!(150))],
        )
        .await
        .unwrap();
    assert_eq!(updated.subtotal, dec!(300));
    assert_eq!(updated.tax_amount, dec!(25.50));
    assert_eq!(updated.total_amount, dec!(315.50));
    assert_eq!(updated.version, invoice.version + 1);

    let repriced = app
        .service()
        .update_pricing(&invoice.id, dec!(0), dec!(0))
        .await
        .unwrap();
    assert_eq!(repriced.total_amount, dec!(300));
    assert_eq!(repriced.amount_due, dec!(300));
}

#[tokio::test]
async fn test_discount_larger_than_total_is_clamped() {
    let app = TestApp::new();
    let invoice = app
        .service()
        .create_invoice(TestDataFactory::simple_request(dec!(50)))
        .await
        .unwrap();

    let updated = app
        .service()
        .update_pricing(&invoice.id, dec!(10), dec!(80))
        .await
        .unwrap();
    assert_eq!(updated.total_amount, dec!(0));
    assert_eq!(updated.warnings.len(), 1);
}

#[tokio::test]
async fn test_send_view_and_overdue() {
    let app = TestApp::new();
    let invoice = app
        .service()
        .create_invoice(TestDataFactory::simple_request(dec!(100)))
        .await
        .unwrap();

    let err = app.service().mark_viewed(&invoice.id).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let sent = app.service().mark_sent(&invoice.id).await.unwrap();
    assert_eq!(sent.status, InvoiceStatus::Sent);
    assert_eq!(sent.sent_at, Some(app.now()));

    let viewed = app.service().mark_viewed(&invoice.id).await.unwrap();
    assert_eq!(viewed.status, InvoiceStatus::Viewed);
    assert_eq!(viewed.stage, LifecycleStage::Viewed);

    // Sending again never moves the stage back
    let resent = app.service().mark_sent(&invoice.id).await.unwrap();
    assert_eq!(resent.status, InvoiceStatus::Viewed);
    assert_eq!(resent.version, viewed.version);

    // Viewed invoices are locked for editing
    let err = app
        .service()
        .update_pricing(&invoice.id, dec!(5), dec!(0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    app.clock.set(invoice.due_date + Duration::days(10));
    let read = app.service().get_invoice(&invoice.id).await.unwrap();
    assert_eq!(read.status, InvoiceStatus::Overdue);
    // Reads do not write
    assert_eq!(app.stored(&invoice.id).await.status, InvoiceStatus::Viewed);

    let refreshed = app.service().refresh_status(&invoice.id).await.unwrap();
    assert_eq!(refreshed.status, InvoiceStatus::Overdue);
    assert_eq!(app.stored(&invoice.id).await.status, InvoiceStatus::Overdue);
}

#[tokio::test]
async fn test_draft_never_becomes_overdue() {
    let app = TestApp::new();
    let invoice = app
        .service()
        .create_invoice(TestDataFactory::simple_request(dec!(100)))
        .await
        .unwrap();

    app.clock.set(invoice.due_date + Duration::days(45));
    let read = app.service().get_invoice(&invoice.id).await.unwrap();
    assert_eq!(read.status, InvoiceStatus::Draft);
}

#[tokio::test]
async fn test_cancel_is_terminal() {
    let app = TestApp::new();
    let invoice = app
        .service()
        .create_invoice(TestDataFactory::simple_request(dec!(100)))
        .await
        .unwrap();
    app.service().mark_sent(&invoice.id).await.unwrap();

    let cancelled = app.service().cancel(&invoice.id).await.unwrap();
    assert_eq!(cancelled.status, InvoiceStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());

    // Cancelling twice is a no-op
    let again = app.service().cancel(&invoice.id).await.unwrap();
    assert_eq!(again.version, cancelled.version);

    assert!(app.service().mark_sent(&invoice.id).await.is_err());
    assert!(app
        .service()
        .update_reminder_settings(&invoice.id, ReminderSettings::default())
        .await
        .is_err());

    app.clock.set(invoice.due_date + Duration::days(40));
    let read = app.service().get_invoice(&invoice.id).await.unwrap();
    assert_eq!(read.status, InvoiceStatus::Cancelled);
}

#[tokio::test]
async fn test_list_and_delete() {
    let app = TestApp::new();
    let first = app
        .service()
        .create_invoice(TestDataFactory::simple_request(dec!(10)))
        .await
        .unwrap();
    app.clock.advance(Duration::minutes(1));
    let second = app
        .service()
        .create_invoice(TestDataFactory::simple_request(dec!(20)))
        .await
        .unwrap();

    let listed = app.service().list_invoices(10, 0).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.id);

    app.service().delete_invoice(&first.id).await.unwrap();
    assert!(matches!(
        app.service().get_invoice(&first.id).await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(app.service().list_invoices(10, 0).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_single_line_item_edits() {
    let app = TestApp::new();
    let invoice = app
        .service()
        .create_invoice(TestDataFactory::scenario_a_request())
        .await
        .unwrap();

    let added = app
        .service()
        .add_line_item(&invoice.id, TestDataFactory::item("Domain", dec!(1), dec!(20)))
        .await
        .unwrap();
    assert_eq!(added.line_items.len(), 3);
    assert_eq!(added.subtotal, dec!(720));

    let patched = app
        .service()
        .update_line_item(
            &invoice.id,
            0,
            invoice_ledger::invoices::models::LineItemPatch {
                quantity: Some(dec!(12)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(patched.line_items.items()[0].amount, dec!(600));
    assert_eq!(patched.subtotal, dec!(820));

    // A rejected patch leaves the item untouched
    assert!(app
        .service()
        .update_line_item(
            &invoice.id,
            0,
            invoice_ledger::invoices::models::LineItemPatch {
                rate: Some(dec!(-1)),
                ..Default::default()
            },
        )
        .await
        .is_err());
    assert_eq!(app.stored(&invoice.id).await.subtotal, dec!(820));

    let removed = app.service().remove_line_item(&invoice.id, 2).await.unwrap();
    assert_eq!(removed.subtotal, dec!(800));
    assert!(app.service().remove_line_item(&invoice.id, 9).await.is_err());
}
