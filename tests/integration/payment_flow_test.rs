// Payment recording through InvoiceService
//
// Partial → full payment, idempotent references, overpayment and the
// cancelled-invoice guard.

#[path = "../helpers/mod.rs"]
mod helpers;

use chrono::Duration;
use helpers::*;
use invoice_ledger::core::AppError;
use invoice_ledger::invoices::InvoiceStatus;
use invoice_ledger::payments::PaymentOutcome;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_scenarios_b_and_c_partial_then_full_payment() {
    let app = TestApp::new();
    let invoice = app
        .service()
        .create_invoice(TestDataFactory::scenario_a_request())
        .await
        .unwrap();
    app.service().mark_sent(&invoice.id).await.unwrap();

    let receipt = app
        .service()
        .record_payment(&invoice.id, TestDataFactory::payment(dec!(400)))
        .await
        .unwrap();
    assert!(matches!(receipt.outcome, PaymentOutcome::Recorded(_)));
    assert_eq!(receipt.invoice.amount_paid, dec!(400));
    assert_eq!(receipt.invoice.amount_due, dec!(349.50));
    assert_eq!(receipt.invoice.status, InvoiceStatus::PartiallyPaid);
    assert!(receipt.invoice.paid_at.is_none());

    app.clock.advance(Duration::days(2));
    let receipt = app
        .service()
        .record_payment(&invoice.id, TestDataFactory::payment(dec!(349.50)))
        .await
        .unwrap();
    assert_eq!(receipt.invoice.amount_due, dec!(0));
    assert_eq!(receipt.invoice.status, InvoiceStatus::Paid);
    assert_eq!(receipt.invoice.paid_at, Some(app.now()));

    let summary = app.service().payment_summary(&invoice.id).await.unwrap();
    assert_eq!(summary.payment_count, 2);
    assert!(summary.is_fully_paid);
    assert_eq!(summary.amount_paid, dec!(749.50));
}

#[tokio::test]
async fn test_paid_invoice_is_not_overdue_and_keeps_paid_at() {
    let app = TestApp::new();
    let invoice = app
        .service()
        .create_invoice(TestDataFactory::simple_request(dec!(100)))
        .await
        .unwrap();
    app.service().mark_sent(&invoice.id).await.unwrap();
    let paid = app
        .service()
        .record_payment(&invoice.id, TestDataFactory::payment(dec!(100)))
        .await
        .unwrap()
        .invoice;
    let paid_at = paid.paid_at;

    app.clock.set(invoice.due_date + Duration::days(60));
    let read = app.service().get_invoice(&invoice.id).await.unwrap();
    assert_eq!(read.status, InvoiceStatus::Paid);
    assert_eq!(read.paid_at, paid_at);

    // Paid invoices cannot be cancelled
    assert!(matches!(
        app.service().cancel(&invoice.id).await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn test_replayed_reference_is_acknowledged_once() {
    let app = TestApp::new();
    let invoice = app
        .service()
        .create_invoice(TestDataFactory::simple_request(dec!(300)))
        .await
        .unwrap();

    let first = app
        .service()
        .record_payment(
            &invoice.id,
            TestDataFactory::payment_with_reference(dec!(100), "gw-txn-1"),
        )
        .await
        .unwrap();
    let PaymentOutcome::Recorded(payment) = &first.outcome else {
        panic!("first delivery must be recorded");
    };

    let replay = app
        .service()
        .record_payment(
            &invoice.id,
            TestDataFactory::payment_with_reference(dec!(100), "gw-txn-1"),
        )
        .await
        .unwrap();
    match &replay.outcome {
        PaymentOutcome::Duplicate {
            existing_payment_id,
        } => assert_eq!(existing_payment_id, &payment.id),
        other => panic!("expected duplicate, got {:?}", other),
    }
    assert_eq!(replay.invoice.amount_paid, dec!(100));
    assert_eq!(replay.invoice.version, first.invoice.version);
}

#[tokio::test]
async fn test_overpayment_goes_negative() {
    let app = TestApp::new();
    let invoice = app
        .service()
        .create_invoice(TestDataFactory::simple_request(dec!(100)))
        .await
        .unwrap();

    let receipt = app
        .service()
        .record_payment(&invoice.id, TestDataFactory::payment(dec!(120)))
        .await
        .unwrap();
    assert_eq!(receipt.invoice.status, InvoiceStatus::Paid);
    assert_eq!(receipt.invoice.amount_due, dec!(-20));
}

#[tokio::test]
async fn test_payment_locks_line_items() {
    let app = TestApp::new();
    let invoice = app
        .service()
        .create_invoice(TestDataFactory::simple_request(dec!(100)))
        .await
        .unwrap();
    app.service()
        .record_payment(&invoice.id, TestDataFactory::payment(dec!(10)))
        .await
        .unwrap();

    let err = app
        .service()
        .update_line_items(
            &invoice.id,
            vec![TestDataFactory::item("Changed", dec!(1), dec!(5))],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_scenario_e_cancel_partially_paid_rejects_payments() {
    let app = TestApp::new();
    let invoice = app
        .service()
        .create_invoice(TestDataFactory::scenario_a_request())
        .await
        .unwrap();
    app.service().mark_sent(&invoice.id).await.unwrap();
    app.service()
        .record_payment(&invoice.id, TestDataFactory::payment(dec!(400)))
        .await
        .unwrap();

    let cancelled = app.service().cancel(&invoice.id).await.unwrap();
    assert_eq!(cancelled.status, InvoiceStatus::Cancelled);
    assert_eq!(cancelled.amount_paid, dec!(400));

    let err = app
        .service()
        .record_payment(&invoice.id, TestDataFactory::payment(dec!(349.50)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(app.stored(&invoice.id).await.payments.len(), 1);
}

#[tokio::test]
async fn test_replayed_reference_after_cancel_is_acknowledged() {
    let app = TestApp::new();
    let invoice = app
        .service()
        .create_invoice(TestDataFactory::scenario_a_request())
        .await
        .unwrap();
    app.service().mark_sent(&invoice.id).await.unwrap();
    let first = app
        .service()
        .record_payment(
            &invoice.id,
            TestDataFactory::payment_with_reference(dec!(400), "txn-cancelled"),
        )
        .await
        .unwrap();
    let payment_id = match first.outcome {
        PaymentOutcome::Recorded(payment) => payment.id,
        other => panic!("expected a new payment, got {:?}", other),
    };

    app.service().cancel(&invoice.id).await.unwrap();
    let version = app.stored(&invoice.id).await.version;

    let replay = app
        .service()
        .record_payment(
            &invoice.id,
            TestDataFactory::payment_with_reference(dec!(400), "txn-cancelled"),
        )
        .await
        .unwrap();
    assert_eq!(
        replay.outcome,
        PaymentOutcome::Duplicate {
            existing_payment_id: payment_id
        }
    );
    assert_eq!(replay.invoice.status, InvoiceStatus::Cancelled);

    let stored = app.stored(&invoice.id).await;
    assert_eq!(stored.version, version);
    assert_eq!(stored.payments.len(), 1);

    // A new reference is still refused
    let err = app
        .service()
        .record_payment(
            &invoice.id,
            TestDataFactory::payment_with_reference(dec!(10), "txn-late"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_invalid_payment_amounts() {
    let app = TestApp::new();
    let invoice = app
        .service()
        .create_invoice(TestDataFactory::simple_request(dec!(100)))
        .await
        .unwrap();

    for amount in [dec!(0), dec!(-1), dec!(0.001)] {
        let err = app
            .service()
            .record_payment(&invoice.id, TestDataFactory::payment(amount))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
    assert!(app.stored(&invoice.id).await.payments.is_empty());
}

#[tokio::test]
async fn test_oversized_payments_are_rejected() {
    let app = TestApp::new();
    let invoice = app
        .service()
        .create_invoice(TestDataFactory::simple_request(dec!(100)))
        .await
        .unwrap();

    // Each far beyond anything a ledger column can hold
    for _ in 0..2 {
        let err = app
            .service()
            .record_payment(&invoice.id, TestDataFactory::payment(dec!(39600000000000000000000000000)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    // Each in range, together over the limit
    app.service()
        .record_payment(&invoice.id, TestDataFactory::payment(dec!(600000000000)))
        .await
        .unwrap();
    let err = app
        .service()
        .record_payment(&invoice.id, TestDataFactory::payment(dec!(600000000000)))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Total payments cannot exceed"));

    let stored = app.stored(&invoice.id).await;
    assert_eq!(stored.payments.len(), 1);
    assert_eq!(stored.amount_paid, dec!(600000000000));
}
