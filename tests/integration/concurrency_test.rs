// Concurrent mutations against one invoice
//
// Versioned writes plus the service retry loop must never lose an update.

#[path = "../helpers/mod.rs"]
mod helpers;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use helpers::*;
use invoice_ledger::core::{AppError, FixedClock, Result};
use invoice_ledger::invoices::models::{Invoice, InvoiceDefaults};
use invoice_ledger::invoices::repositories::{InMemoryInvoiceRepository, InvoiceRepository};
use invoice_ledger::invoices::services::InvoiceService;
use invoice_ledger::invoices::InvoiceStatus;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Rejects the first `failures` updates with a version conflict
struct FlakyRepository {
    inner: InMemoryInvoiceRepository,
    failures: AtomicUsize,
    attempts: AtomicUsize,
}

impl FlakyRepository {
    fn new(failures: usize) -> Self {
        Self {
            inner: InMemoryInvoiceRepository::new(),
            failures: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl InvoiceRepository for FlakyRepository {
    async fn insert(&self, invoice: &Invoice) -> Result<Invoice> {
        self.inner.insert(invoice).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Invoice>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_number(&self, invoice_number: &str) -> Result<Option<Invoice>> {
        self.inner.find_by_number(invoice_number).await
    }

    async fn update(&self, invoice: &Invoice, expected_version: i64) -> Result<Invoice> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::conflict("simulated concurrent write"));
        }
        self.inner.update(invoice, expected_version).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.inner.delete(id).await
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Invoice>> {
        self.inner.list(limit, offset).await
    }

    async fn list_open(&self) -> Result<Vec<Invoice>> {
        self.inner.list_open().await
    }
}

fn flaky_service(failures: usize, retries: u32) -> (InvoiceService, Arc<FlakyRepository>) {
    let repo = Arc::new(FlakyRepository::new(failures));
    let service = InvoiceService::new(
        repo.clone(),
        Arc::new(FixedClock::new(TestDataFactory::epoch())),
        InvoiceDefaults::default(),
        retries,
    );
    (service, repo)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_payments_are_all_applied() {
    let app = TestApp::new();
    let invoice = app
        .service()
        .create_invoice(TestDataFactory::simple_request(dec!(1000)))
        .await
        .unwrap();
    app.service().mark_sent(&invoice.id).await.unwrap();

    // Generous retry budget: every writer may lose several races
    let service = Arc::new(InvoiceService::new(
        app.repository.clone(),
        app.clock.clone(),
        InvoiceDefaults::default(),
        50,
    ));

    let mut handles = Vec::new();
    for idx in 0..10 {
        let service = service.clone();
        let id = invoice.id.clone();
        handles.push(tokio::spawn(async move {
            service
                .record_payment(
                    &id,
                    TestDataFactory::payment_with_reference(dec!(100), &format!("txn-{}", idx)),
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = app.stored(&invoice.id).await;
    assert_eq!(stored.payments.len(), 10);
    assert_eq!(stored.amount_paid, dec!(1000));
    assert_eq!(stored.amount_due, Decimal::ZERO);
    assert_eq!(stored.status, InvoiceStatus::Paid);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_replays_of_one_reference_apply_once() {
    let app = TestApp::new();
    let invoice = app
        .service()
        .create_invoice(TestDataFactory::simple_request(dec!(500)))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = app.service().clone();
        let id = invoice.id.clone();
        handles.push(tokio::spawn(async move {
            service
                .record_payment(
                    &id,
                    TestDataFactory::payment_with_reference(dec!(200), "webhook-42"),
                )
                .await
        }));
    }

    let mut recorded = 0;
    for handle in handles {
        // A writer may exhaust its retries; it must never double-apply
        if let Ok(receipt) = handle.await.unwrap() {
            if !receipt.outcome.is_duplicate() {
                recorded += 1;
            }
        }
    }

    let stored = app.stored(&invoice.id).await;
    assert_eq!(recorded, 1);
    assert_eq!(stored.payments.len(), 1);
    assert_eq!(stored.amount_paid, dec!(200));
}

#[tokio::test]
async fn test_conflict_is_retried_against_fresh_state() {
    let (service, repo) = flaky_service(2, 3);
    let invoice = service
        .create_invoice(TestDataFactory::simple_request(dec!(100)))
        .await
        .unwrap();

    let receipt = service
        .record_payment(&invoice.id, TestDataFactory::payment(dec!(40)))
        .await
        .unwrap();

    assert_eq!(repo.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(receipt.invoice.amount_paid, dec!(40));
    assert_eq!(receipt.invoice.payments.len(), 1);
    assert_eq!(receipt.invoice.version, invoice.version + 1);
}

#[tokio::test]
async fn test_conflict_surfaces_after_retry_budget() {
    let (service, repo) = flaky_service(10, 2);
    let invoice = service
        .create_invoice(TestDataFactory::simple_request(dec!(100)))
        .await
        .unwrap();

    let err = service.mark_sent(&invoice.id).await.unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(repo.attempts.load(Ordering::SeqCst), 3);

    let stored = repo.find_by_id(&invoice.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InvoiceStatus::Draft);
    assert_eq!(stored.version, invoice.version);
}

#[tokio::test]
async fn test_stale_version_is_rejected_by_repository() {
    let app = TestApp::new();
    let invoice = app
        .service()
        .create_invoice(TestDataFactory::simple_request(dec!(100)))
        .await
        .unwrap();
    app.service().mark_sent(&invoice.id).await.unwrap();

    let err = app.repository.update(&invoice, invoice.version).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}
