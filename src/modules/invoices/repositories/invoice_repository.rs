// Persistence port for the invoice aggregate.
//
// Every stored invoice carries a `version`. Writers hand back the version
// they loaded; a mismatch means another mutation got there first and the
// write is rejected with `AppError::Conflict` instead of overwriting it.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::{AppError, Result};
use crate::modules::invoices::models::{Invoice, InvoiceStatus};

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Store a new invoice; the returned copy carries version 1
    async fn insert(&self, invoice: &Invoice) -> Result<Invoice>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Invoice>>;

    async fn find_by_number(&self, invoice_number: &str) -> Result<Option<Invoice>>;

    /// Versioned write; fails with `Conflict` when the stored version moved on
    async fn update(&self, invoice: &Invoice, expected_version: i64) -> Result<Invoice>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Newest first
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Invoice>>;

    /// Invoices that may still change through time or payments (not paid, not cancelled)
    async fn list_open(&self) -> Result<Vec<Invoice>>;

    /// Storage liveness probe
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn is_open(status: InvoiceStatus) -> bool {
    !matches!(status, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
}

/// Process-local repository, used in tests and when no database is configured
#[derive(Debug, Default)]
pub struct InMemoryInvoiceRepository {
    invoices: RwLock<HashMap<String, Invoice>>,
}

impl InMemoryInvoiceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryInvoiceRepository {
    async fn insert(&self, invoice: &Invoice) -> Result<Invoice> {
        let mut invoices = self.invoices.write().await;

        if invoices.contains_key(&invoice.id) {
            return Err(AppError::conflict(format!(
                "Invoice with id '{}' already exists",
                invoice.id
            )));
        }
        if invoices
            .values()
            .any(|existing| existing.invoice_number == invoice.invoice_number)
        {
            return Err(AppError::validation(format!(
                "Invoice with number '{}' already exists",
                invoice.invoice_number
            )));
        }

        let mut stored = invoice.clone();
        stored.version = 1;
        invoices.insert(stored.id.clone(), stored.clone());

        Ok(stored)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Invoice>> {
        Ok(self.invoices.read().await.get(id).cloned())
    }

    async fn find_by_number(&self, invoice_number: &str) -> Result<Option<Invoice>> {
        Ok(self
            .invoices
            .read()
            .await
            .values()
            .find(|invoice| invoice.invoice_number == invoice_number)
            .cloned())
    }

    async fn update(&self, invoice: &Invoice, expected_version: i64) -> Result<Invoice> {
        let mut invoices = self.invoices.write().await;

        let current = invoices
            .get(&invoice.id)
            .ok_or_else(|| AppError::not_found(format!("Invoice '{}' not found", invoice.id)))?;

        if current.version != expected_version {
            return Err(AppError::conflict(format!(
                "Invoice '{}' was modified concurrently (expected version {}, found {})",
                invoice.id, expected_version, current.version
            )));
        }

        let mut stored = invoice.clone();
        stored.version = expected_version + 1;
        invoices.insert(stored.id.clone(), stored.clone());

        Ok(stored)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.invoices
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found(format!("Invoice '{}' not found", id)))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Invoice>> {
        let invoices = self.invoices.read().await;
        let mut all: Vec<Invoice> = invoices.values().cloned().collect();
        all.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.invoice_number.cmp(&b.invoice_number))
        });

        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn list_open(&self) -> Result<Vec<Invoice>> {
        let invoices = self.invoices.read().await;
        let mut open: Vec<Invoice> = invoices
            .values()
            .filter(|invoice| is_open(invoice.status))
            .cloned()
            .collect();
        open.sort_by(|a, b| a.due_date.cmp(&b.due_date));

        Ok(open)
    }
}
