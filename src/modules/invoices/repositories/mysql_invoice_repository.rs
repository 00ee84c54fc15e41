// MySQL-backed InvoiceRepository
//
// One row per aggregate. The full invoice lives in `document` (JSON text);
// status, due date and amounts are duplicated into columns so sweeps and
// listings can filter without parsing documents.

use async_trait::async_trait;
use sqlx::{FromRow, MySqlPool};

use super::invoice_repository::InvoiceRepository;
use crate::core::{AppError, Result};
use crate::modules::invoices::models::Invoice;

/// Repository for invoice database operations
pub struct MySqlInvoiceRepository {
    pool: MySqlPool,
}

impl MySqlInvoiceRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn current_version(&self, id: &str) -> Result<Option<i64>> {
        let version: Option<(i64,)> = sqlx::query_as("SELECT version FROM invoices WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to fetch invoice version: {}", e)))?;

        Ok(version.map(|(v,)| v))
    }
}

#[derive(Debug, FromRow)]
struct InvoiceDocumentRow {
    document: String,
    version: i64,
}

impl InvoiceDocumentRow {
    fn into_invoice(self) -> Result<Invoice> {
        let mut invoice: Invoice = serde_json::from_str(&self.document)?;
        // The column is authoritative
        invoice.version = self.version;
        Ok(invoice)
    }
}

fn encode(invoice: &Invoice) -> Result<String> {
    Ok(serde_json::to_string(invoice)?)
}

#[async_trait]
impl InvoiceRepository for MySqlInvoiceRepository {
    async fn insert(&self, invoice: &Invoice) -> Result<Invoice> {
        let mut stored = invoice.clone();
        stored.version = 1;
        let document = encode(&stored)?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_number, status, due_date, total_amount, amount_due,
                version, document, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&stored.id)
        .bind(&stored.invoice_number)
        .bind(stored.status.as_str())
        .bind(stored.due_date)
        .bind(stored.total_amount)
        .bind(stored.amount_due)
        .bind(stored.version)
        .bind(&document)
        .bind(stored.created_at)
        .bind(stored.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    return AppError::validation(format!(
                        "Invoice with number '{}' already exists",
                        stored.invoice_number
                    ));
                }
            }
            AppError::Internal(format!("Failed to create invoice: {}", e))
        })?;

        Ok(stored)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Invoice>> {
        let row = sqlx::query_as::<_, InvoiceDocumentRow>(
            "SELECT document, version FROM invoices WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch invoice: {}", e)))?;

        row.map(InvoiceDocumentRow::into_invoice).transpose()
    }

    async fn find_by_number(&self, invoice_number: &str) -> Result<Option<Invoice>> {
        let row = sqlx::query_as::<_, InvoiceDocumentRow>(
            "SELECT document, version FROM invoices WHERE invoice_number = ?",
        )
        .bind(invoice_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch invoice: {}", e)))?;

        row.map(InvoiceDocumentRow::into_invoice).transpose()
    }

    async fn update(&self, invoice: &Invoice, expected_version: i64) -> Result<Invoice> {
        let mut stored = invoice.clone();
        stored.version = expected_version + 1;
        let document = encode(&stored)?;

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET invoice_number = ?, status = ?, due_date = ?, total_amount = ?,
                amount_due = ?, version = ?, document = ?, updated_at = ?
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(&stored.invoice_number)
        .bind(stored.status.as_str())
        .bind(stored.due_date)
        .bind(stored.total_amount)
        .bind(stored.amount_due)
        .bind(stored.version)
        .bind(&document)
        .bind(stored.updated_at)
        .bind(&stored.id)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to update invoice: {}", e)))?;

        if result.rows_affected() == 0 {
            return match self.current_version(&stored.id).await? {
                None => Err(AppError::not_found(format!(
                    "Invoice '{}' not found",
                    stored.id
                ))),
                Some(found) => Err(AppError::conflict(format!(
                    "Invoice '{}' was modified concurrently (expected version {}, found {})",
                    stored.id, expected_version, found
                ))),
            };
        }

        Ok(stored)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM invoices WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to delete invoice: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Invoice '{}' not found", id)));
        }

        Ok(())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceDocumentRow>(
            r#"
            SELECT document, version
            FROM invoices
            ORDER BY created_at DESC, invoice_number ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit.max(0))
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to list invoices: {}", e)))?;

        rows.into_iter().map(InvoiceDocumentRow::into_invoice).collect()
    }

    async fn list_open(&self) -> Result<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceDocumentRow>(
            r#"
            SELECT document, version
            FROM invoices
            WHERE status NOT IN ('paid', 'cancelled')
            ORDER BY due_date ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to list open invoices: {}", e)))?;

        rows.into_iter().map(InvoiceDocumentRow::into_invoice).collect()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
