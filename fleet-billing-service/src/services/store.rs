//! Storage boundary consumed by the billing engine.

use async_trait::async_trait;
use chrono::NaiveDate;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{DueContract, Invoice, InvoiceDraft, TenantSettings};

/// Read/write interface the billing engine talks to. Implemented for
/// PostgreSQL by [`crate::services::Database`]; tests provide an in-memory
/// implementation.
#[async_trait]
pub trait BillingStore: Send + Sync {
    /// Active contracts whose billing day equals `today`'s day-of-month and
    /// whose date range covers `today`, joined with customer, truck, and
    /// driver display fields. `today` is already localized by the caller.
    async fn find_due_contracts(&self, today: NaiveDate) -> Result<Vec<DueContract>, AppError>;

    /// Per-tenant settings, falling back to defaults when no row exists.
    async fn tenant_settings(&self, tenant_id: Uuid) -> Result<TenantSettings, AppError>;

    /// Number of invoices referencing `contract_id` with an invoice date in
    /// the given calendar month. The idempotency guard treats any non-zero
    /// count as "already billed".
    async fn count_invoices_for_contract_in_month(
        &self,
        contract_id: i64,
        year: i32,
        month: u32,
    ) -> Result<i64, AppError>;

    /// Existing invoice number with the greatest sequence for the tenant and
    /// calendar month. Numbers are zero-padded to four digits but may grow
    /// wider, so implementations must order by width before value.
    async fn max_invoice_number(
        &self,
        tenant_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<Option<String>, AppError>;

    /// Persist the header and line items atomically, allocating the next
    /// invoice number inside the same transaction.
    ///
    /// Returns [`AppError::DuplicateInvoice`] when the contract already has
    /// an invoice for the billing period (the storage-level backstop behind
    /// the coarse idempotency check), and [`AppError::Conflict`] when the
    /// allocated invoice number lost a race.
    async fn insert_invoice(&self, draft: &InvoiceDraft) -> Result<Invoice, AppError>;
}
