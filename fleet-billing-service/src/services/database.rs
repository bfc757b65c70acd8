//! Database service for fleet-billing-service.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{DueContract, Invoice, InvoiceDraft, TenantSettings};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::numbering;
use crate::services::store::BillingStore;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "fleet-billing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

// The month prefix is fixed-width, so ordering by length before value keeps
// a five-digit sequence (10000+) above the four-digit ones.
const MAX_INVOICE_NUMBER_SQL: &str = r#"
    SELECT invoice_number
    FROM invoices
    WHERE tenant_id = $1 AND invoice_number LIKE $2
    ORDER BY LENGTH(invoice_number) DESC, invoice_number DESC
    LIMIT 1
"#;

const INSERT_INVOICE_SQL: &str = r#"
    INSERT INTO invoices (
        tenant_id, invoice_number, customer_id, contract_id, invoice_date, due_date,
        subtotal, discount_percent, discount_amount, tax_percent, tax_amount, grand_total,
        status, notes, company_trn, customer_trn
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
    RETURNING id, tenant_id, invoice_number, customer_id, contract_id, invoice_date, due_date,
        subtotal, discount_percent, discount_amount, tax_percent, tax_amount, grand_total,
        status, notes, company_trn, customer_trn, created_utc
"#;

/// Map an invoice insert failure onto the error taxonomy: a billing-period
/// collision means the contract was billed concurrently (skip), a number
/// collision means the allocator lost a race (per-contract failure).
fn map_insert_error(err: sqlx::Error, invoice_number: &str) -> AppError {
    if let sqlx::Error::Database(ref db_err) = err {
        match db_err.constraint() {
            Some("invoices_contract_billing_period_key") => {
                return AppError::DuplicateInvoice(
                    "invoice already exists for this billing period".to_string(),
                );
            }
            Some("invoices_tenant_invoice_number_key") => {
                return AppError::Conflict(anyhow::anyhow!(
                    "invoice number {} already allocated",
                    invoice_number
                ));
            }
            _ => {}
        }
    }
    AppError::DatabaseError(anyhow::anyhow!("Failed to insert invoice: {}", err))
}

#[async_trait]
impl BillingStore for Database {
    #[instrument(skip(self), fields(day = today.day()))]
    async fn find_due_contracts(&self, today: NaiveDate) -> Result<Vec<DueContract>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_due_contracts"])
            .start_timer();

        let contracts = sqlx::query_as::<_, DueContract>(
            r#"
            SELECT c.id, c.tenant_id, c.contract_number, c.customer_id, c.truck_id, c.driver_id,
                   c.start_date, c.end_date, c.monthly_amount, c.billing_day, c.status, c.notes,
                   cu.name AS customer_name,
                   cu.email AS customer_email,
                   cu.address AS customer_address,
                   cu.trn_number AS customer_trn,
                   t.plate_number AS truck_plate,
                   t.truck_type AS truck_type,
                   d.name AS driver_name
            FROM contracts c
            JOIN customers cu ON cu.id = c.customer_id
            LEFT JOIN trucks t ON t.id = c.truck_id
            LEFT JOIN drivers d ON d.id = c.driver_id
            WHERE c.status = 'active'
              AND c.billing_day = $1
              AND c.start_date <= $2
              AND c.end_date >= $2
            ORDER BY c.id
            "#,
        )
        .bind(today.day() as i32)
        .bind(today)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to find due contracts: {}", e))
        })?;

        timer.observe_duration();

        Ok(contracts)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn tenant_settings(&self, tenant_id: Uuid) -> Result<TenantSettings, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["tenant_settings"])
            .start_timer();

        let settings = sqlx::query_as::<_, TenantSettings>(
            r#"
            SELECT tenant_id, company_name, trn_number, vat_rate
            FROM company_settings
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get tenant settings: {}", e))
        })?;

        timer.observe_duration();

        Ok(settings.unwrap_or_else(|| TenantSettings::defaults(tenant_id)))
    }

    #[instrument(skip(self), fields(contract_id = contract_id))]
    async fn count_invoices_for_contract_in_month(
        &self,
        contract_id: i64,
        year: i32,
        month: u32,
    ) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["count_invoices_for_contract_in_month"])
            .start_timer();

        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM invoices
            WHERE contract_id = $1
              AND EXTRACT(YEAR FROM invoice_date) = $2
              AND EXTRACT(MONTH FROM invoice_date) = $3
            "#,
        )
        .bind(contract_id)
        .bind(year)
        .bind(month as i32)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to count invoices: {}", e))
        })?;

        timer.observe_duration();

        Ok(count)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn max_invoice_number(
        &self,
        tenant_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<Option<String>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["max_invoice_number"])
            .start_timer();

        let prefix = numbering::month_prefix(year, month);
        let max = sqlx::query_scalar::<_, String>(MAX_INVOICE_NUMBER_SQL)
            .bind(tenant_id)
            .bind(format!("{}%", prefix))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to get max invoice number: {}", e))
            })?;

        timer.observe_duration();

        Ok(max)
    }

    #[instrument(skip(self, draft), fields(tenant_id = %draft.tenant_id, contract_id = ?draft.contract_id))]
    async fn insert_invoice(&self, draft: &InvoiceDraft) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Allocate the number inside the insert transaction to keep the
        // read-then-increment window as small as possible. The unique
        // constraint on (tenant_id, invoice_number) backstops the race.
        let prefix =
            numbering::month_prefix(draft.invoice_date.year(), draft.invoice_date.month());
        let max = sqlx::query_scalar::<_, String>(MAX_INVOICE_NUMBER_SQL)
            .bind(draft.tenant_id)
            .bind(format!("{}%", prefix))
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to get max invoice number: {}", e))
            })?;
        let invoice_number = numbering::next_number(max.as_deref(), draft.invoice_date);

        let invoice = sqlx::query_as::<_, Invoice>(INSERT_INVOICE_SQL)
            .bind(draft.tenant_id)
            .bind(&invoice_number)
            .bind(draft.customer_id)
            .bind(draft.contract_id)
            .bind(draft.invoice_date)
            .bind(draft.due_date)
            .bind(draft.subtotal)
            .bind(draft.discount_percent)
            .bind(draft.discount_amount)
            .bind(draft.tax_percent)
            .bind(draft.tax_amount)
            .bind(draft.grand_total)
            .bind(draft.status.as_str())
            .bind(&draft.notes)
            .bind(&draft.company_trn)
            .bind(&draft.customer_trn)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_insert_error(e, &invoice_number))?;

        for (sort_order, item) in draft.line_items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO invoice_line_items (invoice_id, description, quantity, rate, amount, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(invoice.id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.rate)
            .bind(item.amount)
            .bind(sort_order as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert line item: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit invoice: {}", e))
        })?;

        timer.observe_duration();
        info!(
            invoice_id = invoice.id,
            invoice_number = %invoice.invoice_number,
            "Invoice persisted"
        );

        Ok(invoice)
    }
}
