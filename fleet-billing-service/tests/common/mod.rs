//! Test helpers for fleet-billing-service integration tests.
//!
//! Provides an in-memory `BillingStore` with the same semantics as the
//! Postgres implementation (number allocation inside the insert, uniqueness
//! backstops) plus fault injection hooks.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use uuid::Uuid;

use fleet_billing_service::models::{
    Contract, DueContract, Invoice, InvoiceDraft, LineItemDraft, TenantSettings,
};
use fleet_billing_service::services::{numbering, BillingEngine, BillingStore};
use service_core::error::AppError;

pub const TEST_TENANT_ID: &str = "11111111-1111-1111-1111-111111111111";

pub fn tenant_id() -> Uuid {
    Uuid::parse_str(TEST_TENANT_ID).unwrap()
}

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// In-memory billing store.
pub struct InMemoryStore {
    pub contracts: Vec<DueContract>,
    pub settings: Vec<TenantSettings>,
    pub invoices: Mutex<Vec<Invoice>>,
    pub line_items: Mutex<Vec<(i64, LineItemDraft)>>,
    next_id: AtomicI64,
    /// Contract ids whose persistence should fail (simulated fault).
    pub failing_contracts: HashSet<i64>,
    fail_selection: AtomicBool,
    /// Makes the coarse idempotency count report zero, simulating a
    /// concurrent run that slipped past the check; the insert-side
    /// uniqueness backstop must then catch the duplicate.
    bypass_idempotency_count: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            contracts: Vec::new(),
            settings: Vec::new(),
            invoices: Mutex::new(Vec::new()),
            line_items: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            failing_contracts: HashSet::new(),
            fail_selection: AtomicBool::new(false),
            bypass_idempotency_count: AtomicBool::new(false),
        }
    }

    pub fn with_contract(mut self, contract: DueContract) -> Self {
        self.contracts.push(contract);
        self
    }

    pub fn with_settings(mut self, settings: TenantSettings) -> Self {
        self.settings.push(settings);
        self
    }

    pub fn with_failing_contract(mut self, contract_id: i64) -> Self {
        self.failing_contracts.insert(contract_id);
        self
    }

    pub fn fail_selection(&self) {
        self.fail_selection.store(true, Ordering::SeqCst);
    }

    pub fn bypass_idempotency_count(&self) {
        self.bypass_idempotency_count.store(true, Ordering::SeqCst);
    }

    pub fn invoice_count(&self) -> usize {
        self.invoices.lock().unwrap().len()
    }

    pub fn invoice(&self, index: usize) -> Invoice {
        self.invoices.lock().unwrap()[index].clone()
    }

    pub fn line_items_for(&self, invoice_id: i64) -> Vec<LineItemDraft> {
        self.line_items
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == invoice_id)
            .map(|(_, item)| item.clone())
            .collect()
    }
}

#[async_trait]
impl BillingStore for InMemoryStore {
    async fn find_due_contracts(&self, today: NaiveDate) -> Result<Vec<DueContract>, AppError> {
        if self.fail_selection.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "simulated selection failure"
            )));
        }
        Ok(self
            .contracts
            .iter()
            .filter(|c| c.contract.is_due_on(today))
            .cloned()
            .collect())
    }

    async fn tenant_settings(&self, tenant_id: Uuid) -> Result<TenantSettings, AppError> {
        Ok(self
            .settings
            .iter()
            .find(|s| s.tenant_id == tenant_id)
            .cloned()
            .unwrap_or_else(|| TenantSettings::defaults(tenant_id)))
    }

    async fn count_invoices_for_contract_in_month(
        &self,
        contract_id: i64,
        year: i32,
        month: u32,
    ) -> Result<i64, AppError> {
        if self.bypass_idempotency_count.load(Ordering::SeqCst) {
            return Ok(0);
        }
        let count = self
            .invoices
            .lock()
            .unwrap()
            .iter()
            .filter(|inv| {
                inv.contract_id == Some(contract_id)
                    && inv.invoice_date.year() == year
                    && inv.invoice_date.month() == month
            })
            .count();
        Ok(count as i64)
    }

    async fn max_invoice_number(
        &self,
        tenant_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<Option<String>, AppError> {
        let prefix = numbering::month_prefix(year, month);
        Ok(self
            .invoices
            .lock()
            .unwrap()
            .iter()
            .filter(|inv| inv.tenant_id == tenant_id && inv.invoice_number.starts_with(&prefix))
            .map(|inv| inv.invoice_number.clone())
            .max_by_key(|number| numbering::parse_sequence(number)))
    }

    async fn insert_invoice(&self, draft: &InvoiceDraft) -> Result<Invoice, AppError> {
        if let Some(contract_id) = draft.contract_id {
            if self.failing_contracts.contains(&contract_id) {
                return Err(AppError::DatabaseError(anyhow::anyhow!(
                    "simulated persistence failure"
                )));
            }
        }

        let mut invoices = self.invoices.lock().unwrap();

        // Billing-period uniqueness backstop.
        if let Some(contract_id) = draft.contract_id {
            let duplicate = invoices.iter().any(|inv| {
                inv.contract_id == Some(contract_id)
                    && inv.invoice_date.year() == draft.invoice_date.year()
                    && inv.invoice_date.month() == draft.invoice_date.month()
            });
            if duplicate {
                return Err(AppError::DuplicateInvoice(
                    "invoice already exists for this billing period".to_string(),
                ));
            }
        }

        let prefix = numbering::month_prefix(draft.invoice_date.year(), draft.invoice_date.month());
        let max = invoices
            .iter()
            .filter(|inv| {
                inv.tenant_id == draft.tenant_id && inv.invoice_number.starts_with(&prefix)
            })
            .map(|inv| inv.invoice_number.clone())
            .max_by_key(|number| numbering::parse_sequence(number));
        let invoice_number = numbering::next_number(max.as_deref(), draft.invoice_date);

        // Invoice-number uniqueness backstop.
        if invoices
            .iter()
            .any(|inv| inv.tenant_id == draft.tenant_id && inv.invoice_number == invoice_number)
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "invoice number {} already allocated",
                invoice_number
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let invoice = Invoice {
            id,
            tenant_id: draft.tenant_id,
            invoice_number,
            customer_id: draft.customer_id,
            contract_id: draft.contract_id,
            invoice_date: draft.invoice_date,
            due_date: draft.due_date,
            subtotal: draft.subtotal,
            discount_percent: draft.discount_percent,
            discount_amount: draft.discount_amount,
            tax_percent: draft.tax_percent,
            tax_amount: draft.tax_amount,
            grand_total: draft.grand_total,
            status: draft.status.as_str().to_string(),
            notes: draft.notes.clone(),
            company_trn: draft.company_trn.clone(),
            customer_trn: draft.customer_trn.clone(),
            created_utc: Utc::now(),
        };
        invoices.push(invoice.clone());

        let mut line_items = self.line_items.lock().unwrap();
        for item in &draft.line_items {
            line_items.push((id, item.clone()));
        }

        Ok(invoice)
    }
}

/// A contract due on `billing_day`, valid through 2025, with no truck or
/// driver assigned.
pub fn due_contract(id: i64, contract_number: &str, amount: &str, billing_day: i32) -> DueContract {
    DueContract {
        contract: Contract {
            id,
            tenant_id: tenant_id(),
            contract_number: contract_number.to_string(),
            customer_id: 100 + id,
            truck_id: None,
            driver_id: None,
            start_date: date(2025, 1, 1),
            end_date: date(2025, 12, 31),
            monthly_amount: dec(amount),
            billing_day,
            status: "active".to_string(),
            notes: None,
        },
        customer_name: "Al Noor Trading".to_string(),
        customer_email: Some("billing@alnoor.example".to_string()),
        customer_address: None,
        customer_trn: Some("100234567890003".to_string()),
        truck_plate: None,
        truck_type: None,
        driver_name: None,
    }
}

/// A minimal persisted invoice carrying the given number, for seeding
/// numbering lookups.
pub fn stored_invoice(number: &str) -> Invoice {
    Invoice {
        id: 0,
        tenant_id: tenant_id(),
        invoice_number: number.to_string(),
        customer_id: 1,
        contract_id: Some(1),
        invoice_date: date(2025, 3, 1),
        due_date: date(2025, 3, 16),
        subtotal: dec("1000.00"),
        discount_percent: Decimal::ZERO,
        discount_amount: Decimal::ZERO,
        tax_percent: dec("5.00"),
        tax_amount: dec("50.00"),
        grand_total: dec("1050.00"),
        status: "sent".to_string(),
        notes: None,
        company_trn: None,
        customer_trn: None,
        created_utc: Utc::now(),
    }
}

pub fn default_settings() -> TenantSettings {
    TenantSettings {
        tenant_id: tenant_id(),
        company_name: Some("Gulf Fleet Rentals LLC".to_string()),
        trn_number: Some("100987654320003".to_string()),
        vat_rate: Some(dec("5.00")),
    }
}

pub const TEST_TIMEZONE: Tz = chrono_tz::Asia::Dubai;

pub fn engine(store: Arc<InMemoryStore>) -> BillingEngine<InMemoryStore> {
    BillingEngine::new(store, TEST_TIMEZONE, 15, dec("5.00"))
}
