//! Batch processor for the recurring billing cycle.

use chrono::{Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::{BillingRunReport, BillingTrigger, DueContract, Invoice};
use crate::services::metrics::{
    record_billing_run, record_contract_failure, record_contract_skipped,
    record_invoice_amount, record_invoice_generated,
};
use crate::services::store::BillingStore;
use crate::services::synthesizer;

/// Skip reason reported when the idempotency guard finds an existing invoice.
pub const SKIP_REASON_ALREADY_BILLED: &str = "Invoice already exists for this month";

/// Orchestrates one billing cycle: selection, idempotency check, synthesis,
/// and persistence, with per-contract failure isolation.
pub struct BillingEngine<S> {
    store: Arc<S>,
    timezone: Tz,
    due_in_days: i64,
    default_vat_rate: Decimal,
}

impl<S: BillingStore> BillingEngine<S> {
    pub fn new(store: Arc<S>, timezone: Tz, due_in_days: i64, default_vat_rate: Decimal) -> Self {
        Self {
            store,
            timezone,
            due_in_days,
            default_vat_rate,
        }
    }

    /// The current date in the configured billing timezone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    /// Read-only preview of the contracts the next cycle would bill.
    pub async fn contracts_due_today(&self) -> Result<Vec<DueContract>, AppError> {
        self.store.find_due_contracts(self.today()).await
    }

    /// Run the billing cycle for today. Entry point for both the scheduler
    /// and the manual trigger; `triggered_by` is the requesting actor for
    /// audit logging on manual runs.
    #[instrument(skip(self), fields(trigger = trigger.as_str()))]
    pub async fn run_billing_cycle(
        &self,
        trigger: BillingTrigger,
        triggered_by: Option<Uuid>,
    ) -> Result<BillingRunReport, AppError> {
        self.run_billing_cycle_on(self.today(), trigger, triggered_by)
            .await
    }

    /// Run the billing cycle for an explicit date, already resolved in the
    /// billing timezone. A selection failure aborts the run; everything
    /// after selection is isolated per contract.
    pub async fn run_billing_cycle_on(
        &self,
        today: NaiveDate,
        trigger: BillingTrigger,
        triggered_by: Option<Uuid>,
    ) -> Result<BillingRunReport, AppError> {
        info!(
            run_date = %today,
            trigger = trigger.as_str(),
            triggered_by = ?triggered_by,
            "Starting billing cycle"
        );

        let due_contracts = match self.store.find_due_contracts(today).await {
            Ok(contracts) => contracts,
            Err(e) => {
                record_billing_run(trigger.as_str(), "failed");
                return Err(e);
            }
        };

        let mut report = BillingRunReport::new(today, trigger, triggered_by);

        if due_contracts.is_empty() {
            info!(run_date = %today, "No contracts due for billing");
            record_billing_run(trigger.as_str(), "completed");
            return Ok(report);
        }

        for due in &due_contracts {
            let tenant = due.contract.tenant_id.to_string();
            let contract_number = due.contract.contract_number.clone();

            match self.bill_contract(due, today).await {
                Ok(Some(invoice)) => {
                    info!(
                        contract_number = %contract_number,
                        invoice_number = %invoice.invoice_number,
                        grand_total = %invoice.grand_total,
                        "Invoice generated"
                    );
                    record_invoice_generated(&tenant);
                    if let Some(amount) = invoice.grand_total.to_f64() {
                        record_invoice_amount(&tenant, amount);
                    }
                    report.record_generated(
                        contract_number,
                        invoice.invoice_number,
                        invoice.grand_total,
                    );
                }
                Ok(None) => {
                    record_contract_skipped(&tenant);
                    report.record_skipped(contract_number, SKIP_REASON_ALREADY_BILLED);
                }
                // Storage-level backstop: a concurrent run billed this
                // contract between the guard check and the insert.
                Err(AppError::DuplicateInvoice(_)) => {
                    record_contract_skipped(&tenant);
                    report.record_skipped(contract_number, SKIP_REASON_ALREADY_BILLED);
                }
                Err(e) => {
                    warn!(
                        contract_number = %contract_number,
                        error = %e,
                        "Failed to bill contract"
                    );
                    record_contract_failure(&tenant);
                    report.record_failed(contract_number, e.to_string());
                }
            }
        }

        info!(
            run_date = %today,
            trigger = trigger.as_str(),
            processed = report.processed,
            skipped = report.skipped,
            failed = report.failed,
            "Billing cycle finished"
        );
        record_billing_run(trigger.as_str(), "completed");

        Ok(report)
    }

    /// Bill a single contract: idempotency check, synthesis, persistence.
    /// Returns `Ok(None)` when the contract is already billed this month.
    async fn bill_contract(
        &self,
        due: &DueContract,
        today: NaiveDate,
    ) -> Result<Option<Invoice>, AppError> {
        let already_billed = self
            .store
            .count_invoices_for_contract_in_month(due.contract.id, today.year(), today.month())
            .await?
            > 0;
        if already_billed {
            return Ok(None);
        }

        let settings = self.store.tenant_settings(due.contract.tenant_id).await?;
        let draft = synthesizer::synthesize(
            due,
            &settings,
            today,
            self.due_in_days,
            self.default_vat_rate,
        );
        let invoice = self.store.insert_invoice(&draft).await?;

        Ok(Some(invoice))
    }
}
