//! Billing run reporting models. The report is ephemeral: it is returned to
//! the caller (manual trigger) or summarized into the log (scheduled run),
//! never persisted.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What initiated a billing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingTrigger {
    Scheduled,
    Manual,
}

impl BillingTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingTrigger::Scheduled => "scheduled",
            BillingTrigger::Manual => "manual",
        }
    }
}

/// Outcome of billing one contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BillingOutcome {
    Generated {
        invoice_number: String,
        amount: Decimal,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: String,
    },
}

/// Per-contract detail entry in a run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractOutcome {
    pub contract_number: String,
    #[serde(flatten)]
    pub outcome: BillingOutcome,
}

/// Summary of one execution of the billing cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingRunReport {
    pub run_date: NaiveDate,
    pub trigger: BillingTrigger,
    /// Actor that requested a manual run, for audit logging.
    pub triggered_by: Option<Uuid>,
    /// Contracts for which an invoice was generated.
    pub processed: u32,
    pub skipped: u32,
    pub failed: u32,
    pub details: Vec<ContractOutcome>,
}

impl BillingRunReport {
    pub fn new(run_date: NaiveDate, trigger: BillingTrigger, triggered_by: Option<Uuid>) -> Self {
        Self {
            run_date,
            trigger,
            triggered_by,
            processed: 0,
            skipped: 0,
            failed: 0,
            details: Vec::new(),
        }
    }

    pub fn record_generated(
        &mut self,
        contract_number: String,
        invoice_number: String,
        amount: Decimal,
    ) {
        self.processed += 1;
        self.details.push(ContractOutcome {
            contract_number,
            outcome: BillingOutcome::Generated {
                invoice_number,
                amount,
            },
        });
    }

    pub fn record_skipped(&mut self, contract_number: String, reason: &str) {
        self.skipped += 1;
        self.details.push(ContractOutcome {
            contract_number,
            outcome: BillingOutcome::Skipped {
                reason: reason.to_string(),
            },
        });
    }

    pub fn record_failed(&mut self, contract_number: String, error: String) {
        self.failed += 1;
        self.details.push(ContractOutcome {
            contract_number,
            outcome: BillingOutcome::Failed { error },
        });
    }
}
