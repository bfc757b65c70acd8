//! Services module for fleet-billing-service.

pub mod database;
pub mod engine;
pub mod metrics;
pub mod numbering;
pub mod scheduler;
pub mod store;
pub mod synthesizer;

pub use database::Database;
pub use engine::{BillingEngine, SKIP_REASON_ALREADY_BILLED};
pub use metrics::{
    get_metrics, init_metrics, record_billing_run, record_contract_failure,
    record_contract_skipped, record_invoice_amount, record_invoice_generated,
};
pub use scheduler::{BillingScheduler, SchedulerStatus};
pub use store::BillingStore;
pub use synthesizer::synthesize;
