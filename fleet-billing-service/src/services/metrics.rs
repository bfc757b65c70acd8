//! Prometheus metrics for the billing engine.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "fleet_billing_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Billing cycle executions by trigger and outcome
pub static BILLING_RUNS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Invoices generated per tenant
pub static INVOICES_GENERATED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Idempotency skips per tenant
pub static CONTRACTS_SKIPPED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Per-contract billing failures per tenant
pub static CONTRACT_FAILURES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Invoiced amount by tenant (monetary tracking)
pub static INVOICE_AMOUNT_TOTAL: OnceLock<prometheus::CounterVec> = OnceLock::new();

/// Initialize all metrics. Call once at startup.
pub fn init_metrics() {
    BILLING_RUNS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "fleet_billing_runs_total",
                "Billing cycle executions by trigger and status"
            ),
            &["trigger", "status"]
        )
        .expect("Failed to register BILLING_RUNS_TOTAL")
    });

    INVOICES_GENERATED_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "fleet_billing_invoices_generated_total",
                "Invoices generated by tenant"
            ),
            &["tenant_id"]
        )
        .expect("Failed to register INVOICES_GENERATED_TOTAL")
    });

    CONTRACTS_SKIPPED_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "fleet_billing_contracts_skipped_total",
                "Contracts skipped by the idempotency guard, by tenant"
            ),
            &["tenant_id"]
        )
        .expect("Failed to register CONTRACTS_SKIPPED_TOTAL")
    });

    CONTRACT_FAILURES_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "fleet_billing_contract_failures_total",
                "Per-contract billing failures by tenant"
            ),
            &["tenant_id"]
        )
        .expect("Failed to register CONTRACT_FAILURES_TOTAL")
    });

    INVOICE_AMOUNT_TOTAL.get_or_init(|| {
        prometheus::register_counter_vec!(
            prometheus::opts!(
                "fleet_billing_invoice_amount_total",
                "Total invoiced amount by tenant"
            ),
            &["tenant_id"]
        )
        .expect("Failed to register INVOICE_AMOUNT_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*DB_QUERY_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to string")
}

/// Record a completed (or failed) billing run.
pub fn record_billing_run(trigger: &str, status: &str) {
    if let Some(counter) = BILLING_RUNS_TOTAL.get() {
        counter.with_label_values(&[trigger, status]).inc();
    }
}

/// Record a generated invoice.
pub fn record_invoice_generated(tenant_id: &str) {
    if let Some(counter) = INVOICES_GENERATED_TOTAL.get() {
        counter.with_label_values(&[tenant_id]).inc();
    }
}

/// Record an idempotency skip.
pub fn record_contract_skipped(tenant_id: &str) {
    if let Some(counter) = CONTRACTS_SKIPPED_TOTAL.get() {
        counter.with_label_values(&[tenant_id]).inc();
    }
}

/// Record a per-contract failure.
pub fn record_contract_failure(tenant_id: &str) {
    if let Some(counter) = CONTRACT_FAILURES_TOTAL.get() {
        counter.with_label_values(&[tenant_id]).inc();
    }
}

/// Record the invoiced amount for financial tracking.
pub fn record_invoice_amount(tenant_id: &str, amount: f64) {
    if let Some(counter) = INVOICE_AMOUNT_TOTAL.get() {
        counter.with_label_values(&[tenant_id]).inc_by(amount.abs());
    }
}
