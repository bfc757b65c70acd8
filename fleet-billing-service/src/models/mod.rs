//! Domain models for fleet-billing-service.

pub mod billing_run;
pub mod contract;
pub mod invoice;
pub mod settings;

pub use billing_run::{BillingOutcome, BillingRunReport, BillingTrigger, ContractOutcome};
pub use contract::{Contract, ContractStatus, DueContract};
pub use invoice::{Invoice, InvoiceDraft, InvoiceLineItem, InvoiceStatus, LineItemDraft};
pub use settings::TenantSettings;
