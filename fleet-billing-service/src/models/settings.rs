//! Tenant company settings.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Company settings, one row per tenant: legal name, tax registration
/// number, and the flat VAT rate applied to generated invoices.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TenantSettings {
    pub tenant_id: Uuid,
    pub company_name: Option<String>,
    pub trn_number: Option<String>,
    pub vat_rate: Option<Decimal>,
}

impl TenantSettings {
    /// Settings used when a tenant has no row yet.
    pub fn defaults(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            company_name: None,
            trn_number: None,
            vat_rate: None,
        }
    }
}
