//! Rental contract model.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Contract status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Active,
    Expired,
    Cancelled,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Active => "active",
            ContractStatus::Expired => "expired",
            ContractStatus::Cancelled => "cancelled",
        }
    }
}

/// Monthly rental contract.
///
/// `billing_day` is restricted to 1-28 at creation time so the day-of-month
/// match in [`Contract::is_due_on`] never skips months shorter than the
/// billing day.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contract {
    pub id: i64,
    pub tenant_id: Uuid,
    pub contract_number: String,
    pub customer_id: i64,
    pub truck_id: Option<i64>,
    pub driver_id: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub monthly_amount: Decimal,
    pub billing_day: i32,
    pub status: String,
    pub notes: Option<String>,
}

impl Contract {
    /// Whether this contract's billing anniversary falls on `today`.
    ///
    /// `today` must already be resolved in the tenant's timezone; no timezone
    /// conversion happens here. Any status other than `active` (including
    /// unknown strings) is never due.
    pub fn is_due_on(&self, today: NaiveDate) -> bool {
        self.status == ContractStatus::Active.as_str()
            && self.billing_day == today.day() as i32
            && self.start_date <= today
            && self.end_date >= today
    }
}

/// A contract due for billing, joined with the customer/truck/driver display
/// fields the generated invoice needs.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DueContract {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub contract: Contract,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,
    pub customer_trn: Option<String>,
    pub truck_plate: Option<String>,
    pub truck_type: Option<String>,
    pub driver_name: Option<String>,
}
