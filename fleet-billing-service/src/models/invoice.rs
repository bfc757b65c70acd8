//! Invoice models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice status. Auto-generated invoices are created already `sent`;
/// payments recorded later move them toward `paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    PartiallyPaid,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "sent" => InvoiceStatus::Sent,
            "partially_paid" => InvoiceStatus::PartiallyPaid,
            "paid" => InvoiceStatus::Paid,
            _ => InvoiceStatus::Draft,
        }
    }
}

/// Persisted invoice header.
///
/// `company_trn` and `customer_trn` are snapshots taken at creation time;
/// later changes to tenant or customer TRNs do not alter historical invoices.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: i64,
    pub tenant_id: Uuid,
    pub invoice_number: String,
    pub customer_id: i64,
    /// Null for manually created invoices.
    pub contract_id: Option<i64>,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub subtotal: Decimal,
    pub discount_percent: Decimal,
    pub discount_amount: Decimal,
    pub tax_percent: Decimal,
    pub tax_amount: Decimal,
    pub grand_total: Decimal,
    pub status: String,
    pub notes: Option<String>,
    pub company_trn: Option<String>,
    pub customer_trn: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Persisted invoice line item. `amount = quantity * rate`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceLineItem {
    pub id: i64,
    pub invoice_id: i64,
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
    pub sort_order: i32,
}

/// Line item awaiting persistence.
#[derive(Debug, Clone)]
pub struct LineItemDraft {
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
}

/// An invoice built by the synthesizer, not yet persisted. The invoice
/// number is allocated inside the insert transaction, not here.
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    pub tenant_id: Uuid,
    pub customer_id: i64,
    pub contract_id: Option<i64>,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub subtotal: Decimal,
    pub discount_percent: Decimal,
    pub discount_amount: Decimal,
    pub tax_percent: Decimal,
    pub tax_amount: Decimal,
    pub grand_total: Decimal,
    pub status: InvoiceStatus,
    pub notes: Option<String>,
    pub company_trn: Option<String>,
    pub customer_trn: Option<String>,
    pub line_items: Vec<LineItemDraft>,
}
