//! Invoice synthesis: contract terms + tenant settings -> invoice draft.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;

use crate::models::{DueContract, InvoiceDraft, InvoiceStatus, LineItemDraft, TenantSettings};

/// Build the invoice draft for one due contract.
///
/// The draft carries exactly one consolidated line item (quantity 1, rate =
/// monthly amount), applies the tenant's VAT rate (or `default_vat_rate`
/// when unset), and snapshots both TRNs. Auto-generated invoices carry no
/// discount and are created already `sent`.
pub fn synthesize(
    due: &DueContract,
    settings: &TenantSettings,
    today: NaiveDate,
    due_in_days: i64,
    default_vat_rate: Decimal,
) -> InvoiceDraft {
    let contract = &due.contract;

    let subtotal = contract.monthly_amount;
    let vat_rate = settings.vat_rate.unwrap_or(default_vat_rate);
    let tax_amount = (subtotal * vat_rate / Decimal::ONE_HUNDRED).round_dp(2);
    let grand_total = subtotal + tax_amount;

    let due_date = today
        .checked_add_days(Days::new(due_in_days.unsigned_abs()))
        .unwrap_or(today);

    InvoiceDraft {
        tenant_id: contract.tenant_id,
        customer_id: contract.customer_id,
        contract_id: Some(contract.id),
        invoice_date: today,
        due_date,
        subtotal,
        discount_percent: Decimal::ZERO,
        discount_amount: Decimal::ZERO,
        tax_percent: vat_rate,
        tax_amount,
        grand_total,
        status: InvoiceStatus::Sent,
        notes: Some(format!(
            "Auto-generated from contract {}",
            contract.contract_number
        )),
        company_trn: settings.trn_number.clone(),
        customer_trn: due.customer_trn.clone(),
        line_items: vec![LineItemDraft {
            description: line_description(due),
            quantity: Decimal::ONE,
            rate: subtotal,
            amount: subtotal,
        }],
    }
}

/// Compose the line item description from whatever resources the contract
/// has assigned: `"Monthly Rental - Truck: {plate} ({type}), Driver: {name}"`
/// with absent parts dropped, or the literal `"Monthly Rental Service"`
/// when neither truck nor driver is present.
fn line_description(due: &DueContract) -> String {
    let mut parts: Vec<String> = Vec::new();

    match (&due.truck_plate, &due.truck_type) {
        (Some(plate), Some(kind)) => parts.push(format!("Truck: {} ({})", plate, kind)),
        (Some(plate), None) => parts.push(format!("Truck: {}", plate)),
        _ => {}
    }

    if let Some(name) = &due.driver_name {
        parts.push(format!("Driver: {}", name));
    }

    if parts.is_empty() {
        "Monthly Rental Service".to_string()
    } else {
        format!("Monthly Rental - {}", parts.join(", "))
    }
}
