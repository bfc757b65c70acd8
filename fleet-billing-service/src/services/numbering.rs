//! Sequential invoice number allocation.
//!
//! Numbers are tenant-scoped and have the form `INV-{YYYY}-{MM}-{NNNN}`.
//! The sequence restarts at 0001 each calendar month.

use chrono::{Datelike, NaiveDate};

/// Prefix shared by every invoice number in a tenant's month.
pub fn month_prefix(year: i32, month: u32) -> String {
    format!("INV-{:04}-{:02}-", year, month)
}

/// Format a full invoice number.
pub fn invoice_number(year: i32, month: u32, sequence: u32) -> String {
    format!("INV-{:04}-{:02}-{:04}", year, month, sequence)
}

/// Parse the trailing sequence out of an invoice number. Returns `None` for
/// anything that does not end in a `-`-separated integer.
pub fn parse_sequence(number: &str) -> Option<u32> {
    number.rsplit('-').next()?.parse().ok()
}

/// Next invoice number for `today`'s month given the current maximum.
/// Starts at 0001 when the month has no invoices yet; a malformed maximum
/// also restarts the sequence rather than failing the insert. Sequences
/// past 9999 widen to five digits, so the store's max lookup must order by
/// width before value.
pub fn next_number(max_existing: Option<&str>, today: NaiveDate) -> String {
    let sequence = max_existing
        .and_then(parse_sequence)
        .map(|seq| seq + 1)
        .unwrap_or(1);
    invoice_number(today.year(), today.month(), sequence)
}
