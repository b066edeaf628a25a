//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::path::Path;

use chrono::NaiveDate;
use invoice_store::models::{
    NewInvoice, NewInvoiceItem, NewInvoiceSummary, PartyDetails,
};
use rust_decimal::Decimal;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn dec(value: &str) -> Decimal {
    value.parse().expect("decimal literal")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn invoice(number: &str) -> NewInvoice {
    NewInvoice {
        invoice_number: Some(number.to_string()),
        invoice_date: Some(date(2024, 1, 15)),
        due_date: Some(date(2024, 2, 14)),
        total_amount: Some(dec("22.00")),
        ocr_confidence_score: Some(dec("93.50")),
        source_file_url: Some(format!("s3://invoices/{}.png", number)),
        ..NewInvoice::default()
    }
}

pub fn party(name: &str) -> PartyDetails {
    PartyDetails {
        name: Some(name.to_string()),
        address: Some("1 Main Street".to_string()),
        email: Some(format!("{}@example.com", name.to_lowercase())),
        ..PartyDetails::default()
    }
}

/// quantity 2 x 10.0000, tax 2.00, line total 22.00
pub fn widget_item() -> NewInvoiceItem {
    NewInvoiceItem {
        description: Some("Widget".to_string()),
        code: Some("W-1".to_string()),
        quantity: dec("2"),
        unit_price: dec("10.0000"),
        discount_amount: dec("0"),
        tax_rate: dec("10"),
        tax_amount: dec("2.00"),
        line_total: dec("22.00"),
        ..NewInvoiceItem::default()
    }
}

pub fn widget_summary() -> NewInvoiceSummary {
    NewInvoiceSummary {
        subtotal: dec("20.00"),
        total_tax: dec("2.00"),
        total_amount_due: dec("22.00"),
        ..NewInvoiceSummary::default()
    }
}

/// Counts rows in `table` owned by `invoice_id`, read through a separate connection.
pub fn count_rows(path: &Path, table: &str, invoice_id: uuid::Uuid) -> i64 {
    let conn = rusqlite::Connection::open(path).expect("open raw connection");
    let column = if table == "invoices" { "id" } else { "invoice_id" };
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE {} = ?1", table, column),
        [invoice_id],
        |row| row.get(0),
    )
    .expect("count rows")
}
