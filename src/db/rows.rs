use rusqlite::types::Type;
use rusqlite::Row;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::models::{
    Invoice, InvoiceItem, InvoiceMetadata, InvoiceSummary, Party, PartyDetails,
    PaymentInformation, ProcessingHistory,
};
use crate::utils::parse_decimal;

pub(crate) const INVOICE_COLUMNS: &str = "id, invoice_number, invoice_date, due_date, invoice_type, status,
    total_amount, currency, ocr_confidence_score, source_file_url, processed_at,
    created_at, updated_at";

pub(crate) const PARTY_COLUMNS: &str =
    "id, invoice_id, name, address, contact_information, tax_id, email, phone, created_at";

pub(crate) const ITEM_COLUMNS: &str = "id, invoice_id, item_description, item_code, quantity, unit_price,
    discount_percentage, discount_amount, tax_rate, tax_amount, line_total, created_at";

pub(crate) const PAYMENT_COLUMNS: &str = "id, invoice_id, payment_terms, payment_method, bank_account_details,
    payment_status, paid_amount, payment_date, created_at";

pub(crate) const SUMMARY_COLUMNS: &str =
    "id, invoice_id, subtotal, total_discount, total_tax, shipping_cost, total_amount_due, created_at";

pub(crate) const METADATA_COLUMNS: &str = "id, invoice_id, po_number, terms_and_conditions, notes,
    custom_fields, ocr_raw_data, processing_logs, created_at";

pub(crate) const HISTORY_COLUMNS: &str =
    "id, invoice_id, action, status, details, performed_by, performed_at";

/// Reads a decimal stored as canonical text.
pub(crate) fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    parse_decimal(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| {
        parse_decimal(&value)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Reads a JSON document stored as text.
pub(crate) fn document_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Value> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// SQL NULL is an absent document; the text `null` is `Some(Value::Null)`.
pub(crate) fn opt_document_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Value>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|text| {
        serde_json::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

pub(crate) fn invoice_from_row(row: &Row<'_>) -> rusqlite::Result<Invoice> {
    Ok(Invoice {
        id: row.get(0)?,
        invoice_number: row.get(1)?,
        invoice_date: row.get(2)?,
        due_date: row.get(3)?,
        invoice_type: row.get(4)?,
        status: row.get(5)?,
        total_amount: opt_decimal_at(row, 6)?,
        currency: row.get(7)?,
        ocr_confidence_score: opt_decimal_at(row, 8)?,
        source_file_url: row.get(9)?,
        processed_at: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

pub(crate) fn party_from_row(row: &Row<'_>) -> rusqlite::Result<Party> {
    Ok(Party {
        id: row.get(0)?,
        invoice_id: row.get(1)?,
        details: PartyDetails {
            name: row.get(2)?,
            address: row.get(3)?,
            contact_information: row.get(4)?,
            tax_id: row.get(5)?,
            email: row.get(6)?,
            phone: row.get(7)?,
        },
        created_at: row.get(8)?,
    })
}

pub(crate) fn item_from_row(row: &Row<'_>) -> rusqlite::Result<InvoiceItem> {
    Ok(InvoiceItem {
        id: row.get(0)?,
        invoice_id: row.get(1)?,
        description: row.get(2)?,
        code: row.get(3)?,
        quantity: decimal_at(row, 4)?,
        unit_price: decimal_at(row, 5)?,
        discount_percentage: decimal_at(row, 6)?,
        discount_amount: decimal_at(row, 7)?,
        tax_rate: decimal_at(row, 8)?,
        tax_amount: decimal_at(row, 9)?,
        line_total: decimal_at(row, 10)?,
        created_at: row.get(11)?,
    })
}

pub(crate) fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<PaymentInformation> {
    Ok(PaymentInformation {
        id: row.get(0)?,
        invoice_id: row.get(1)?,
        payment_terms: row.get(2)?,
        payment_method: row.get(3)?,
        bank_account_details: row.get(4)?,
        payment_status: row.get(5)?,
        paid_amount: decimal_at(row, 6)?,
        payment_date: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub(crate) fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<InvoiceSummary> {
    Ok(InvoiceSummary {
        id: row.get(0)?,
        invoice_id: row.get(1)?,
        subtotal: decimal_at(row, 2)?,
        total_discount: decimal_at(row, 3)?,
        total_tax: decimal_at(row, 4)?,
        shipping_cost: decimal_at(row, 5)?,
        total_amount_due: decimal_at(row, 6)?,
        created_at: row.get(7)?,
    })
}

pub(crate) fn metadata_from_row(row: &Row<'_>) -> rusqlite::Result<InvoiceMetadata> {
    Ok(InvoiceMetadata {
        id: row.get(0)?,
        invoice_id: row.get(1)?,
        po_number: row.get(2)?,
        terms_and_conditions: row.get(3)?,
        notes: row.get(4)?,
        custom_fields: document_at(row, 5)?,
        ocr_raw_data: opt_document_at(row, 6)?,
        processing_logs: opt_document_at(row, 7)?,
        created_at: row.get(8)?,
    })
}

pub(crate) fn history_from_row(row: &Row<'_>) -> rusqlite::Result<ProcessingHistory> {
    Ok(ProcessingHistory {
        id: row.get(0)?,
        invoice_id: row.get(1)?,
        action: row.get(2)?,
        status: row.get(3)?,
        details: opt_document_at(row, 4)?,
        performed_by: row.get(5)?,
        performed_at: row.get(6)?,
    })
}
