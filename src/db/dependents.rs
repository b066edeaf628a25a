use rusqlite::{params, Connection};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::{
    NewInvoiceItem, NewInvoiceMetadata, NewInvoiceSummary, NewPaymentInformation, PartyDetails,
    PartyRole, DEFAULT_PAYMENT_STATUS,
};
use crate::utils::{
    encode_document, encode_opt_document, format_decimal, now, AMOUNT_SCALE, QUANTITY_SCALE,
    RATE_SCALE, UNIT_PRICE_SCALE,
};

fn rejected(err: rusqlite::Error, table: &str, invoice_id: Uuid) -> StoreError {
    let err = StoreError::on_dependent_insert(err, invoice_id);
    warn!(table, invoice_id = %invoice_id, error = %err, "dependent insert rejected");
    err
}

pub(crate) fn insert_party(
    conn: &Connection,
    role: PartyRole,
    invoice_id: Uuid,
    party: &PartyDetails,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let table = role.table();
    conn.execute(
        &format!(
            "INSERT INTO {} (
                id, invoice_id, name, address, contact_information, tax_id, email, phone, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            table
        ),
        params![
            id,
            invoice_id,
            party.name,
            party.address,
            party.contact_information,
            party.tax_id,
            party.email,
            party.phone,
            now(),
        ],
    )
    .map_err(|e| rejected(e, table, invoice_id))?;
    debug!(table, invoice_id = %invoice_id, "party attached");
    Ok(id)
}

/// Inserts items in order. The caller owns the surrounding transaction.
pub(crate) fn insert_items(
    conn: &Connection,
    invoice_id: Uuid,
    items: &[NewInvoiceItem],
) -> Result<Vec<Uuid>> {
    let mut stmt = conn.prepare(
        "INSERT INTO invoice_items (
            id, invoice_id, item_description, item_code, quantity, unit_price,
            discount_percentage, discount_amount, tax_rate, tax_amount, line_total, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )?;

    let mut ids = Vec::with_capacity(items.len());
    for item in items {
        let id = Uuid::new_v4();
        stmt.execute(params![
            id,
            invoice_id,
            item.description,
            item.code,
            format_decimal(item.quantity, QUANTITY_SCALE),
            format_decimal(item.unit_price, UNIT_PRICE_SCALE),
            format_decimal(item.discount_percentage, RATE_SCALE),
            format_decimal(item.discount_amount, AMOUNT_SCALE),
            format_decimal(item.tax_rate, RATE_SCALE),
            format_decimal(item.tax_amount, AMOUNT_SCALE),
            format_decimal(item.line_total, AMOUNT_SCALE),
            now(),
        ])
        .map_err(|e| rejected(e, "invoice_items", invoice_id))?;
        ids.push(id);
    }

    debug!(invoice_id = %invoice_id, count = ids.len(), "items attached");
    Ok(ids)
}

pub(crate) fn insert_payment(
    conn: &Connection,
    invoice_id: Uuid,
    payment: &NewPaymentInformation,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO payment_information (
            id, invoice_id, payment_terms, payment_method, bank_account_details,
            payment_status, paid_amount, payment_date, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id,
            invoice_id,
            payment.payment_terms,
            payment.payment_method,
            payment.bank_account_details,
            payment
                .payment_status
                .as_deref()
                .unwrap_or(DEFAULT_PAYMENT_STATUS),
            format_decimal(payment.paid_amount, AMOUNT_SCALE),
            payment.payment_date,
            now(),
        ],
    )
    .map_err(|e| rejected(e, "payment_information", invoice_id))?;
    Ok(id)
}

pub(crate) fn insert_summary(
    conn: &Connection,
    invoice_id: Uuid,
    summary: &NewInvoiceSummary,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO invoice_summary (
            id, invoice_id, subtotal, total_discount, total_tax, shipping_cost,
            total_amount_due, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            invoice_id,
            format_decimal(summary.subtotal, AMOUNT_SCALE),
            format_decimal(summary.total_discount, AMOUNT_SCALE),
            format_decimal(summary.total_tax, AMOUNT_SCALE),
            format_decimal(summary.shipping_cost, AMOUNT_SCALE),
            format_decimal(summary.total_amount_due, AMOUNT_SCALE),
            now(),
        ],
    )
    .map_err(|e| rejected(e, "invoice_summary", invoice_id))?;
    Ok(id)
}

pub(crate) fn insert_metadata(
    conn: &Connection,
    invoice_id: Uuid,
    metadata: &NewInvoiceMetadata,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let custom_fields = encode_document(&metadata.custom_fields)?;
    let ocr_raw_data = encode_opt_document(metadata.ocr_raw_data.as_ref())?;
    let processing_logs = encode_opt_document(metadata.processing_logs.as_ref())?;
    conn.execute(
        "INSERT INTO invoice_metadata (
            id, invoice_id, po_number, terms_and_conditions, notes,
            custom_fields, ocr_raw_data, processing_logs, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id,
            invoice_id,
            metadata.po_number,
            metadata.terms_and_conditions,
            metadata.notes,
            custom_fields,
            ocr_raw_data,
            processing_logs,
            now(),
        ],
    )
    .map_err(|e| rejected(e, "invoice_metadata", invoice_id))?;
    Ok(id)
}
