use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};
use uuid::Uuid;

use super::history::list_history;
use super::rows::{
    invoice_from_row, item_from_row, metadata_from_row, party_from_row, payment_from_row,
    summary_from_row, INVOICE_COLUMNS, ITEM_COLUMNS, METADATA_COLUMNS, PARTY_COLUMNS,
    PAYMENT_COLUMNS, SUMMARY_COLUMNS,
};
use crate::error::{Result, StoreError};
use crate::models::{
    Invoice, InvoiceFilter, InvoiceGraph, NewInvoice, DEFAULT_CURRENCY, DEFAULT_INVOICE_STATUS,
    DEFAULT_INVOICE_TYPE,
};
use crate::utils::{format_decimal, now, AMOUNT_SCALE, RATE_SCALE};

pub(crate) fn insert_invoice(conn: &Connection, invoice: &NewInvoice) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let timestamp = now();

    conn.execute(
        &format!(
            "INSERT INTO invoices ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            INVOICE_COLUMNS
        ),
        params![
            id,
            invoice.invoice_number,
            invoice.invoice_date,
            invoice.due_date,
            invoice.invoice_type.as_deref().unwrap_or(DEFAULT_INVOICE_TYPE),
            invoice.status.as_deref().unwrap_or(DEFAULT_INVOICE_STATUS),
            invoice.total_amount.map(|v| format_decimal(v, AMOUNT_SCALE)),
            invoice.currency.as_deref().unwrap_or(DEFAULT_CURRENCY),
            invoice.ocr_confidence_score.map(|v| format_decimal(v, RATE_SCALE)),
            invoice.source_file_url,
            invoice.processed_at,
            timestamp,
            timestamp,
        ],
    )
    .map_err(|e| {
        let err = StoreError::on_root_insert(e, invoice.invoice_number.as_deref());
        warn!(error = %err, "invoice insert rejected");
        err
    })?;

    debug!(invoice_id = %id, invoice_number = ?invoice.invoice_number, "invoice created");
    Ok(id)
}

pub(crate) fn id_for_number(conn: &Connection, invoice_number: &str) -> Result<Option<Uuid>> {
    Ok(conn
        .query_row(
            "SELECT id FROM invoices WHERE invoice_number = ?1",
            params![invoice_number],
            |row| row.get(0),
        )
        .optional()?)
}

fn get_root(conn: &Connection, id: Uuid) -> Result<Invoice> {
    conn.query_row(
        &format!("SELECT {} FROM invoices WHERE id = ?1", INVOICE_COLUMNS),
        params![id],
        invoice_from_row,
    )
    .optional()?
    .ok_or(StoreError::NotFound(id))
}

fn children<T>(
    conn: &Connection,
    table: &str,
    columns: &str,
    order_by: &str,
    invoice_id: Uuid,
    map: fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {} WHERE invoice_id = ?1 ORDER BY {}",
        columns, table, order_by
    ))?;
    let rows = stmt.query_map(params![invoice_id], map)?;
    Ok(rows.collect::<rusqlite::Result<Vec<T>>>()?)
}

/// Reads the root row and every dependent. Callers wrap this in a
/// transaction so the graph comes from one snapshot.
pub(crate) fn load_graph(conn: &Connection, id: Uuid) -> Result<InvoiceGraph> {
    let invoice = get_root(conn, id)?;

    Ok(InvoiceGraph {
        sellers: children(conn, "sellers", PARTY_COLUMNS, "created_at, rowid", id, party_from_row)?,
        buyers: children(conn, "buyers", PARTY_COLUMNS, "created_at, rowid", id, party_from_row)?,
        items: children(conn, "invoice_items", ITEM_COLUMNS, "rowid", id, item_from_row)?,
        payments: children(
            conn,
            "payment_information",
            PAYMENT_COLUMNS,
            "created_at, rowid",
            id,
            payment_from_row,
        )?,
        summaries: children(
            conn,
            "invoice_summary",
            SUMMARY_COLUMNS,
            "created_at, rowid",
            id,
            summary_from_row,
        )?,
        metadata: children(
            conn,
            "invoice_metadata",
            METADATA_COLUMNS,
            "created_at, rowid",
            id,
            metadata_from_row,
        )?,
        history: list_history(conn, id)?,
        invoice,
    })
}

pub(crate) fn list_invoices(conn: &Connection, filter: &InvoiceFilter) -> Result<Vec<Invoice>> {
    let limit = i64::try_from(filter.limit).unwrap_or(i64::MAX);
    let mut clauses = Vec::new();
    let mut values: Vec<&dyn ToSql> = Vec::new();

    if let Some(status) = &filter.status {
        values.push(status);
        clauses.push(format!("status = ?{}", values.len()));
    }
    if let Some(from) = &filter.date_from {
        values.push(from);
        clauses.push(format!("invoice_date >= ?{}", values.len()));
    }
    if let Some(to) = &filter.date_to {
        values.push(to);
        clauses.push(format!("invoice_date <= ?{}", values.len()));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    values.push(&limit);

    let sql = format!(
        "SELECT {} FROM invoices {} ORDER BY invoice_date DESC, created_at DESC LIMIT ?{}",
        INVOICE_COLUMNS,
        where_clause,
        values.len()
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(values.as_slice(), invoice_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<Invoice>>>()?)
}

pub(crate) fn delete_invoice(conn: &Connection, id: Uuid) -> Result<()> {
    let removed = conn.execute("DELETE FROM invoices WHERE id = ?1", params![id])?;
    if removed == 0 {
        return Err(StoreError::NotFound(id));
    }
    debug!(invoice_id = %id, "invoice deleted");
    Ok(())
}

pub(crate) fn update_status(conn: &Connection, id: Uuid, status: &str) -> Result<()> {
    let updated = conn.execute(
        "UPDATE invoices SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status, now(), id],
    )?;
    if updated == 0 {
        return Err(StoreError::NotFound(id));
    }
    debug!(invoice_id = %id, status, "invoice status updated");
    Ok(())
}
