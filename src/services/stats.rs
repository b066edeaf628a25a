use std::collections::BTreeMap;

use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::db::{decimal_at, invoice_from_row, Database, INVOICE_COLUMNS};
use crate::error::{Result, StoreError};
use crate::models::{BuyerTotal, Invoice, InvoiceStatistics, StatusCount};
use crate::utils::RATE_SCALE;

const RECENT_LIMIT: usize = 5;
const TOP_BUYERS_LIMIT: usize = 5;

/// Aggregates over the whole store, read from one snapshot so every figure
/// reflects the same commit. Amounts are summed as decimals in process rather
/// than with SQL floating point.
pub fn invoice_statistics(db: &mut Database) -> Result<InvoiceStatistics> {
    let tx = db.snapshot()?;

    let total_invoices: i64 = tx.query_row("SELECT COUNT(*) FROM invoices", [], |row| row.get(0))?;

    let total_amount = checked_sum(decimal_column(&tx, "total_amount")?, "total_amount")?;

    let scores = decimal_column(&tx, "ocr_confidence_score")?;
    let average_confidence = if scores.is_empty() {
        None
    } else {
        let count = Decimal::from(scores.len() as i64);
        let sum = checked_sum(scores, "ocr_confidence_score")?;
        Some((sum / count).round_dp(RATE_SCALE))
    };

    let status_distribution = {
        let mut stmt = tx.prepare(
            "SELECT status, COUNT(*) FROM invoices GROUP BY status ORDER BY COUNT(*) DESC, status",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StatusCount {
                status: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    let recent_invoices = {
        let mut stmt = tx.prepare(&format!(
            "SELECT {} FROM invoices ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            INVOICE_COLUMNS
        ))?;
        let rows = stmt.query_map([RECENT_LIMIT as i64], invoice_from_row)?;
        rows.collect::<rusqlite::Result<Vec<Invoice>>>()?
    };

    let top_buyers = top_buyers(&tx)?;
    tx.commit()?;

    Ok(InvoiceStatistics {
        total_invoices,
        total_amount,
        average_confidence,
        status_distribution,
        recent_invoices,
        top_buyers,
    })
}

fn checked_sum(values: Vec<Decimal>, column: &'static str) -> Result<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, value| acc.checked_add(value))
        .ok_or(StoreError::Overflow(column))
}

fn decimal_column(conn: &Connection, column: &str) -> Result<Vec<Decimal>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {0} FROM invoices WHERE {0} IS NOT NULL",
        column
    ))?;
    let values = stmt
        .query_map([], |row| decimal_at(row, 0))?
        .collect::<rusqlite::Result<Vec<Decimal>>>()?;
    Ok(values)
}

fn top_buyers(conn: &Connection) -> Result<Vec<BuyerTotal>> {
    let mut stmt = conn.prepare(
        "SELECT b.name, COALESCE(i.total_amount, '0')
         FROM buyers b
         JOIN invoices i ON b.invoice_id = i.id",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, Option<String>>(0)?, decimal_at(row, 1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut grouped: BTreeMap<Option<String>, (i64, Decimal)> = BTreeMap::new();
    for (name, amount) in rows {
        let entry = grouped.entry(name).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 = entry
            .1
            .checked_add(amount)
            .ok_or(StoreError::Overflow("buyer total_amount"))?;
    }

    let mut totals: Vec<BuyerTotal> = grouped
        .into_iter()
        .map(|(name, (invoice_count, total_amount))| BuyerTotal {
            name,
            invoice_count,
            total_amount,
        })
        .collect();
    totals.sort_by(|a, b| b.total_amount.cmp(&a.total_amount).then_with(|| a.name.cmp(&b.name)));
    totals.truncate(TOP_BUYERS_LIMIT);
    Ok(totals)
}
