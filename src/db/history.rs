use rusqlite::{params, Connection};
use tracing::debug;
use uuid::Uuid;

use super::rows::{history_from_row, HISTORY_COLUMNS};
use crate::error::{Result, StoreError};
use crate::models::{NewHistoryEntry, ProcessingHistory};
use crate::utils::{encode_opt_document, now};

/// Appends an audit row. History rows are never updated; they leave only
/// when the owning invoice is deleted.
pub(crate) fn insert_history(
    conn: &Connection,
    invoice_id: Uuid,
    entry: &NewHistoryEntry,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let details = encode_opt_document(entry.details.as_ref())?;
    conn.execute(
        "INSERT INTO processing_history (
            id, invoice_id, action, status, details, performed_by, performed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            invoice_id,
            entry.action,
            entry.status,
            details,
            entry.performed_by,
            now(),
        ],
    )
    .map_err(|e| StoreError::on_dependent_insert(e, invoice_id))?;
    debug!(invoice_id = %invoice_id, action = %entry.action, status = %entry.status, "history appended");
    Ok(id)
}

pub(crate) fn list_history(conn: &Connection, invoice_id: Uuid) -> Result<Vec<ProcessingHistory>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM processing_history WHERE invoice_id = ?1 ORDER BY performed_at, rowid",
        HISTORY_COLUMNS
    ))?;
    let rows = stmt.query_map(params![invoice_id], history_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<ProcessingHistory>>>()?)
}
