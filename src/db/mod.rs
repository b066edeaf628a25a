mod dependents;
mod history;
mod invoices;
mod rows;

use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::models::{
    Invoice, InvoiceFilter, InvoiceGraph, NewHistoryEntry, NewInvoice, NewInvoiceItem,
    NewInvoiceMetadata, NewInvoiceSummary, NewPaymentInformation, PartyDetails, PartyRole,
    ProcessingHistory,
};
use crate::utils::now;

pub(crate) use dependents::{
    insert_items, insert_metadata, insert_party, insert_payment, insert_summary,
};
pub(crate) use history::insert_history;
pub(crate) use invoices::{insert_invoice, load_graph};
pub(crate) use rows::{decimal_at, invoice_from_row, INVOICE_COLUMNS};

struct Migration {
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "001_create_invoices.sql",
        sql: include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/migrations/001_create_invoices.sql")),
    },
    Migration {
        name: "002_create_indexes.sql",
        sql: include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/migrations/002_create_indexes.sql")),
    },
];

/// A single connection to the invoice database with the schema applied.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        Self::open(&StoreConfig::at(db_path))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(&StoreConfig::in_memory())
    }

    pub fn open(config: &StoreConfig) -> Result<Self> {
        let conn = match &config.database_path {
            Some(path) => {
                debug!(path = %path.display(), "opening invoice database");
                Connection::open(path)?
            }
            None => Connection::open_in_memory()?,
        };
        Self::from_connection(conn, config.busy_timeout)
    }

    fn from_connection(conn: Connection, busy_timeout: Duration) -> Result<Self> {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let mut db = Database { conn };
        db.run_migrations()?;
        Ok(db)
    }

    /// Brings the schema up to date. The applied set is read under the write
    /// lock, so connections racing to open a fresh file apply each migration
    /// exactly once.
    fn run_migrations(&mut self) -> Result<()> {
        let tx = self.transaction()?;
        tx.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL
            );",
        )?;

        let applied = {
            let mut stmt = tx.prepare("SELECT name FROM schema_migrations")?;
            let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
            names.collect::<rusqlite::Result<HashSet<String>>>()?
        };

        let pending: Vec<&Migration> = MIGRATIONS
            .iter()
            .filter(|m| !applied.contains(m.name))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        for migration in &pending {
            tx.execute_batch(migration.sql)?;
            tx.execute(
                "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, ?2)",
                params![migration.name, now()],
            )?;
        }
        tx.commit()?;

        for migration in pending {
            info!(migration = migration.name, "applied schema migration");
        }
        Ok(())
    }

    pub fn applied_migrations(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM schema_migrations ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    /// Round-trips a trivial statement; used as a health check.
    pub fn ping(&self) -> Result<()> {
        self.conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// Write transaction; `BEGIN IMMEDIATE` takes the write lock before the
    /// first statement runs.
    pub(crate) fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    /// Read transaction; every statement inside sees the same committed state.
    pub(crate) fn snapshot(&mut self) -> Result<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }

    pub fn create_invoice(&self, invoice: &NewInvoice) -> Result<Uuid> {
        insert_invoice(&self.conn, invoice)
    }

    pub fn attach_seller(&self, invoice_id: Uuid, seller: &PartyDetails) -> Result<Uuid> {
        insert_party(&self.conn, PartyRole::Seller, invoice_id, seller)
    }

    pub fn attach_buyer(&self, invoice_id: Uuid, buyer: &PartyDetails) -> Result<Uuid> {
        insert_party(&self.conn, PartyRole::Buyer, invoice_id, buyer)
    }

    /// Inserts every item or none of them.
    pub fn attach_items(&mut self, invoice_id: Uuid, items: &[NewInvoiceItem]) -> Result<Vec<Uuid>> {
        let tx = self.transaction()?;
        let ids = insert_items(&tx, invoice_id, items)?;
        tx.commit()?;
        Ok(ids)
    }

    pub fn attach_payment(&self, invoice_id: Uuid, payment: &NewPaymentInformation) -> Result<Uuid> {
        insert_payment(&self.conn, invoice_id, payment)
    }

    pub fn attach_summary(&self, invoice_id: Uuid, summary: &NewInvoiceSummary) -> Result<Uuid> {
        insert_summary(&self.conn, invoice_id, summary)
    }

    pub fn attach_metadata(&self, invoice_id: Uuid, metadata: &NewInvoiceMetadata) -> Result<Uuid> {
        insert_metadata(&self.conn, invoice_id, metadata)
    }

    pub fn append_history(&self, invoice_id: Uuid, entry: &NewHistoryEntry) -> Result<Uuid> {
        insert_history(&self.conn, invoice_id, entry)
    }

    pub fn history(&self, invoice_id: Uuid) -> Result<Vec<ProcessingHistory>> {
        history::list_history(&self.conn, invoice_id)
    }

    /// Loads the invoice and all of its dependents from one snapshot.
    pub fn get_invoice(&mut self, id: Uuid) -> Result<InvoiceGraph> {
        let tx = self.snapshot()?;
        let graph = load_graph(&tx, id)?;
        tx.commit()?;
        Ok(graph)
    }

    pub fn find_invoice_by_number(&mut self, invoice_number: &str) -> Result<Option<InvoiceGraph>> {
        let tx = self.snapshot()?;
        let id = invoices::id_for_number(&tx, invoice_number)?;
        let graph = match id {
            Some(id) => Some(load_graph(&tx, id)?),
            None => None,
        };
        tx.commit()?;
        Ok(graph)
    }

    pub fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>> {
        invoices::list_invoices(&self.conn, filter)
    }

    /// Deletes the invoice; the schema cascades to dependents and history.
    pub fn delete_invoice(&self, id: Uuid) -> Result<()> {
        invoices::delete_invoice(&self.conn, id)
    }

    /// Overwrites `status` and bumps `updated_at`. Any string is accepted.
    pub fn update_status(&self, id: Uuid, status: &str) -> Result<()> {
        invoices::update_status(&self.conn, id, status)
    }
}
