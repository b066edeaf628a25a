use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::config::StoreConfig;
use crate::db::Database;
use crate::error::{Result, StoreError};
use crate::models::{
    ExtractedInvoice, Invoice, InvoiceFilter, InvoiceGraph, InvoiceStatistics, NewHistoryEntry,
    NewInvoice, NewInvoiceItem, NewInvoiceMetadata, NewInvoiceSummary, NewPaymentInformation,
    PartyDetails, ProcessingHistory,
};
use crate::services::{ingestion, stats};

/// Cloneable handle to one database connection, shared across threads.
///
/// Every call holds the lock for a single logical operation. Separate
/// handles opened on the same file are arbitrated by SQLite's own locking.
#[derive(Clone)]
pub struct InvoiceStore {
    db: Arc<Mutex<Database>>,
}

impl InvoiceStore {
    pub fn new(db: Database) -> Self {
        InvoiceStore {
            db: Arc::new(Mutex::new(db)),
        }
    }

    pub fn open(config: &StoreConfig) -> Result<Self> {
        Ok(Self::new(Database::open(config)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db.lock().map_err(|_| StoreError::LockPoisoned)
    }

    pub fn ping(&self) -> Result<()> {
        self.lock()?.ping()
    }

    pub fn create_invoice(&self, invoice: &NewInvoice) -> Result<Uuid> {
        self.lock()?.create_invoice(invoice)
    }

    pub fn attach_seller(&self, invoice_id: Uuid, seller: &PartyDetails) -> Result<Uuid> {
        self.lock()?.attach_seller(invoice_id, seller)
    }

    pub fn attach_buyer(&self, invoice_id: Uuid, buyer: &PartyDetails) -> Result<Uuid> {
        self.lock()?.attach_buyer(invoice_id, buyer)
    }

    pub fn attach_items(&self, invoice_id: Uuid, items: &[NewInvoiceItem]) -> Result<Vec<Uuid>> {
        self.lock()?.attach_items(invoice_id, items)
    }

    pub fn attach_payment(&self, invoice_id: Uuid, payment: &NewPaymentInformation) -> Result<Uuid> {
        self.lock()?.attach_payment(invoice_id, payment)
    }

    pub fn attach_summary(&self, invoice_id: Uuid, summary: &NewInvoiceSummary) -> Result<Uuid> {
        self.lock()?.attach_summary(invoice_id, summary)
    }

    pub fn attach_metadata(&self, invoice_id: Uuid, metadata: &NewInvoiceMetadata) -> Result<Uuid> {
        self.lock()?.attach_metadata(invoice_id, metadata)
    }

    pub fn append_history(&self, invoice_id: Uuid, entry: &NewHistoryEntry) -> Result<Uuid> {
        self.lock()?.append_history(invoice_id, entry)
    }

    pub fn history(&self, invoice_id: Uuid) -> Result<Vec<ProcessingHistory>> {
        self.lock()?.history(invoice_id)
    }

    pub fn get_invoice(&self, id: Uuid) -> Result<InvoiceGraph> {
        self.lock()?.get_invoice(id)
    }

    pub fn find_invoice_by_number(&self, invoice_number: &str) -> Result<Option<InvoiceGraph>> {
        self.lock()?.find_invoice_by_number(invoice_number)
    }

    pub fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>> {
        self.lock()?.list_invoices(filter)
    }

    pub fn delete_invoice(&self, id: Uuid) -> Result<()> {
        self.lock()?.delete_invoice(id)
    }

    pub fn update_status(&self, id: Uuid, status: &str) -> Result<()> {
        self.lock()?.update_status(id, status)
    }

    pub fn ingest(&self, extracted: &ExtractedInvoice) -> Result<Uuid> {
        let mut db = self.lock()?;
        ingestion::ingest(&mut db, extracted)
    }

    pub fn statistics(&self) -> Result<InvoiceStatistics> {
        let mut db = self.lock()?;
        stats::invoice_statistics(&mut db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn handles_share_one_database_across_threads() {
        let store = InvoiceStore::open_in_memory().unwrap();

        let workers: Vec<_> = (0..4)
            .map(|n| {
                let store = store.clone();
                thread::spawn(move || {
                    store
                        .create_invoice(&NewInvoice {
                            invoice_number: Some(format!("T-{}", n)),
                            ..NewInvoice::default()
                        })
                        .unwrap()
                })
            })
            .collect();

        let ids: Vec<Uuid> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        for id in ids {
            assert!(store.get_invoice(id).is_ok());
        }
        assert_eq!(store.list_invoices(&InvoiceFilter::default()).unwrap().len(), 4);
    }
}
