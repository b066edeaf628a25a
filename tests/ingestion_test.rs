//! Whole-graph ingestion, statistics and shared-handle behaviour.

mod common;

use std::thread;

use common::{dec, init_tracing};
use invoice_store::models::{ExtractedInvoice, InvoiceFilter};
use invoice_store::services::ingestion::{default_tolerance, CREATED_ACTION, INGESTED_STATUS};
use invoice_store::{consistency_report, InvoiceStore, StoreConfig, StoreError};
use serde_json::json;

fn extracted(number: &str, buyer: &str, total: &str) -> ExtractedInvoice {
    serde_json::from_value(json!({
        "invoice_info": {
            "invoice_number": number,
            "invoice_date": "2024-04-01",
            "due_date": "01.05.2024",
            "po_number": "PO-12"
        },
        "seller": { "name": "Acme Supplies", "tax_id": "DE123456789" },
        "buyer": { "name": buyer, "email": "ap@example.com" },
        "items": [
            {
                "description": "Paper",
                "code": "P-500",
                "quantity": 4,
                "unit_price": "2.5000",
                "tax_rate": 10,
                "tax_amount": "1.00",
                "line_total": "11.00"
            }
        ],
        "summary": {
            "subtotal": "10.00",
            "total_tax": "1.00",
            "total_amount_due": total
        },
        "payment": { "terms": "NET 15", "method": "CARD" },
        "additional": { "notes": "Leave at reception" },
        "confidence_scores": { "overall": 88.5 },
        "source_file_url": "s3://invoices/scan.png"
    }))
    .expect("extracted document")
}

#[test]
fn ingest_persists_the_whole_graph() {
    init_tracing();
    let store = InvoiceStore::open_in_memory().unwrap();

    let id = store.ingest(&extracted("ACME-1", "Globex", "11.00")).unwrap();
    let graph = store.get_invoice(id).unwrap();

    assert_eq!(graph.invoice.status, INGESTED_STATUS);
    assert_eq!(graph.invoice.total_amount, Some(dec("11.00")));
    assert_eq!(graph.invoice.ocr_confidence_score, Some(dec("88.50")));
    assert_eq!(graph.invoice.due_date.unwrap().to_string(), "2024-05-01");
    assert_eq!(graph.seller().unwrap().details.tax_id.as_deref(), Some("DE123456789"));
    assert_eq!(graph.buyer().unwrap().details.name.as_deref(), Some("Globex"));
    assert_eq!(graph.items.len(), 1);
    assert_eq!(graph.items[0].unit_price, dec("2.5"));
    assert_eq!(graph.payment().unwrap().payment_method.as_deref(), Some("CARD"));
    assert_eq!(graph.payment().unwrap().payment_status, "UNPAID");

    let meta = graph.meta().unwrap();
    assert_eq!(meta.po_number.as_deref(), Some("PO-12"));
    assert_eq!(meta.notes.as_deref(), Some("Leave at reception"));
    let raw = meta.ocr_raw_data.as_ref().unwrap();
    assert_eq!(raw["invoice_info"]["invoice_number"], json!("ACME-1"));

    assert_eq!(graph.history.len(), 1);
    assert_eq!(graph.history[0].action, CREATED_ACTION);
    assert_eq!(graph.history[0].details, Some(json!({ "source": "OCR_PROCESSING" })));

    assert!(consistency_report(&graph, default_tolerance()).is_empty());
    assert!(graph.dependent_invoice_ids().iter().all(|owner| *owner == id));
}

#[test]
fn failed_ingest_leaves_no_rows_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("atomic.sqlite");
    let store = InvoiceStore::open(&StoreConfig::at(&path)).unwrap();

    store.ingest(&extracted("ACME-2", "Globex", "11.00")).unwrap();
    let err = store
        .ingest(&extracted("ACME-2", "Initech", "11.00"))
        .unwrap_err();
    assert!(matches!(err, StoreError::UniqueConstraintViolation(ref n) if n == "ACME-2"));

    let conn = rusqlite::Connection::open(&path).unwrap();
    for table in ["invoices", "buyers", "invoice_items", "processing_history"] {
        let rows: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1, "{} has leftover rows", table);
    }
}

#[test]
fn statistics_sum_exactly_and_rank_buyers() {
    let store = InvoiceStore::open_in_memory().unwrap();
    store.ingest(&extracted("S-1", "Globex", "0.10")).unwrap();
    store.ingest(&extracted("S-2", "Globex", "0.20")).unwrap();
    let initech = store.ingest(&extracted("S-3", "Initech", "100.00")).unwrap();
    store.update_status(initech, "PAID").unwrap();

    let stats = store.statistics().unwrap();
    assert_eq!(stats.total_invoices, 3);
    assert_eq!(stats.total_amount, dec("100.30"));
    assert_eq!(stats.average_confidence, Some(dec("88.50")));

    assert_eq!(stats.status_distribution.len(), 2);
    assert_eq!(stats.status_distribution[0].status, INGESTED_STATUS);
    assert_eq!(stats.status_distribution[0].count, 2);
    assert_eq!(stats.status_distribution[1].status, "PAID");

    assert_eq!(stats.recent_invoices.len(), 3);
    assert_eq!(stats.recent_invoices[0].invoice_number.as_deref(), Some("S-3"));

    assert_eq!(stats.top_buyers.len(), 2);
    assert_eq!(stats.top_buyers[0].name.as_deref(), Some("Initech"));
    assert_eq!(stats.top_buyers[1].invoice_count, 2);
    assert_eq!(stats.top_buyers[1].total_amount, dec("0.30"));
}

#[test]
fn statistics_on_empty_store() {
    let store = InvoiceStore::open_in_memory().unwrap();
    let stats = store.statistics().unwrap();
    assert_eq!(stats.total_invoices, 0);
    assert_eq!(stats.total_amount, dec("0"));
    assert_eq!(stats.average_confidence, None);
    assert!(stats.status_distribution.is_empty());
    assert!(stats.top_buyers.is_empty());
}

#[test]
fn separate_handles_on_one_file_serialize_writes() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::at(dir.path().join("shared.sqlite"));

    let writers: Vec<_> = (0..3)
        .map(|writer| {
            let config = config.clone();
            thread::spawn(move || {
                let store = InvoiceStore::open(&config).unwrap();
                for n in 0..10 {
                    let number = format!("W{}-{}", writer, n);
                    store.ingest(&extracted(&number, "Globex", "1.00")).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let store = InvoiceStore::open(&config).unwrap();
    let all = store
        .list_invoices(&InvoiceFilter {
            limit: 100,
            ..InvoiceFilter::default()
        })
        .unwrap();
    assert_eq!(all.len(), 30);
}

#[test]
fn statistics_report_overflow_instead_of_panicking() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huge.sqlite");
    let store = InvoiceStore::open(&StoreConfig::at(&path)).unwrap();
    store.ingest(&extracted("H-1", "Globex", "1.00")).unwrap();
    store.ingest(&extracted("H-2", "Globex", "1.00")).unwrap();

    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute(
        "UPDATE invoices SET total_amount = '50000000000000000000000000000'",
        [],
    )
    .unwrap();

    let err = store.statistics().unwrap_err();
    assert!(matches!(err, StoreError::Overflow("total_amount")), "{:?}", err);
}

#[test]
fn statistics_come_from_a_single_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::at(dir.path().join("snapshot.sqlite"));
    let reader = InvoiceStore::open(&config).unwrap();

    let writers: Vec<_> = (0..2)
        .map(|writer| {
            let config = config.clone();
            thread::spawn(move || {
                let store = InvoiceStore::open(&config).unwrap();
                for n in 0..15 {
                    let number = format!("R{}-{}", writer, n);
                    store.ingest(&extracted(&number, "Globex", "1.00")).unwrap();
                }
            })
        })
        .collect();

    for _ in 0..20 {
        let stats = reader.statistics().unwrap();
        let by_status: i64 = stats.status_distribution.iter().map(|s| s.count).sum();
        assert_eq!(by_status, stats.total_invoices);
        assert_eq!(stats.total_amount, dec(&format!("{}.00", stats.total_invoices)));
        if stats.total_invoices > 0 {
            assert_eq!(stats.top_buyers[0].invoice_count, stats.total_invoices);
        }
    }

    for writer in writers {
        writer.join().unwrap();
    }
    assert_eq!(reader.statistics().unwrap().total_invoices, 30);
}
