use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{
    insert_history, insert_invoice, insert_items, insert_metadata, insert_party, insert_payment,
    insert_summary, Database,
};
use crate::error::Result;
use crate::models::{
    ExtractedInvoice, InvoiceGraph, NewHistoryEntry, NewInvoice, NewInvoiceMetadata,
    NewPaymentInformation, PartyRole, DEFAULT_INVOICE_TYPE,
};
use crate::utils::{normalize_date, now};

pub const INGESTED_STATUS: &str = "PROCESSED";
pub const CREATED_ACTION: &str = "INVOICE_CREATED";
pub const SUCCESS_STATUS: &str = "SUCCESS";
pub const SYSTEM_ACTOR: &str = "system";

/// Persists a whole extracted invoice in one transaction: either every row
/// lands, or none does.
pub fn ingest(db: &mut Database, extracted: &ExtractedInvoice) -> Result<Uuid> {
    let info_block = &extracted.invoice_info;
    let raw_document = serde_json::to_value(extracted)?;

    let tx = db.transaction()?;

    let invoice_id = insert_invoice(
        &tx,
        &NewInvoice {
            invoice_number: info_block.invoice_number.clone(),
            invoice_date: normalize_date(info_block.invoice_date.as_deref()),
            due_date: normalize_date(info_block.due_date.as_deref()),
            invoice_type: Some(
                info_block
                    .invoice_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_INVOICE_TYPE.to_string()),
            ),
            status: Some(INGESTED_STATUS.to_string()),
            total_amount: Some(extracted.summary.total_amount_due),
            currency: None,
            ocr_confidence_score: extracted.confidence_scores.overall,
            source_file_url: extracted.source_file_url.clone(),
            processed_at: Some(now()),
        },
    )?;

    if let Some(seller) = &extracted.seller {
        insert_party(&tx, PartyRole::Seller, invoice_id, seller)?;
    }
    if let Some(buyer) = &extracted.buyer {
        insert_party(&tx, PartyRole::Buyer, invoice_id, buyer)?;
    }

    insert_items(&tx, invoice_id, &extracted.items)?;
    insert_summary(&tx, invoice_id, &extracted.summary)?;

    if let Some(payment) = &extracted.payment {
        insert_payment(
            &tx,
            invoice_id,
            &NewPaymentInformation {
                payment_terms: payment.terms.clone(),
                payment_method: payment.method.clone(),
                bank_account_details: payment.bank_details.clone(),
                ..NewPaymentInformation::default()
            },
        )?;
    }

    insert_metadata(
        &tx,
        invoice_id,
        &NewInvoiceMetadata {
            po_number: info_block.po_number.clone(),
            terms_and_conditions: extracted.additional.terms_and_conditions.clone(),
            notes: extracted.additional.notes.clone(),
            ocr_raw_data: Some(raw_document),
            ..NewInvoiceMetadata::default()
        },
    )?;

    insert_history(
        &tx,
        invoice_id,
        &NewHistoryEntry::new(CREATED_ACTION, SUCCESS_STATUS)
            .with_details(json!({ "source": "OCR_PROCESSING" }))
            .performed_by(SYSTEM_ACTOR),
    )?;

    tx.commit()?;

    info!(
        invoice_id = %invoice_id,
        invoice_number = ?info_block.invoice_number,
        items = extracted.items.len(),
        "extracted invoice stored"
    );
    Ok(invoice_id)
}

/// Tolerance used by `consistency_report`.
pub fn default_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inconsistency {
    /// `expected` is `None` when the arithmetic overflows.
    LineTotal {
        item_id: Uuid,
        expected: Option<Decimal>,
        actual: Decimal,
    },
    AmountDue {
        summary_id: Uuid,
        expected: Option<Decimal>,
        actual: Decimal,
    },
}

/// Lists stored rows whose arithmetic does not add up. Advisory only; the
/// store accepts inconsistent data as extracted.
pub fn consistency_report(graph: &InvoiceGraph, tolerance: Decimal) -> Vec<Inconsistency> {
    let mut found = Vec::new();

    for item in &graph.items {
        if !item.line_total_consistent(tolerance) {
            found.push(Inconsistency::LineTotal {
                item_id: item.id,
                expected: item.expected_line_total(),
                actual: item.line_total,
            });
        }
    }

    for summary in &graph.summaries {
        if !summary.amount_due_consistent(tolerance) {
            found.push(Inconsistency::AmountDue {
                summary_id: summary.id,
                expected: summary.expected_amount_due(),
                actual: summary.total_amount_due,
            });
        }
    }

    if !found.is_empty() {
        warn!(invoice_id = %graph.invoice.id, count = found.len(), "invoice totals do not add up");
    }
    found
}
