use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const DEFAULT_INVOICE_STATUS: &str = "PENDING";
pub const DEFAULT_INVOICE_TYPE: &str = "STANDARD";
pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_PAYMENT_STATUS: &str = "UNPAID";

/// Root row of an invoice graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub invoice_type: String,
    pub status: String,
    pub total_amount: Option<Decimal>,
    pub currency: String,
    pub ocr_confidence_score: Option<Decimal>,
    pub source_file_url: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted by `create_invoice`. `None` picks the column default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewInvoice {
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub invoice_type: Option<String>,
    pub status: Option<String>,
    pub total_amount: Option<Decimal>,
    pub currency: Option<String>,
    pub ocr_confidence_score: Option<Decimal>,
    pub source_file_url: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Contact block shared by sellers and buyers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartyDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub contact_information: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// A stored seller or buyer row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub id: Uuid,
    pub invoice_id: Uuid,
    #[serde(flatten)]
    pub details: PartyDetails,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyRole {
    Seller,
    Buyer,
}

impl PartyRole {
    pub(crate) fn table(self) -> &'static str {
        match self {
            PartyRole::Seller => "sellers",
            PartyRole::Buyer => "buyers",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewInvoiceItem {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount_percentage: Decimal,
    #[serde(default)]
    pub discount_amount: Decimal,
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub tax_amount: Decimal,
    #[serde(default)]
    pub line_total: Decimal,
}

impl NewInvoiceItem {
    /// `quantity * unit_price - discount_amount + tax_amount`, or `None` when
    /// the result does not fit in a `Decimal`.
    pub fn expected_line_total(&self) -> Option<Decimal> {
        line_total(self.quantity, self.unit_price, self.discount_amount, self.tax_amount)
    }
}

fn line_total(
    quantity: Decimal,
    unit_price: Decimal,
    discount_amount: Decimal,
    tax_amount: Decimal,
) -> Option<Decimal> {
    quantity
        .checked_mul(unit_price)?
        .checked_sub(discount_amount)?
        .checked_add(tax_amount)
}

/// `|actual - expected| <= tolerance`; an uncomputable expectation never matches.
fn within(actual: Decimal, expected: Option<Decimal>, tolerance: Decimal) -> bool {
    expected
        .and_then(|expected| actual.checked_sub(expected))
        .map_or(false, |delta| delta.abs() <= tolerance)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub description: Option<String>,
    pub code: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount_percentage: Decimal,
    pub discount_amount: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub line_total: Decimal,
    pub created_at: DateTime<Utc>,
}

impl InvoiceItem {
    pub fn expected_line_total(&self) -> Option<Decimal> {
        line_total(self.quantity, self.unit_price, self.discount_amount, self.tax_amount)
    }

    pub fn line_total_consistent(&self, tolerance: Decimal) -> bool {
        within(self.line_total, self.expected_line_total(), tolerance)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPaymentInformation {
    #[serde(default)]
    pub payment_terms: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub bank_account_details: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub paid_amount: Decimal,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInformation {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub payment_terms: Option<String>,
    pub payment_method: Option<String>,
    pub bank_account_details: Option<String>,
    pub payment_status: String,
    pub paid_amount: Decimal,
    pub payment_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewInvoiceSummary {
    #[serde(default)]
    pub subtotal: Decimal,
    #[serde(default)]
    pub total_discount: Decimal,
    #[serde(default)]
    pub total_tax: Decimal,
    #[serde(default)]
    pub shipping_cost: Decimal,
    #[serde(default)]
    pub total_amount_due: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub subtotal: Decimal,
    pub total_discount: Decimal,
    pub total_tax: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount_due: Decimal,
    pub created_at: DateTime<Utc>,
}

impl InvoiceSummary {
    /// `subtotal - total_discount + total_tax + shipping_cost`
    pub fn expected_amount_due(&self) -> Option<Decimal> {
        self.subtotal
            .checked_sub(self.total_discount)?
            .checked_add(self.total_tax)?
            .checked_add(self.shipping_cost)
    }

    pub fn amount_due_consistent(&self, tolerance: Decimal) -> bool {
        within(self.total_amount_due, self.expected_amount_due(), tolerance)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInvoiceMetadata {
    pub po_number: Option<String>,
    pub terms_and_conditions: Option<String>,
    pub notes: Option<String>,
    pub custom_fields: Value,
    pub ocr_raw_data: Option<Value>,
    pub processing_logs: Option<Value>,
}

impl Default for NewInvoiceMetadata {
    fn default() -> Self {
        NewInvoiceMetadata {
            po_number: None,
            terms_and_conditions: None,
            notes: None,
            custom_fields: Value::Object(Default::default()),
            ocr_raw_data: None,
            processing_logs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceMetadata {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub po_number: Option<String>,
    pub terms_and_conditions: Option<String>,
    pub notes: Option<String>,
    pub custom_fields: Value,
    pub ocr_raw_data: Option<Value>,
    pub processing_logs: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHistoryEntry {
    pub action: String,
    pub status: String,
    pub details: Option<Value>,
    pub performed_by: Option<String>,
}

impl NewHistoryEntry {
    pub fn new(action: impl Into<String>, status: impl Into<String>) -> Self {
        NewHistoryEntry {
            action: action.into(),
            status: status.into(),
            details: None,
            performed_by: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn performed_by(mut self, actor: impl Into<String>) -> Self {
        self.performed_by = Some(actor.into());
        self
    }
}

/// Append-only audit row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingHistory {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub action: String,
    pub status: String,
    pub details: Option<Value>,
    pub performed_by: Option<String>,
    pub performed_at: DateTime<Utc>,
}

/// An invoice with every dependent row and its history.
///
/// Sellers, buyers, payments, summaries and metadata are one per invoice by
/// convention only, so they are carried as lists; the singular accessors
/// return the first row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceGraph {
    pub invoice: Invoice,
    pub sellers: Vec<Party>,
    pub buyers: Vec<Party>,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<PaymentInformation>,
    pub summaries: Vec<InvoiceSummary>,
    pub metadata: Vec<InvoiceMetadata>,
    pub history: Vec<ProcessingHistory>,
}

impl InvoiceGraph {
    pub fn seller(&self) -> Option<&Party> {
        self.sellers.first()
    }

    pub fn buyer(&self) -> Option<&Party> {
        self.buyers.first()
    }

    pub fn payment(&self) -> Option<&PaymentInformation> {
        self.payments.first()
    }

    pub fn summary(&self) -> Option<&InvoiceSummary> {
        self.summaries.first()
    }

    pub fn meta(&self) -> Option<&InvoiceMetadata> {
        self.metadata.first()
    }

    /// Ids of the owning invoice as recorded on every dependent row.
    pub fn dependent_invoice_ids(&self) -> Vec<Uuid> {
        self.sellers
            .iter()
            .map(|p| p.invoice_id)
            .chain(self.buyers.iter().map(|p| p.invoice_id))
            .chain(self.items.iter().map(|i| i.invoice_id))
            .chain(self.payments.iter().map(|p| p.invoice_id))
            .chain(self.summaries.iter().map(|s| s.invoice_id))
            .chain(self.metadata.iter().map(|m| m.invoice_id))
            .chain(self.history.iter().map(|h| h.invoice_id))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceFilter {
    pub status: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: usize,
}

impl Default for InvoiceFilter {
    fn default() -> Self {
        InvoiceFilter {
            status: None,
            date_from: None,
            date_to: None,
            limit: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyerTotal {
    pub name: Option<String>,
    pub invoice_count: i64,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceStatistics {
    pub total_invoices: i64,
    pub total_amount: Decimal,
    pub average_confidence: Option<Decimal>,
    pub status_distribution: Vec<StatusCount>,
    pub recent_invoices: Vec<Invoice>,
    pub top_buyers: Vec<BuyerTotal>,
}

/// Header block of an extracted invoice document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedInvoiceInfo {
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub invoice_date: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub invoice_type: Option<String>,
    #[serde(default)]
    pub po_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPayment {
    #[serde(default)]
    pub terms: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub bank_details: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedAdditional {
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub terms_and_conditions: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScores {
    #[serde(default)]
    pub overall: Option<Decimal>,
}

/// The document an upstream extraction step hands over for persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedInvoice {
    #[serde(default)]
    pub invoice_info: ExtractedInvoiceInfo,
    #[serde(default)]
    pub seller: Option<PartyDetails>,
    #[serde(default)]
    pub buyer: Option<PartyDetails>,
    #[serde(default)]
    pub items: Vec<NewInvoiceItem>,
    #[serde(default)]
    pub summary: NewInvoiceSummary,
    #[serde(default)]
    pub payment: Option<ExtractedPayment>,
    #[serde(default)]
    pub additional: ExtractedAdditional,
    #[serde(default)]
    pub confidence_scores: ConfidenceScores,
    #[serde(default)]
    pub source_file_url: Option<String>,
}
