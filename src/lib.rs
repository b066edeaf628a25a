//! Relational store for invoices extracted by an upstream OCR step.
//!
//! An invoice is the root of a graph of sellers, buyers, line items, payment
//! information, summaries, metadata and an append-only processing history.
//! Every dependent row is owned by exactly one invoice and is removed with it.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::StoreConfig;
pub use db::Database;
pub use error::{Result, StoreError};
pub use services::ingestion::{consistency_report, ingest, Inconsistency};
pub use services::stats::invoice_statistics;
pub use services::store::InvoiceStore;
