pub mod ingestion;
pub mod stats;
pub mod store;
