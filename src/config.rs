use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, StoreError};

pub const DATABASE_PATH_ENV: &str = "INVOICE_DB_PATH";
pub const BUSY_TIMEOUT_ENV: &str = "INVOICE_DB_BUSY_TIMEOUT_MS";

const DEFAULT_DATABASE_PATH: &str = "invoices.sqlite";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Where the store lives and how long a connection waits on a locked database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `None` opens an in-memory database.
    pub database_path: Option<PathBuf>,
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: Some(PathBuf::from(DEFAULT_DATABASE_PATH)),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self {
            database_path: None,
            ..Self::default()
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Loads the configuration from `INVOICE_DB_PATH` and
    /// `INVOICE_DB_BUSY_TIMEOUT_MS`, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_path = match lookup(DATABASE_PATH_ENV) {
            Some(raw) => parse_path(&raw),
            None => Some(PathBuf::from(DEFAULT_DATABASE_PATH)),
        };

        let busy_timeout = match lookup(BUSY_TIMEOUT_ENV) {
            Some(raw) => {
                let millis = raw.trim().parse::<u64>().map_err(|e| {
                    StoreError::Config(format!("{}={:?}: {}", BUSY_TIMEOUT_ENV, raw, e))
                })?;
                Duration::from_millis(millis)
            }
            None => Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        };

        Ok(Self {
            database_path,
            busy_timeout,
        })
    }
}

fn parse_path(raw: &str) -> Option<PathBuf> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == ":memory:" {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}
