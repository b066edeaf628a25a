use rusqlite::ffi;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invoice number already exists: {0}")]
    UniqueConstraintViolation(String),

    #[error("Invoice does not exist: {0}")]
    ForeignKeyViolation(Uuid),

    #[error("Invoice not found: {0}")]
    NotFound(Uuid),

    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error("Stored value could not be decoded: {0}")]
    Decode(#[source] rusqlite::Error),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] rusqlite::Error),

    #[error("Document encoding failed: {0}")]
    Document(#[from] serde_json::Error),

    #[error("Decimal overflow while aggregating {0}")]
    Overflow(&'static str),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConstraintKind {
    Unique,
    ForeignKey,
    Other,
}

pub(crate) fn constraint_kind(err: &rusqlite::Error) -> Option<ConstraintKind> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ffi::ErrorCode::ConstraintViolation => {
            Some(match e.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE => ConstraintKind::Unique,
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ConstraintKind::ForeignKey,
                _ => ConstraintKind::Other,
            })
        }
        _ => None,
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::IntegralValueOutOfRange(..) => StoreError::Decode(err),
            rusqlite::Error::SqliteFailure(ref e, ref msg)
                if e.code == ffi::ErrorCode::ConstraintViolation =>
            {
                StoreError::Constraint(msg.clone().unwrap_or_else(|| e.to_string()))
            }
            _ => StoreError::StorageUnavailable(err),
        }
    }
}

impl StoreError {
    /// Classifies a failed insert of a root row.
    pub(crate) fn on_root_insert(err: rusqlite::Error, invoice_number: Option<&str>) -> Self {
        match (constraint_kind(&err), invoice_number) {
            (Some(ConstraintKind::Unique), Some(number)) => {
                StoreError::UniqueConstraintViolation(number.to_string())
            }
            _ => StoreError::from(err),
        }
    }

    /// Classifies a failed insert of a row owned by `invoice_id`.
    pub(crate) fn on_dependent_insert(err: rusqlite::Error, invoice_id: Uuid) -> Self {
        match constraint_kind(&err) {
            Some(ConstraintKind::ForeignKey) => StoreError::ForeignKeyViolation(invoice_id),
            _ => StoreError::from(err),
        }
    }
}
