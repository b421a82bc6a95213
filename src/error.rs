use thiserror::Error;

pub type Result<T> = std::result::Result<T, SettlementError>;

/// Error taxonomy for the settlement core.
///
/// Precondition failures (`NotFound`, `InvalidState`, `Conflict`,
/// `ValidationError`) are returned synchronously to the caller; storage and
/// boundary failures are wrapped as `Internal`, `Io` or `Csv`.
#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u32 },

    #[error("obligation {obligation} cannot be settled: {reason}")]
    InvalidState { obligation: u32, reason: String },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl SettlementError {
    pub fn not_found(entity: &'static str, id: u32) -> Self {
        Self::NotFound { entity, id }
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for SettlementError {
    fn from(e: rocksdb::Error) -> Self {
        Self::Internal(Box::new(e))
    }
}

impl From<serde_json::Error> for SettlementError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(Box::new(e))
    }
}
