use thiserror::Error;

/// Rejection raised at a write boundary. Nothing that fails validation is persisted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("meter value must be a finite number")]
    NonFiniteValue,
    #[error("meter value must not be negative (got {0})")]
    NegativeValue(f64),
    #[error("timestamp {0} ms is not a valid point in time")]
    InvalidTimestamp(i64),
    #[error("tariff rate must be a positive number (got {0})")]
    InvalidTariff(f64),
    #[error("balance must be a non-negative number (got {0})")]
    InvalidBalance(f64),
    #[error("please enter a valid meter reading (got '{0}')")]
    InvalidManualEntry(String),
    #[error("a reading with id '{0}' already exists")]
    DuplicateId(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode stored data: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            StoreError::Validation(e) => Some(e),
            _ => None,
        }
    }
}
