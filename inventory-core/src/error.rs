//! Error types for the stock ledger

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Voucher failed posting validation
    #[error("Invalid voucher: {0}")]
    InvalidVoucher(String),

    /// Outbound line exceeds available stock
    #[error(
        "Insufficient stock for {item_id} in {godown_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        /// Stock item
        item_id: String,
        /// Storage location
        godown_id: String,
        /// Lot, if batch-tracked
        batch_id: Option<String>,
        /// Outbound quantity requested by the voucher
        requested: Decimal,
        /// Stock on hand at check time
        available: Decimal,
    },

    /// Tracking number already exists for this company
    #[error("Tracking number already exists: {0}")]
    DuplicateTracking(String),

    /// Voucher not found
    #[error("Voucher not found: {0}")]
    VoucherNotFound(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
