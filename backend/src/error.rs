use thiserror::Error;

use crate::models::TransactionStatus;

/// Errors surfaced by the escrow core to the HTTP adapter.
#[derive(Error, Debug)]
pub enum EscrowError {
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A different hash is already recorded for this transaction.
    #[error("Transaction {transaction_id} already has tx hash {existing}")]
    AlreadyAttached {
        transaction_id: String,
        existing: String,
    },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("Transaction hash must not be empty")]
    EmptyTxHash,

    #[error("Verification attempted too recently, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unauthorized")]
    Unauthorized,
}

impl EscrowError {
    pub fn transaction_not_found(id: &str) -> Self {
        EscrowError::NotFound {
            entity: "Transaction",
            id: id.to_string(),
        }
    }

    pub fn dispute_not_found(id: &str) -> Self {
        EscrowError::NotFound {
            entity: "Dispute",
            id: id.to_string(),
        }
    }
}

impl From<rusqlite::Error> for EscrowError {
    fn from(e: rusqlite::Error) -> Self {
        EscrowError::StoreUnavailable(e.to_string())
    }
}

pub type EscrowResult<T> = std::result::Result<T, EscrowError>;
