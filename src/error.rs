// Error types for the ledger engine

use crate::consensus::{BatchError, ValidationError};
use crate::core::Hash256;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Ledger corruption or concurrent misuse. Never repaired automatically.
    #[error("Ledger consistency violated: {0}")]
    Consistency(String),

    #[error("Stale tip: block builds on {prev_hash}, current tip is {tip}")]
    StaleTip { tip: Hash256, prev_hash: Hash256 },

    #[error("Invalid block: {0}")]
    InvalidBlock(#[from] ValidationError),

    #[error("Insufficient funds: have {available}, need {requested}")]
    InsufficientFunds { available: u64, requested: u64 },

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Invalid transaction batch: {0}")]
    InvalidTransactionBatch(#[from] BatchError),

    #[error("Malformed address: {0}")]
    MalformedAddress(String),

    #[error("Ledger already exists at {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("No ledger found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Output index {0} cannot be referenced by an input")]
    OutputIndexOutOfRange(u32),

    #[error("Nonce space exhausted without meeting the target")]
    NonceSpaceExhausted,

    #[error("Signing error: {0}")]
    Signing(#[from] secp256k1::Error),
}

impl LedgerError {
    /// Fatal errors abort the current operation and indicate a broken store.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LedgerError::Storage(_)
                | LedgerError::Io(_)
                | LedgerError::Serialization(_)
                | LedgerError::Consistency(_)
        )
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<sled::transaction::TransactionError<LedgerError>> for LedgerError {
    fn from(err: sled::transaction::TransactionError<LedgerError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(e) => e,
            sled::transaction::TransactionError::Storage(e) => LedgerError::Storage(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
