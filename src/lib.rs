// Single-writer proof-of-work UTXO ledger

pub mod config;
pub mod consensus;
pub mod core;
pub mod error;
pub mod storage;
pub mod wallet;

// Re-exports for convenience
pub use config::Config;
pub use consensus::{BatchError, BlockValidator, Miner, Target, ValidationError};
pub use crate::core::{verify_inclusion, Address, Block, Hash256, MerkleProof, MerkleTree, Transaction, TxInput, TxOutput};
pub use error::{LedgerError, Result};
pub use storage::{Ledger, TransactionPool, UtxoView};
pub use wallet::{KeyPair, TransactionBuilder};
