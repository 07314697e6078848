// Consensus, validation and mining

pub mod pow;
pub mod validation;
pub mod mining;

pub use pow::{Miner, MiningResult, Target, MAX_DIFFICULTY};
pub use validation::{BatchError, BlockValidator, TransactionBatchValidator, ValidationError};
