// Block integrity and mining-time transaction batch validation

use crate::consensus::pow::Target;
use crate::core::{hash160, Block, Hash256, OutPoint, PubKeyHash, Transaction};
use crate::error::Result;
use crate::storage::{Ledger, UtxoView};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Block integrity errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Block has no transactions")]
    NoTransactions,
    #[error("Transaction {0} does not hash to its id")]
    InvalidTransactionId(Hash256),
    #[error("Invalid merkle root")]
    InvalidMerkleRoot,
    #[error("Block hash does not match its contents")]
    InvalidHash,
    #[error("Invalid proof of work")]
    InvalidProofOfWork,
    #[error("Block target does not match the configured difficulty")]
    UnexpectedTarget,
    #[error("Transaction {0} mints outside the genesis block")]
    UnexpectedMint(Hash256),
}

/// Reasons a pending batch is rejected by the mining cycle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("transaction {0} has no inputs")]
    EmptyInputs(Hash256),
    #[error("transaction {0} does not hash to its id")]
    InvalidId(Hash256),
    #[error("transaction {0} carries an invalid signature")]
    InvalidSignature(Hash256),
    #[error("output {tx_id}:{index} is referenced more than once in the batch")]
    DuplicateReference { tx_id: Hash256, index: i32 },
    #[error("output {tx_id}:{index} is unknown or already spent")]
    UnknownOrSpentReference { tx_id: Hash256, index: i32 },
    #[error("transaction {tx_id} spends {inputs} but creates {outputs}")]
    ValueMismatch { tx_id: Hash256, inputs: u64, outputs: u64 },
    #[error("batch spends {inputs} but creates {outputs}")]
    BatchValueMismatch { inputs: u64, outputs: u64 },
    #[error("value overflow in transaction {0}")]
    ValueOverflow(Hash256),
}

/// Block validator
#[derive(Debug, Clone)]
pub struct BlockValidator {
    target: Target,
}

impl BlockValidator {
    /// Create a new block validator with fixed difficulty
    pub fn new(difficulty: u32) -> Self {
        Self {
            target: Target::from_difficulty(difficulty),
        }
    }

    /// Full check for a block about to be appended
    pub fn validate_block(&self, block: &Block) -> std::result::Result<(), ValidationError> {
        if Target::from_bytes(&block.target) != self.target {
            return Err(ValidationError::UnexpectedTarget);
        }
        Self::check_integrity(block)
    }

    /// Checks that hold for any well-formed block regardless of configuration
    pub fn check_integrity(block: &Block) -> std::result::Result<(), ValidationError> {
        if block.transactions.is_empty() {
            return Err(ValidationError::NoTransactions);
        }

        if let Some(tx) = block.transactions.iter().find(|tx| tx.compute_id() != tx.id) {
            return Err(ValidationError::InvalidTransactionId(tx.id));
        }

        if block.merkle_tree().root() != block.merkle_root {
            return Err(ValidationError::InvalidMerkleRoot);
        }

        if block.compute_hash() != block.hash {
            return Err(ValidationError::InvalidHash);
        }

        if !block.validate_pow() {
            return Err(ValidationError::InvalidProofOfWork);
        }

        Ok(())
    }
}

/// Validates a pending batch against the committed UTXO view
pub struct TransactionBatchValidator<'a> {
    ledger: &'a Ledger,
}

impl<'a> TransactionBatchValidator<'a> {
    pub fn new(ledger: &'a Ledger) -> Self {
        Self { ledger }
    }

    /// Accept the batch only if every reference is a distinct committed
    /// unspent output owned by its spender and values balance.
    pub fn validate(&self, txs: &[Transaction]) -> Result<()> {
        let mut views: HashMap<PubKeyHash, UtxoView> = HashMap::new();
        let mut referenced: HashSet<OutPoint> = HashSet::new();
        let mut total_in = 0u64;
        let mut total_out = 0u64;

        for tx in txs {
            if tx.inputs.is_empty() {
                return Err(BatchError::EmptyInputs(tx.id).into());
            }
            if tx.compute_id() != tx.id {
                return Err(BatchError::InvalidId(tx.id).into());
            }

            let outputs = tx
                .total_output_value()
                .ok_or(BatchError::ValueOverflow(tx.id))?;
            total_out = total_out
                .checked_add(outputs)
                .ok_or(BatchError::ValueOverflow(tx.id))?;

            // Mint inputs reference nothing
            if tx.is_mint() {
                continue;
            }

            if !tx.verify_signatures() {
                return Err(BatchError::InvalidSignature(tx.id).into());
            }

            let mut inputs = 0u64;
            for input in &tx.inputs {
                let unknown = BatchError::UnknownOrSpentReference {
                    tx_id: input.prev_tx_id,
                    index: input.output_index,
                };
                let outpoint = input.outpoint().ok_or(unknown.clone())?;

                if !referenced.insert(outpoint) {
                    return Err(BatchError::DuplicateReference {
                        tx_id: input.prev_tx_id,
                        index: input.output_index,
                    }
                    .into());
                }

                let owner = hash160(&input.spender_pub_key);
                let view = match views.entry(owner) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => entry.insert(self.ledger.find_utxos(&owner)?),
                };

                let value = view.value_of(&outpoint).ok_or(unknown)?;
                inputs = inputs
                    .checked_add(value)
                    .ok_or(BatchError::ValueOverflow(tx.id))?;
            }

            if inputs != outputs {
                return Err(BatchError::ValueMismatch {
                    tx_id: tx.id,
                    inputs,
                    outputs,
                }
                .into());
            }
            total_in = total_in
                .checked_add(inputs)
                .ok_or(BatchError::ValueOverflow(tx.id))?;
        }

        if total_in != total_out {
            return Err(BatchError::BatchValueMismatch {
                inputs: total_in,
                outputs: total_out,
            }
            .into());
        }

        log::debug!("Validated batch of {} transactions ({} units moved)", txs.len(), total_in);
        Ok(())
    }
}

impl Ledger {
    /// Mining-time validation of a pending transaction set
    pub fn verify_transaction_batch(&self, txs: &[Transaction]) -> Result<()> {
        TransactionBatchValidator::new(self).validate(txs)
    }
}
