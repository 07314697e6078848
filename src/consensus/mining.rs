// Mining cycle: pending pool -> validated block -> chain

use crate::core::{Block, Transaction};
use crate::error::{LedgerError, Result};
use crate::storage::{Ledger, TransactionPool};

impl Ledger {
    /// Pending pool stored next to this ledger
    pub fn transaction_pool(&self) -> Result<TransactionPool> {
        TransactionPool::load(self.config().pool_path())
    }

    /// Queue a transaction for the next mining cycle
    pub fn submit_transaction(&self, tx: Transaction) -> Result<()> {
        let mut pool = self.transaction_pool()?;
        log::debug!("Queued transaction {} ({} pending)", tx.id, pool.len() + 1);
        pool.add(tx);
        pool.save()
    }

    /// Mine every pending transaction into one block on the current tip.
    ///
    /// Returns `Ok(None)` when the pool is empty. A rejected batch empties
    /// the pool and is returned as `InvalidTransactionBatch`.
    pub fn run_mining_cycle(&mut self) -> Result<Option<Block>> {
        let mut pool = self.transaction_pool()?;
        if pool.is_empty() {
            log::debug!("Transaction pool is empty, nothing to mine");
            return Ok(None);
        }

        if let Err(err) = self.verify_transaction_batch(pool.transactions()) {
            if err.is_fatal() {
                return Err(err);
            }
            log::warn!("Discarding {} pending transactions: {}", pool.len(), err);
            pool.clear()?;
            return Err(err);
        }

        let block = Block::create(self.tip(), pool.transactions().to_vec(), self.miner())?;
        if !block.validate_pow() {
            return Err(LedgerError::Consistency(format!(
                "mined block {} fails proof-of-work",
                block.hash
            )));
        }

        self.append_verified_block(&block)?;
        pool.clear()?;

        log::info!(
            "Mined block {} with {} transactions (nonce {})",
            block.hash,
            block.transactions.len(),
            block.nonce
        );
        Ok(Some(block))
    }
}
