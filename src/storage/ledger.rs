// Append-only chain store using sled

use crate::config::Config;
use crate::consensus::{BlockValidator, Miner, ValidationError};
use crate::core::{Block, Hash256, PubKeyHash, Serializable};
use crate::error::{LedgerError, Result};
use sled::transaction::{abort, ConflictableTransactionResult};
use sled::Db;

/// Key holding the hash of the most recent block
pub const TIP_KEY: &[u8] = b"tip";
/// Key holding the `prev_hash` value of the genesis block
pub const GENESIS_PREV_KEY: &[u8] = b"genesis-prev";

/// Persistent chain of blocks linked by `prev_hash`, newest at the tip.
///
/// Blocks are keyed by their raw 32-byte hash. The tip is cached in memory
/// and checked against the persisted value before every append.
pub struct Ledger {
    db: Db,
    tip: Hash256,
    genesis_sentinel: Hash256,
    config: Config,
    miner: Miner,
    validator: BlockValidator,
}

impl Ledger {
    /// Create a new chain whose genesis block mints to `mint_recipient`
    pub fn initialize(config: Config, mint_recipient: &PubKeyHash) -> Result<Self> {
        config.validate()?;
        let path = config.ledger_path();
        let db = sled::open(&path)?;

        if db.contains_key(TIP_KEY)? {
            return Err(LedgerError::AlreadyExists(path));
        }

        let miner = config.miner();
        let sentinel = config.genesis_sentinel;
        let genesis = Block::genesis(sentinel, mint_recipient, config.mint_amount, &miner)?;

        let key = genesis.hash;
        let value = genesis.serialize();
        db.transaction(|tx| -> ConflictableTransactionResult<(), LedgerError> {
            tx.insert(&key.as_bytes()[..], value.as_slice())?;
            tx.insert(TIP_KEY, &key.as_bytes()[..])?;
            tx.insert(GENESIS_PREV_KEY, &sentinel.as_bytes()[..])?;
            Ok(())
        })?;
        db.flush()?;

        log::info!("Initialized ledger at {} with genesis block {}", path.display(), key);

        let validator = BlockValidator::new(config.difficulty);
        Ok(Self {
            db,
            tip: key,
            genesis_sentinel: sentinel,
            config,
            miner,
            validator,
        })
    }

    /// Open an existing chain
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let path = config.ledger_path();
        if !path.exists() {
            return Err(LedgerError::NotFound(path));
        }

        let db = sled::open(&path)?;
        let tip = match read_hash(&db, TIP_KEY)? {
            Some(tip) => tip,
            None => return Err(LedgerError::NotFound(path)),
        };
        let genesis_sentinel = read_hash(&db, GENESIS_PREV_KEY)?.ok_or_else(|| {
            LedgerError::Consistency("genesis sentinel missing from store".to_string())
        })?;

        if genesis_sentinel != config.genesis_sentinel {
            log::warn!(
                "Stored genesis sentinel {} overrides configured {}",
                genesis_sentinel,
                config.genesis_sentinel
            );
        }

        log::debug!("Opened ledger at {} (tip {})", path.display(), tip);

        Ok(Self {
            db,
            tip,
            genesis_sentinel,
            miner: config.miner(),
            validator: BlockValidator::new(config.difficulty),
            config,
        })
    }

    pub fn tip(&self) -> Hash256 {
        self.tip
    }

    pub fn genesis_sentinel(&self) -> Hash256 {
        self.genesis_sentinel
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Miner built from the configured difficulty and worker count
    pub fn miner(&self) -> &Miner {
        &self.miner
    }

    /// Get a block by hash
    pub fn get_block(&self, hash: &Hash256) -> Result<Option<Block>> {
        match self.db.get(hash.as_bytes())? {
            Some(data) => Ok(Some(Block::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    /// Append a block on top of the current tip.
    ///
    /// Besides block integrity, every transaction must spend distinct,
    /// committed, unspent outputs of its signer and balance its values.
    /// Only genesis may mint.
    pub fn append_block(&mut self, block: &Block) -> Result<()> {
        self.validator.validate_block(block)?;

        if block.prev_hash != self.tip {
            return Err(LedgerError::StaleTip {
                tip: self.tip,
                prev_hash: block.prev_hash,
            });
        }
        if let Some(mint) = block.transactions.iter().find(|tx| tx.is_mint()) {
            return Err(ValidationError::UnexpectedMint(mint.id).into());
        }
        self.verify_transaction_batch(&block.transactions)?;

        self.write_block(block)
    }

    /// Append a block whose transactions were already checked against the
    /// UTXO view at the current tip.
    pub(crate) fn append_verified_block(&mut self, block: &Block) -> Result<()> {
        self.validator.validate_block(block)?;
        self.write_block(block)
    }

    /// The tip check and both writes run in one sled transaction, so a
    /// rejected block leaves the store untouched.
    fn write_block(&mut self, block: &Block) -> Result<()> {
        let key = block.hash;
        let value = block.serialize();
        let cached = self.tip;
        let prev_hash = block.prev_hash;

        self.db.transaction(|tx| -> ConflictableTransactionResult<(), LedgerError> {
            let persisted = match tx.get(TIP_KEY)? {
                Some(bytes) => match Hash256::from_slice(&bytes) {
                    Ok(hash) => hash,
                    Err(e) => return abort(LedgerError::Consistency(format!("corrupt tip: {}", e))),
                },
                None => return abort(LedgerError::Consistency("tip missing from store".to_string())),
            };

            if persisted != cached {
                return abort(LedgerError::Consistency(format!(
                    "cached tip {} differs from persisted tip {}",
                    cached, persisted
                )));
            }
            if prev_hash != persisted {
                return abort(LedgerError::StaleTip {
                    tip: persisted,
                    prev_hash,
                });
            }

            tx.insert(&key.as_bytes()[..], value.as_slice())?;
            tx.insert(TIP_KEY, &key.as_bytes()[..])?;
            Ok(())
        })?;

        // Committed: the cache follows the store even if the flush fails
        self.tip = key;
        self.db.flush()?;

        log::info!("Appended block {} ({} transactions)", key, block.transactions.len());
        Ok(())
    }

    /// Walk the chain from the tip back to genesis
    pub fn iter(&self) -> ChainIter<'_> {
        ChainIter {
            ledger: self,
            cursor: Some(self.tip),
        }
    }

    /// Load a block the chain links to and re-check it
    fn load_linked(&self, hash: &Hash256) -> Result<Block> {
        let block = self.get_block(hash)?.ok_or_else(|| {
            LedgerError::Consistency(format!("block {} referenced by the chain is missing", hash))
        })?;

        if block.hash != *hash {
            return Err(LedgerError::Consistency(format!(
                "block stored under {} claims hash {}",
                hash, block.hash
            )));
        }
        BlockValidator::check_integrity(&block)
            .map_err(|e| LedgerError::Consistency(format!("block {}: {}", hash, e)))?;

        Ok(block)
    }
}

/// Backward chain iterator. Ends after the genesis block or the first error.
pub struct ChainIter<'a> {
    ledger: &'a Ledger,
    cursor: Option<Hash256>,
}

impl Iterator for ChainIter<'_> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.cursor.take()?;
        let block = match self.ledger.load_linked(&hash) {
            Ok(block) => block,
            Err(e) => return Some(Err(e)),
        };

        if !block.is_genesis(&self.ledger.genesis_sentinel) {
            self.cursor = Some(block.prev_hash);
        }
        Some(Ok(block))
    }
}

fn read_hash(db: &Db, key: &[u8]) -> Result<Option<Hash256>> {
    match db.get(key)? {
        Some(data) => Hash256::from_slice(&data)
            .map(Some)
            .map_err(|e| LedgerError::Consistency(format!("invalid hash under {:?}: {}", key, e))),
        None => Ok(None),
    }
}

/// Retry `f` while sled still holds the file lock of a just-dropped handle
#[cfg(test)]
pub(crate) fn retry_while_locked<T>(f: impl Fn() -> Result<T>) -> Result<T> {
    let mut attempts = 0;
    loop {
        match f() {
            Err(LedgerError::Storage(sled::Error::Io(_))) if attempts < 100 => {
                attempts += 1;
                std::thread::sleep(std::time::Duration::from_millis(20));
            }
            result => return result,
        }
    }
}
