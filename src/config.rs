// Ledger configuration

use crate::consensus::{Miner, MAX_DIFFICULTY};
use crate::core::Hash256;
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_DIR: &str = "./tmp";
pub const DEFAULT_DIFFICULTY: u32 = 12;
pub const DEFAULT_MINT_AMOUNT: u64 = 1000;

const BLOCKS_DIR: &str = "blocks";
const POOL_FILE: &str = "transaction_pool.json";

/// Ledger configuration. Missing fields in a config file take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory for the block store and the pending pool
    pub data_dir: PathBuf,
    /// Leading zero bits required of a block hash
    pub difficulty: u32,
    /// Value minted by the genesis transaction
    pub mint_amount: u64,
    /// Nonce search threads
    pub mining_workers: usize,
    /// `prev_hash` of the genesis block
    pub genesis_sentinel: Hash256,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            difficulty: DEFAULT_DIFFICULTY,
            mint_amount: DEFAULT_MINT_AMOUNT,
            mining_workers: 1,
            genesis_sentinel: Hash256::zero(),
        }
    }
}

impl Config {
    /// Default configuration rooted at `data_dir`
    pub fn with_data_dir<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::InvalidConfig(format!(
                "difficulty {} exceeds {}",
                self.difficulty, MAX_DIFFICULTY
            )));
        }
        if self.mining_workers == 0 {
            return Err(LedgerError::InvalidConfig(
                "mining_workers must be at least 1".to_string(),
            ));
        }
        if self.mint_amount == 0 {
            return Err(LedgerError::InvalidConfig(
                "mint_amount must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// sled directory holding the chain
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(BLOCKS_DIR)
    }

    /// JSON file holding pending transactions
    pub fn pool_path(&self) -> PathBuf {
        self.data_dir.join(POOL_FILE)
    }

    pub fn miner(&self) -> Miner {
        Miner::new(self.difficulty).with_workers(self.mining_workers)
    }
}
