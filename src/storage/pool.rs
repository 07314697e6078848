// Pending transaction pool persisted as JSON

use crate::core::Transaction;
use crate::error::Result;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Ordered pending transactions waiting for the next mining cycle
#[derive(Debug)]
pub struct TransactionPool {
    path: PathBuf,
    transactions: Vec<Transaction>,
}

impl TransactionPool {
    /// Load the pool file, or start empty if there is none
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let transactions = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, transactions })
    }

    pub fn add(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    /// Write the pool to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.transactions)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// Drop all pending transactions and remove the pool file
    pub fn clear(&mut self) -> Result<()> {
        self.transactions.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{sha256, TxInput, TxOutput};
    use crate::error::LedgerError;

    fn sample(seed: &[u8]) -> Transaction {
        let mut tx = Transaction::new(
            vec![TxInput::new(sha256(seed), 1, vec![2; 33])],
            vec![TxOutput::new(42, [5; 20])],
        );
        tx.inputs[0].signature = vec![0x30, 0x45];
        tx
    }

    #[test]
    fn test_missing_file_is_empty_pool() {
        let dir = tempfile::tempdir().unwrap();
        let pool = TransactionPool::load(dir.path().join("pool.json")).unwrap();
        assert!(pool.is_empty());
    }

    #[test]
    fn test_save_and_reload_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pool.json");

        let mut pool = TransactionPool::load(&path).unwrap();
        pool.add(sample(b"a"));
        pool.add(sample(b"b"));
        pool.save().unwrap();

        let reloaded = TransactionPool::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.transactions(), pool.transactions());
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.json");

        let mut pool = TransactionPool::load(&path).unwrap();
        pool.add(sample(b"a"));
        pool.save().unwrap();
        assert!(path.exists());

        pool.clear().unwrap();
        assert!(pool.is_empty());
        assert!(!path.exists());

        // Clearing twice is fine
        pool.clear().unwrap();
    }

    #[test]
    fn test_corrupt_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(TransactionPool::load(&path), Err(LedgerError::Serialization(_))));
    }
}
