// Block data structures

use crate::consensus::{Miner, Target};
use crate::core::{Hash256, MerkleProof, MerkleTree, PubKeyHash, Serializable, Transaction};
use crate::core::serialize::{decode_err, read_array, read_var_bytes, read_varint, write_var_bytes, write_varint};
use crate::error::{LedgerError, Result};
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::time::{SystemTime, UNIX_EPOCH};

/// Data carried by the genesis mint input
const GENESIS_MINT_DATA: &[u8] = b"genesis mint";

/// Canonical header bytes with the nonce left open
///
/// Layout: timestamp (8 BE) || prev hash || target || nonce (8 BE) ||
/// transaction id summary || merkle root. The prefix and suffix around the
/// nonce are built once so the nonce search only feeds them to the hasher.
#[derive(Debug, Clone)]
pub struct PowHeader {
    prefix: Vec<u8>,
    suffix: Vec<u8>,
}

impl PowHeader {
    pub fn new(
        timestamp: i64,
        prev_hash: &Hash256,
        target: &[u8],
        tx_summary: &[u8],
        merkle_root: &Hash256,
    ) -> Self {
        let mut prefix = Vec::with_capacity(8 + 32 + target.len());
        prefix.extend_from_slice(&timestamp.to_be_bytes());
        prefix.extend_from_slice(prev_hash.as_bytes());
        prefix.extend_from_slice(target);

        let mut suffix = Vec::with_capacity(tx_summary.len() + 32);
        suffix.extend_from_slice(tx_summary);
        suffix.extend_from_slice(merkle_root.as_bytes());

        Self { prefix, suffix }
    }

    /// Full header bytes for a given nonce
    pub fn bytes(&self, nonce: u64) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.prefix.len() + 8 + self.suffix.len());
        buf.extend_from_slice(&self.prefix);
        buf.extend_from_slice(&nonce.to_be_bytes());
        buf.extend_from_slice(&self.suffix);
        buf
    }

    /// SHA256 of the header bytes for a given nonce
    pub fn digest(&self, nonce: u64) -> Hash256 {
        let mut hasher = Sha256::new();
        hasher.update(&self.prefix);
        hasher.update(nonce.to_be_bytes());
        hasher.update(&self.suffix);
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        Hash256::new(out)
    }
}

/// Block - immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Unix timestamp in seconds
    pub timestamp: i64,
    /// SHA256 of the canonical header bytes
    pub hash: Hash256,
    pub prev_hash: Hash256,
    /// Minimal big-endian encoding of the PoW target
    pub target: Vec<u8>,
    pub nonce: u64,
    pub transactions: Vec<Transaction>,
    pub merkle_root: Hash256,
}

impl Block {
    /// Build a block on `prev_hash`, searching for a nonce with `miner`
    pub fn create(prev_hash: Hash256, transactions: Vec<Transaction>, miner: &Miner) -> Result<Self> {
        Self::create_at(unix_now(), prev_hash, transactions, miner)
    }

    /// Same as [`Block::create`] with an explicit timestamp
    pub fn create_at(
        timestamp: i64,
        prev_hash: Hash256,
        transactions: Vec<Transaction>,
        miner: &Miner,
    ) -> Result<Self> {
        let target = miner.target.to_bytes();
        let ids: Vec<Hash256> = transactions.iter().map(|tx| tx.id).collect();
        let merkle_root = MerkleTree::new(&ids).root();

        let header = PowHeader::new(
            timestamp,
            &prev_hash,
            &target,
            &summarize(&ids),
            &merkle_root,
        );
        let result = miner.mine(&header).ok_or(LedgerError::NonceSpaceExhausted)?;

        log::debug!(
            "Found nonce {} after {} attempts in {:?}",
            result.nonce,
            result.attempts,
            result.duration
        );

        Ok(Self {
            timestamp,
            hash: result.hash,
            prev_hash,
            target,
            nonce: result.nonce,
            transactions,
            merkle_root,
        })
    }

    /// Genesis block minting `amount` to `recipient`, linked to the sentinel
    pub fn genesis(
        sentinel: Hash256,
        recipient: &PubKeyHash,
        amount: u64,
        miner: &Miner,
    ) -> Result<Self> {
        let mint = Transaction::mint(recipient, amount, GENESIS_MINT_DATA.to_vec());
        Self::create(sentinel, vec![mint], miner)
    }

    pub fn transaction_ids(&self) -> Vec<Hash256> {
        self.transactions.iter().map(|tx| tx.id).collect()
    }

    /// Concatenation of all transaction ids in block order
    pub fn transaction_summary(&self) -> Vec<u8> {
        summarize(&self.transaction_ids())
    }

    pub fn merkle_tree(&self) -> MerkleTree {
        MerkleTree::new(&self.transaction_ids())
    }

    /// SPV proof that `tx_id` is committed by this block's Merkle root
    pub fn inclusion_proof(&self, tx_id: &Hash256) -> Option<MerkleProof> {
        self.merkle_tree().find_path(tx_id)
    }

    pub fn pow_header(&self) -> PowHeader {
        PowHeader::new(
            self.timestamp,
            &self.prev_hash,
            &self.target,
            &self.transaction_summary(),
            &self.merkle_root,
        )
    }

    /// Recompute the block hash from its fields
    pub fn compute_hash(&self) -> Hash256 {
        self.pow_header().digest(self.nonce)
    }

    /// Header digest for the stored nonce is strictly below the stored target
    pub fn validate_pow(&self) -> bool {
        Target::from_bytes(&self.target).is_valid_hash(&self.compute_hash())
    }

    /// Whether this block links to the genesis sentinel
    pub fn is_genesis(&self, sentinel: &Hash256) -> bool {
        self.prev_hash == *sentinel
    }
}

impl Serializable for Block {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(self.hash.as_bytes());
        buf.extend_from_slice(self.prev_hash.as_bytes());
        write_var_bytes(&mut buf, &self.target);
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf.extend_from_slice(self.merkle_root.as_bytes());

        write_varint(&mut buf, self.transactions.len() as u64);
        for tx in &self.transactions {
            tx.write_to(&mut buf);
        }

        buf
    }

    fn deserialize(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);

        let timestamp = i64::from_le_bytes(read_array(&mut cursor).map_err(decode_err("block timestamp"))?);
        let hash = Hash256::new(read_array(&mut cursor).map_err(decode_err("block hash"))?);
        let prev_hash = Hash256::new(read_array(&mut cursor).map_err(decode_err("block prev hash"))?);
        let target = read_var_bytes(&mut cursor).map_err(decode_err("block target"))?;
        let nonce = u64::from_le_bytes(read_array(&mut cursor).map_err(decode_err("block nonce"))?);
        let merkle_root = Hash256::new(read_array(&mut cursor).map_err(decode_err("block merkle root"))?);

        let tx_count = read_varint(&mut cursor).map_err(decode_err("transaction count"))? as usize;
        let mut transactions = Vec::with_capacity(tx_count.min(1024));
        for _ in 0..tx_count {
            transactions.push(Transaction::from_reader(&mut cursor)?);
        }

        if cursor.position() as usize != data.len() {
            return Err(LedgerError::Serialization("trailing bytes after block".to_string()));
        }

        Ok(Self {
            timestamp,
            hash,
            prev_hash,
            target,
            nonce,
            transactions,
            merkle_root,
        })
    }
}

fn summarize(ids: &[Hash256]) -> Vec<u8> {
    ids.iter().flat_map(|id| id.as_bytes().iter().copied()).collect()
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{sha256, verify_inclusion, TxInput, TxOutput};
    use num_bigint::BigUint;

    const TEST_DIFFICULTY: u32 = 8;

    fn sample_transactions(n: u8) -> Vec<Transaction> {
        (0..n)
            .map(|i| {
                Transaction::new(
                    vec![TxInput::new(sha256(&[i]), i as i32, vec![2; 33])],
                    vec![TxOutput::new(10 * i as u64 + 1, [i; 20])],
                )
            })
            .collect()
    }

    #[test]
    fn test_block_serialization_round_trip() {
        let miner = Miner::new(TEST_DIFFICULTY);
        let mut txs = sample_transactions(3);
        txs[1].inputs[0].signature = vec![0x30, 0x44, 0x02];
        let block = Block::create(sha256(b"parent"), txs, &miner).unwrap();

        let decoded = Block::deserialize(&block.serialize()).unwrap();
        assert_eq!(block, decoded);
        assert_eq!(decoded.transactions[1].inputs[0].signature, vec![0x30, 0x44, 0x02]);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let miner = Miner::new(TEST_DIFFICULTY);
        let block = Block::create(Hash256::zero(), sample_transactions(1), &miner).unwrap();
        let mut bytes = block.serialize();
        bytes.push(0);
        assert!(Block::deserialize(&bytes).is_err());
    }

    #[test]
    fn test_created_block_is_consistent() {
        let miner = Miner::new(TEST_DIFFICULTY);
        let txs = sample_transactions(4);
        let block = Block::create(sha256(b"parent"), txs.clone(), &miner).unwrap();

        assert!(block.validate_pow());
        assert_eq!(block.compute_hash(), block.hash);
        assert_eq!(block.merkle_root, block.merkle_tree().root());
        assert_eq!(block.target, miner.target.to_bytes());

        for tx in &txs {
            let proof = block.inclusion_proof(&tx.id).unwrap();
            assert!(verify_inclusion(&tx.id, &block.merkle_root, &proof));
        }
    }

    #[test]
    fn test_header_layout() {
        let prev = sha256(b"prev");
        let root = sha256(b"root");
        let header = PowHeader::new(0x0102030405060708, &prev, &[0x01, 0x00], b"ids", &root);
        let bytes = header.bytes(5);

        assert_eq!(&bytes[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&bytes[8..40], prev.as_bytes());
        assert_eq!(&bytes[40..42], &[0x01, 0x00]);
        assert_eq!(&bytes[42..50], &5u64.to_be_bytes());
        assert_eq!(&bytes[50..53], b"ids");
        assert_eq!(&bytes[53..], root.as_bytes());
        assert_eq!(header.digest(5), sha256(&bytes));
    }

    #[test]
    fn test_validate_pow_matches_literal_comparison() {
        // Low difficulty so roughly one nonce in sixteen meets the target
        let miner = Miner::new(4);
        let block = Block::create(sha256(b"parent"), sample_transactions(2), &miner).unwrap();
        let target = BigUint::from(1u8) << (256 - 4);

        let mut accepted = 0;
        for nonce in 0..256u64 {
            let mut candidate = block.clone();
            candidate.nonce = nonce;

            // Rebuild the header bytes by hand, independent of PowHeader
            let mut header = Vec::new();
            header.extend_from_slice(&candidate.timestamp.to_be_bytes());
            header.extend_from_slice(candidate.prev_hash.as_bytes());
            header.extend_from_slice(&candidate.target);
            header.extend_from_slice(&nonce.to_be_bytes());
            for tx in &candidate.transactions {
                header.extend_from_slice(tx.id.as_bytes());
            }
            header.extend_from_slice(candidate.merkle_root.as_bytes());
            let digest = sha256(&header);

            let expected = BigUint::from_bytes_be(digest.as_bytes()) < target;
            assert_eq!(candidate.validate_pow(), expected, "nonce {}", nonce);
            if expected {
                accepted += 1;
            }
        }
        assert!(accepted > 0);
        assert!(accepted < 256);
    }

    #[test]
    fn test_nonce_found_is_first_valid() {
        let miner = Miner::new(6);
        let block = Block::create(sha256(b"parent"), sample_transactions(1), &miner).unwrap();
        for nonce in 0..block.nonce {
            let mut earlier = block.clone();
            earlier.nonce = nonce;
            assert!(!earlier.validate_pow());
        }
    }

    #[test]
    fn test_tampering_changes_hash() {
        let miner = Miner::new(TEST_DIFFICULTY);
        let block = Block::create(sha256(b"parent"), sample_transactions(2), &miner).unwrap();

        let mut tampered = block.clone();
        tampered.transactions[0].outputs[0].value += 1;
        tampered.transactions[0].set_id();
        assert_ne!(tampered.compute_hash(), block.hash);
        assert_ne!(tampered.merkle_tree().root(), block.merkle_root);
    }

    #[test]
    fn test_genesis_block() {
        let miner = Miner::new(TEST_DIFFICULTY);
        let genesis = Block::genesis(Hash256::zero(), &[9; 20], 1000, &miner).unwrap();

        assert!(genesis.is_genesis(&Hash256::zero()));
        assert_eq!(genesis.transactions.len(), 1);
        assert!(genesis.transactions[0].is_mint());
        assert_eq!(genesis.transactions[0].outputs[0].value, 1000);
        assert!(genesis.validate_pow());
    }
}
