// Proof of Work implementation

use crate::core::{Hash256, PowHeader};
use num_bigint::BigUint;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Largest meaningful difficulty: target = 2^0 = 1
pub const MAX_DIFFICULTY: u32 = 256;

/// Difficulty target: a hash is valid iff hash < target as big-endian integers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    value: BigUint,
}

impl Target {
    /// target = 2^(256 - difficulty)
    pub fn from_difficulty(difficulty: u32) -> Self {
        let shift = MAX_DIFFICULTY.saturating_sub(difficulty);
        Self {
            value: BigUint::from(1u8) << shift,
        }
    }

    /// Parse a big-endian target as stored in a block
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            value: BigUint::from_bytes_be(bytes),
        }
    }

    /// Minimal big-endian encoding
    pub fn to_bytes(&self) -> Vec<u8> {
        self.value.to_bytes_be()
    }

    /// Check if a hash meets this target (hash < target)
    pub fn is_valid_hash(&self, hash: &Hash256) -> bool {
        BigUint::from_bytes_be(hash.as_bytes()) < self.value
    }

    /// Leading zero bits a 256-bit hash needs to be under the target
    pub fn leading_zeros(&self) -> u32 {
        (MAX_DIFFICULTY as u64 + 1).saturating_sub(self.value.bits()) as u32
    }

    /// Target as a 32-byte big-endian array, `None` when it exceeds 2^256 - 1
    fn to_hash_bytes(&self) -> Option<[u8; 32]> {
        let bytes = self.value.to_bytes_be();
        if bytes.len() > 32 {
            return None;
        }
        let mut out = [0u8; 32];
        out[32 - bytes.len()..].copy_from_slice(&bytes);
        Some(out)
    }
}

/// Proof of Work miner
#[derive(Debug, Clone)]
pub struct Miner {
    /// Fixed difficulty target
    pub target: Target,
    /// Cached target bytes for fast comparison, `None` if every hash passes
    target_bytes: Option<[u8; 32]>,
    workers: usize,
}

impl Miner {
    /// Create a single-threaded miner with fixed difficulty
    pub fn new(difficulty: u32) -> Self {
        let target = Target::from_difficulty(difficulty);
        let target_bytes = target.to_hash_bytes();
        Self {
            target,
            target_bytes,
            workers: 1,
        }
    }

    /// Split the nonce space across `workers` threads
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Find the smallest nonce whose header digest is under the target.
    /// Returns `None` only if the whole u64 nonce space fails.
    pub fn mine(&self, header: &PowHeader) -> Option<MiningResult> {
        if self.workers > 1 {
            self.mine_parallel(header)
        } else {
            self.mine_sequential(header)
        }
    }

    fn mine_sequential(&self, header: &PowHeader) -> Option<MiningResult> {
        let start_time = Instant::now();
        let mut attempts = 0u64;

        for nonce in 0..=u64::MAX {
            let hash = header.digest(nonce);
            attempts += 1;

            if self.is_valid_hash_fast(&hash) {
                return Some(MiningResult {
                    nonce,
                    hash,
                    attempts,
                    duration: start_time.elapsed(),
                });
            }

            // Progress indicator every 100k attempts
            if attempts % 100_000 == 0 {
                let elapsed = start_time.elapsed();
                log::debug!("Mining attempts: {} ({:.1} KH/s)",
                    attempts,
                    attempts as f64 / elapsed.as_secs_f64() / 1000.0
                );
            }
        }

        None
    }

    /// Worker `w` tries `w, w + n, w + 2n, ...`. A shared best nonce stops
    /// every worker once it passes the best hit, so the result is the
    /// smallest valid nonce, same as the sequential search.
    fn mine_parallel(&self, header: &PowHeader) -> Option<MiningResult> {
        let start_time = Instant::now();
        let best = AtomicU64::new(u64::MAX);
        let attempts = AtomicU64::new(0);
        let step = self.workers as u64;

        thread::scope(|scope| {
            for worker in 0..step {
                let best = &best;
                let attempts = &attempts;
                scope.spawn(move || {
                    let mut nonce = worker;
                    let mut local = 0u64;
                    while nonce < best.load(Ordering::Relaxed) {
                        local += 1;
                        if self.is_valid_hash_fast(&header.digest(nonce)) {
                            best.fetch_min(nonce, Ordering::Relaxed);
                            break;
                        }
                        match nonce.checked_add(step) {
                            Some(next) => nonce = next,
                            None => break,
                        }
                    }
                    attempts.fetch_add(local, Ordering::Relaxed);
                });
            }
        });

        let nonce = best.into_inner();
        let hash = header.digest(nonce);
        if !self.is_valid_hash_fast(&hash) {
            return None;
        }

        let attempts = attempts.into_inner();
        log::debug!("Parallel search with {} workers: {} attempts", self.workers, attempts);

        Some(MiningResult {
            nonce,
            hash,
            attempts,
            duration: start_time.elapsed(),
        })
    }

    /// Fast hash validation using cached target (no conversion overhead)
    #[inline]
    fn is_valid_hash_fast(&self, hash: &Hash256) -> bool {
        match &self.target_bytes {
            // Byte arrays compare lexicographically, i.e. as big-endian integers
            Some(target) => hash.as_bytes() < target,
            None => true,
        }
    }
}

/// Mining result
#[derive(Debug)]
pub struct MiningResult {
    /// The nonce that was found
    pub nonce: u64,
    /// The resulting hash
    pub hash: Hash256,
    /// Number of attempts
    pub attempts: u64,
    /// Time taken
    pub duration: Duration,
}
