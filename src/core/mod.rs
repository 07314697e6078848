// Core ledger data structures

mod types;
mod transaction;
mod block;
mod serialize;
mod hash;
mod merkle;
mod address;

pub use types::*;
pub use transaction::*;
pub use block::*;
pub use serialize::Serializable;
pub use hash::*;
pub use merkle::{verify_inclusion, Direction, MerkleProof, MerkleTree};
pub use address::{checksum, Address, ADDRESS_VERSION, CHECKSUM_LENGTH};
