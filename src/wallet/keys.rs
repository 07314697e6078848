// Key pairs for signing and addressing

use crate::core::{hash160, Address, PubKeyHash, Transaction};
use crate::error::Result;
use rand::rngs::OsRng;
use secp256k1::{PublicKey, Secp256k1, SecretKey};

/// secp256k1 key pair with its derived address
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
    pub address: Address,
}

impl KeyPair {
    /// Generate a new key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::new(&mut OsRng);
        Self::from_secret_key(&secp, secret_key)
    }

    /// Restore a key pair from its 32 secret bytes
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(bytes)?;
        Ok(Self::from_secret_key(&secp, secret_key))
    }

    fn from_secret_key<C: secp256k1::Signing>(secp: &Secp256k1<C>, secret_key: SecretKey) -> Self {
        let public_key = secret_key.public_key(secp);
        let address = Address::from_pubkey(&public_key.serialize());
        Self {
            secret_key,
            public_key,
            address,
        }
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret_key.secret_bytes()
    }

    /// Compressed public key bytes
    pub fn pubkey_bytes(&self) -> Vec<u8> {
        self.public_key.serialize().to_vec()
    }

    pub fn pubkey_hash(&self) -> PubKeyHash {
        hash160(&self.pubkey_bytes())
    }

    /// Sign every input of `tx`
    pub fn sign_transaction(&self, tx: &mut Transaction) -> Result<()> {
        tx.sign(&self.secret_key)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
