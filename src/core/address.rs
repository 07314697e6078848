// Base58Check text addresses

use crate::core::{hash256, hash160, PubKeyHash};
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// Version byte prefixed to every address payload
pub const ADDRESS_VERSION: u8 = 0x00;
/// Number of checksum bytes appended to the payload
pub const CHECKSUM_LENGTH: usize = 4;

const PAYLOAD_LENGTH: usize = 1 + 20 + CHECKSUM_LENGTH;

/// First four bytes of SHA256(SHA256(version || pubkey hash))
pub fn checksum(versioned_payload: &[u8]) -> [u8; CHECKSUM_LENGTH] {
    let digest = hash256(versioned_payload);
    let mut out = [0u8; CHECKSUM_LENGTH];
    out.copy_from_slice(&digest.as_bytes()[..CHECKSUM_LENGTH]);
    out
}

/// Text address: Base58(version || pubkey hash || checksum)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Create address from public key hash
    pub fn from_pubkey_hash(hash: &PubKeyHash) -> Self {
        let mut payload = Vec::with_capacity(PAYLOAD_LENGTH);
        payload.push(ADDRESS_VERSION);
        payload.extend_from_slice(hash);
        let check = checksum(&payload);
        payload.extend_from_slice(&check);
        Self(bs58::encode(payload).into_string())
    }

    /// Create address directly from a serialized public key
    pub fn from_pubkey(pubkey: &[u8]) -> Self {
        Self::from_pubkey_hash(&hash160(pubkey))
    }

    /// Get address string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the pubkey hash, verifying version byte and checksum
    pub fn to_pubkey_hash(&self) -> Result<PubKeyHash> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| LedgerError::MalformedAddress(format!("invalid base58: {}", e)))?;

        if bytes.len() != PAYLOAD_LENGTH {
            return Err(LedgerError::MalformedAddress(format!(
                "invalid length: expected {}, got {}",
                PAYLOAD_LENGTH,
                bytes.len()
            )));
        }
        if bytes[0] != ADDRESS_VERSION {
            return Err(LedgerError::MalformedAddress(format!(
                "unknown version byte 0x{:02x}",
                bytes[0]
            )));
        }

        let (payload, check) = bytes.split_at(PAYLOAD_LENGTH - CHECKSUM_LENGTH);
        if checksum(payload) != check {
            return Err(LedgerError::MalformedAddress("checksum mismatch".to_string()));
        }

        let mut hash = [0u8; 20];
        hash.copy_from_slice(&payload[1..]);
        Ok(hash)
    }
}

impl std::str::FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let address = Address(s.to_string());
        address.to_pubkey_hash()?;
        Ok(address)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_conversion() {
        let hash = [0x12; 20];
        let addr = Address::from_pubkey_hash(&hash);

        let decoded = addr.to_pubkey_hash().unwrap();
        assert_eq!(hash, decoded);
    }

    #[test]
    fn test_zero_hash_address_has_leading_one() {
        // Base58 maps each leading zero byte to '1'
        let addr = Address::from_pubkey_hash(&[0u8; 20]);
        assert!(addr.as_str().starts_with("11"));
    }

    #[test]
    fn test_checksum_mismatch_rejected() {
        let addr = Address::from_pubkey_hash(&[0x42; 20]);
        let mut bytes = bs58::decode(addr.as_str()).into_vec().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = Address(bs58::encode(bytes).into_string());

        let err = tampered.to_pubkey_hash().unwrap_err();
        assert!(matches!(err, LedgerError::MalformedAddress(_)));
    }

    #[test]
    fn test_invalid_base58_rejected() {
        // '0' and 'l' are not in the Base58 alphabet
        let err = "0lll".parse::<Address>().unwrap_err();
        assert!(matches!(err, LedgerError::MalformedAddress(_)));
    }

    #[test]
    fn test_wrong_length_rejected() {
        let short = Address(bs58::encode([0u8; 10]).into_string());
        assert!(matches!(
            short.to_pubkey_hash(),
            Err(LedgerError::MalformedAddress(_))
        ));
    }

    #[test]
    fn test_from_pubkey_matches_hash160() {
        let pubkey = [0x02; 33];
        let addr = Address::from_pubkey(&pubkey);
        assert_eq!(addr.to_pubkey_hash().unwrap(), hash160(&pubkey));
    }
}
