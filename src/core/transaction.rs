// Transaction data structures

use crate::core::{hash160, sha256, Hash256, PubKeyHash, Serializable};
use crate::core::serialize::{decode_err, read_array, read_var_bytes, read_varint, write_var_bytes, write_varint};
use crate::error::{LedgerError, Result};
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use std::io::{Cursor, Read};

/// Output index carried by the single input of a mint transaction
pub const MINT_OUTPUT_INDEX: i32 = -1;

/// Reference to one output of a committed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    pub tx_id: Hash256,
    pub index: u32,
}

impl OutPoint {
    pub fn new(tx_id: Hash256, index: u32) -> Self {
        Self { tx_id, index }
    }
}

/// Transaction input - references a previous transaction output
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TxInput {
    /// ID of the transaction holding the spent output
    pub prev_tx_id: Hash256,
    /// Index of the output in that transaction, or -1 for a mint
    pub output_index: i32,
    /// Serialized public key of the spender (free-form data for a mint)
    pub spender_pub_key: Vec<u8>,
    /// DER-encoded ECDSA signature, empty for a mint
    pub signature: Vec<u8>,
}

impl TxInput {
    /// Create a new unsigned input
    pub fn new(prev_tx_id: Hash256, output_index: i32, spender_pub_key: Vec<u8>) -> Self {
        Self {
            prev_tx_id,
            output_index,
            spender_pub_key,
            signature: Vec::new(),
        }
    }

    /// Unsigned input spending `outpoint`. Indices past `i32::MAX` have no
    /// input encoding and are rejected.
    pub fn spending(outpoint: &OutPoint, spender_pub_key: Vec<u8>) -> Result<Self> {
        let index = i32::try_from(outpoint.index)
            .map_err(|_| LedgerError::OutputIndexOutOfRange(outpoint.index))?;
        Ok(Self::new(outpoint.tx_id, index, spender_pub_key))
    }

    /// Create the sentinel input of a mint transaction
    pub fn mint(data: Vec<u8>) -> Self {
        Self {
            prev_tx_id: Hash256::zero(),
            output_index: MINT_OUTPUT_INDEX,
            spender_pub_key: data,
            signature: Vec::new(),
        }
    }

    pub fn is_mint(&self) -> bool {
        self.output_index == MINT_OUTPUT_INDEX
    }

    /// The referenced output, `None` for negative indices
    pub fn outpoint(&self) -> Option<OutPoint> {
        u32::try_from(self.output_index)
            .ok()
            .map(|index| OutPoint::new(self.prev_tx_id, index))
    }

    /// Whether the spender key hashes to `address`
    pub fn belongs_to(&self, address: &PubKeyHash) -> bool {
        hash160(&self.spender_pub_key) == *address
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.prev_tx_id.as_bytes());
        buf.extend_from_slice(&self.output_index.to_le_bytes());
        write_var_bytes(buf, &self.spender_pub_key);
        write_var_bytes(buf, &self.signature);
    }

    fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let prev_tx_id = Hash256::new(read_array(reader).map_err(decode_err("input prev tx id"))?);
        let output_index = i32::from_le_bytes(read_array(reader).map_err(decode_err("input index"))?);
        let spender_pub_key = read_var_bytes(reader).map_err(decode_err("input public key"))?;
        let signature = read_var_bytes(reader).map_err(decode_err("input signature"))?;

        Ok(Self {
            prev_tx_id,
            output_index,
            spender_pub_key,
            signature,
        })
    }
}

/// Transaction output - specifies amount and recipient
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub pub_key_hash: PubKeyHash,
}

impl TxOutput {
    pub fn new(value: u64, pub_key_hash: PubKeyHash) -> Self {
        Self { value, pub_key_hash }
    }

    pub fn is_locked_to(&self, address: &PubKeyHash) -> bool {
        self.pub_key_hash == *address
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.value.to_le_bytes());
        buf.extend_from_slice(&self.pub_key_hash);
    }

    fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let value = u64::from_le_bytes(read_array(reader).map_err(decode_err("output value"))?);
        let pub_key_hash = read_array(reader).map_err(decode_err("output pubkey hash"))?;
        Ok(Self { value, pub_key_hash })
    }
}

/// Transaction
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    pub id: Hash256,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Create a new transaction and assign its id
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        let mut tx = Self {
            id: Hash256::zero(),
            inputs,
            outputs,
        };
        tx.set_id();
        tx
    }

    /// Create a mint transaction issuing `amount` to `recipient`
    pub fn mint(recipient: &PubKeyHash, amount: u64, data: Vec<u8>) -> Self {
        Self::new(vec![TxInput::mint(data)], vec![TxOutput::new(amount, *recipient)])
    }

    /// Exactly one input carrying the mint sentinel index
    pub fn is_mint(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_mint()
    }

    /// SHA256 over the encoding with the id zeroed and signatures cleared
    pub fn compute_id(&self) -> Hash256 {
        let mut copy = self.clone();
        copy.id = Hash256::zero();
        for input in &mut copy.inputs {
            input.signature.clear();
        }
        sha256(&copy.serialize())
    }

    pub fn set_id(&mut self) {
        self.id = self.compute_id();
    }

    /// Sum of output values, `None` on overflow
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }

    /// Digest signed for one input: every key and signature cleared except
    /// this input's public key
    pub fn signature_digest(&self, input_index: usize) -> Hash256 {
        let mut plain = self.clone();
        for input in &mut plain.inputs {
            input.spender_pub_key.clear();
            input.signature.clear();
        }
        if let (Some(target), Some(source)) =
            (plain.inputs.get_mut(input_index), self.inputs.get(input_index))
        {
            target.spender_pub_key = source.spender_pub_key.clone();
        }
        sha256(&plain.serialize())
    }

    /// Sign every input with `secret_key`; mint transactions are left unsigned
    pub fn sign(&mut self, secret_key: &SecretKey) -> Result<()> {
        if self.is_mint() {
            return Ok(());
        }

        let secp = Secp256k1::signing_only();
        let signatures: Vec<Vec<u8>> = (0..self.inputs.len())
            .map(|i| {
                let message = Message::from_digest(self.signature_digest(i).0);
                secp.sign_ecdsa(&message, secret_key).serialize_der().to_vec()
            })
            .collect();

        for (input, signature) in self.inputs.iter_mut().zip(signatures) {
            input.signature = signature;
        }
        Ok(())
    }

    /// Check every input signature against its spender key
    pub fn verify_signatures(&self) -> bool {
        if self.is_mint() {
            return true;
        }

        let secp = Secp256k1::verification_only();
        self.inputs.iter().enumerate().all(|(i, input)| {
            let Ok(public_key) = PublicKey::from_slice(&input.spender_pub_key) else {
                return false;
            };
            let Ok(signature) = Signature::from_der(&input.signature) else {
                return false;
            };
            let message = Message::from_digest(self.signature_digest(i).0);
            secp.verify_ecdsa(&message, &signature, &public_key).is_ok()
        })
    }

    /// Deserialize from a reader (streaming inside a block)
    pub fn from_reader<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let id = Hash256::new(read_array(reader).map_err(decode_err("transaction id"))?);

        let input_count = read_varint(reader).map_err(decode_err("input count"))? as usize;
        let mut inputs = Vec::with_capacity(input_count.min(1024));
        for _ in 0..input_count {
            inputs.push(TxInput::read_from(reader)?);
        }

        let output_count = read_varint(reader).map_err(decode_err("output count"))? as usize;
        let mut outputs = Vec::with_capacity(output_count.min(1024));
        for _ in 0..output_count {
            outputs.push(TxOutput::read_from(reader)?);
        }

        Ok(Self { id, inputs, outputs })
    }

    pub(crate) fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.id.as_bytes());

        write_varint(buf, self.inputs.len() as u64);
        for input in &self.inputs {
            input.write_to(buf);
        }

        write_varint(buf, self.outputs.len() as u64);
        for output in &self.outputs {
            output.write_to(buf);
        }
    }
}

impl Serializable for Transaction {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_to(&mut buf);
        buf
    }

    fn deserialize(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let tx = Self::from_reader(&mut cursor)?;
        if cursor.position() as usize != data.len() {
            return Err(LedgerError::Serialization("trailing bytes after transaction".to_string()));
        }
        Ok(tx)
    }
}
