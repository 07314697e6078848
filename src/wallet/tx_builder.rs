// Transaction builder

use crate::core::{hash160, PubKeyHash, Transaction, TxInput, TxOutput};
use crate::error::{LedgerError, Result};
use crate::storage::Ledger;
use crate::wallet::KeyPair;

/// Builds payments from the committed UTXO view of a ledger
pub struct TransactionBuilder<'a> {
    ledger: &'a Ledger,
}

impl<'a> TransactionBuilder<'a> {
    /// Create a new transaction builder
    pub fn new(ledger: &'a Ledger) -> Self {
        Self { ledger }
    }

    /// Build an unsigned payment of `amount` from the owner of
    /// `from_pub_key` to `to`, returning change to the sender.
    pub fn build(&self, from_pub_key: &[u8], to: &PubKeyHash, amount: u64) -> Result<Transaction> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let sender = hash160(from_pub_key);
        let selected = self.ledger.find_spendable_outputs(&sender, amount)?;
        if selected.total < amount {
            return Err(LedgerError::InsufficientFunds {
                available: selected.total,
                requested: amount,
            });
        }

        let inputs = selected
            .outputs
            .iter()
            .map(|utxo| TxInput::spending(&utxo.outpoint, from_pub_key.to_vec()))
            .collect::<Result<Vec<TxInput>>>()?;

        let mut outputs = vec![TxOutput::new(amount, *to)];
        let change = selected.total - amount;
        if change > 0 {
            outputs.push(TxOutput::new(change, sender));
        }

        let tx = Transaction::new(inputs, outputs);
        log::debug!(
            "Built transaction {} spending {} outputs ({} change)",
            tx.id,
            tx.inputs.len(),
            change
        );
        Ok(tx)
    }

    /// Build and sign a payment from `from`
    pub fn build_signed(&self, from: &KeyPair, to: &PubKeyHash, amount: u64) -> Result<Transaction> {
        let mut tx = self.build(&from.pubkey_bytes(), to, amount)?;
        from.sign_transaction(&mut tx)?;
        Ok(tx)
    }
}

impl Ledger {
    /// Unsigned payment built against the committed chain. Selected
    /// outputs are not reserved until the transaction is mined.
    pub fn create_transaction(&self, from_pub_key: &[u8], to: &PubKeyHash, amount: u64) -> Result<Transaction> {
        TransactionBuilder::new(self).build(from_pub_key, to, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn setup(dir: &tempfile::TempDir, owner: &KeyPair) -> Ledger {
        let config = Config {
            difficulty: 4,
            ..Config::with_data_dir(dir.path())
        };
        Ledger::initialize(config, &owner.pubkey_hash()).unwrap()
    }

    #[test]
    fn test_transaction_builder() {
        let dir = tempfile::tempdir().unwrap();
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let ledger = setup(&dir, &alice);

        let builder = TransactionBuilder::new(&ledger);
        let tx = builder.build_signed(&alice, &bob.pubkey_hash(), 300).unwrap();

        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 2); // Payment + change
        assert_eq!(tx.outputs[0], TxOutput::new(300, bob.pubkey_hash()));
        assert_eq!(tx.outputs[1], TxOutput::new(700, alice.pubkey_hash()));
        assert_eq!(tx.inputs[0].spender_pub_key, alice.pubkey_bytes());
        assert!(tx.verify_signatures());
        assert_eq!(tx.compute_id(), tx.id);
    }

    #[test]
    fn test_exact_amount_has_no_change() {
        let dir = tempfile::tempdir().unwrap();
        let alice = KeyPair::generate();
        let ledger = setup(&dir, &alice);

        let tx = ledger
            .create_transaction(&alice.pubkey_bytes(), &[4; 20], 1000)
            .unwrap();
        assert_eq!(tx.outputs, vec![TxOutput::new(1000, [4; 20])]);
        assert!(tx.inputs[0].signature.is_empty());
    }

    #[test]
    fn test_selection_spans_several_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let alice = KeyPair::generate();
        let mut ledger = setup(&dir, &alice);

        // Split the genesis output into 400 + 600, both back to Alice
        let split = TransactionBuilder::new(&ledger)
            .build_signed(&alice, &alice.pubkey_hash(), 400)
            .unwrap();
        ledger.submit_transaction(split).unwrap();
        ledger.run_mining_cycle().unwrap().unwrap();

        let tx = ledger
            .create_transaction(&alice.pubkey_bytes(), &[4; 20], 900)
            .unwrap();
        assert_eq!(tx.inputs.len(), 2);
        assert_eq!(tx.outputs, vec![TxOutput::new(900, [4; 20]), TxOutput::new(100, alice.pubkey_hash())]);
    }

    #[test]
    fn test_insufficient_funds() {
        let dir = tempfile::tempdir().unwrap();
        let alice = KeyPair::generate();
        let ledger = setup(&dir, &alice);

        let result = ledger.create_transaction(&alice.pubkey_bytes(), &[4; 20], 5000);
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds { available: 1000, requested: 5000 })
        ));

        // No funds at all
        let stranger = KeyPair::generate();
        let result = ledger.create_transaction(&stranger.pubkey_bytes(), &[4; 20], 1);
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds { available: 0, requested: 1 })
        ));
    }

    #[test]
    fn test_zero_amount_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let alice = KeyPair::generate();
        let ledger = setup(&dir, &alice);

        let result = ledger.create_transaction(&alice.pubkey_bytes(), &[4; 20], 0);
        assert!(matches!(result, Err(LedgerError::InvalidAmount)));
    }
}
