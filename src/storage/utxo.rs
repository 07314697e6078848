// Unspent output derivation by backward chain scan

use crate::core::{Hash256, OutPoint, PubKeyHash};
use crate::error::Result;
use crate::storage::Ledger;
use std::collections::{BTreeMap, HashMap, HashSet};

/// One unspent output owned by the scanned address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnspentOutput {
    pub outpoint: OutPoint,
    pub value: u64,
}

/// Unspent outputs of one address, newest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoView {
    /// Sum of all collected output values
    pub total: u64,
    pub outputs: Vec<UnspentOutput>,
}

impl UtxoView {
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Value of an outpoint if it is in this view
    pub fn value_of(&self, outpoint: &OutPoint) -> Option<u64> {
        self.outputs
            .iter()
            .find(|utxo| utxo.outpoint == *outpoint)
            .map(|utxo| utxo.value)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.value_of(outpoint).is_some()
    }

    /// Output indices grouped by transaction id
    pub fn by_transaction(&self) -> BTreeMap<Hash256, Vec<u32>> {
        let mut grouped: BTreeMap<Hash256, Vec<u32>> = BTreeMap::new();
        for utxo in &self.outputs {
            grouped.entry(utxo.outpoint.tx_id).or_default().push(utxo.outpoint.index);
        }
        grouped
    }
}

impl Ledger {
    /// Scan from the tip back to genesis collecting outputs locked to
    /// `address` that no later input of the same address spends.
    ///
    /// Within a block transactions are visited newest first and a
    /// transaction's outputs are checked before its inputs are recorded.
    /// With `stop_at` the scan returns as soon as the total reaches it.
    pub fn scan_backward(&self, address: &PubKeyHash, stop_at: Option<u64>) -> Result<UtxoView> {
        let mut spent: HashMap<Hash256, HashSet<u32>> = HashMap::new();
        let mut view = UtxoView::default();

        for block in self.iter() {
            let block = block?;

            for tx in block.transactions.iter().rev() {
                let spent_here = spent.get(&tx.id);

                for (index, output) in tx.outputs.iter().enumerate() {
                    let index = index as u32;
                    if !output.is_locked_to(address) {
                        continue;
                    }
                    if spent_here.is_some_and(|indices| indices.contains(&index)) {
                        continue;
                    }

                    view.total = view.total.saturating_add(output.value);
                    view.outputs.push(UnspentOutput {
                        outpoint: OutPoint::new(tx.id, index),
                        value: output.value,
                    });

                    if stop_at.is_some_and(|amount| view.total >= amount) {
                        return Ok(view);
                    }
                }

                if tx.is_mint() {
                    continue;
                }
                for input in tx.inputs.iter().filter(|input| input.belongs_to(address)) {
                    if let Some(outpoint) = input.outpoint() {
                        spent.entry(outpoint.tx_id).or_default().insert(outpoint.index);
                    }
                }
            }
        }

        log::debug!(
            "Scanned chain: {} unspent outputs worth {}",
            view.outputs.len(),
            view.total
        );
        Ok(view)
    }

    /// Every unspent output of `address`
    pub fn find_utxos(&self, address: &PubKeyHash) -> Result<UtxoView> {
        self.scan_backward(address, None)
    }

    /// Newest-first selection until `amount` is covered. The returned total
    /// is below `amount` only when the address cannot cover it.
    pub fn find_spendable_outputs(&self, address: &PubKeyHash, amount: u64) -> Result<UtxoView> {
        self.scan_backward(address, Some(amount))
    }

    pub fn balance(&self, address: &PubKeyHash) -> Result<u64> {
        Ok(self.find_utxos(address)?.total)
    }
}
