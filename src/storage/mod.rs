// Storage layer: chain store, derived UTXO views and the pending pool

mod ledger;
mod pool;
mod utxo;

pub use ledger::{ChainIter, Ledger, GENESIS_PREV_KEY, TIP_KEY};
#[cfg(test)]
pub(crate) use ledger::retry_while_locked;
pub use pool::TransactionPool;
pub use utxo::{UnspentOutput, UtxoView};
