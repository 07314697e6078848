// Key pairs and transaction building

mod keys;
mod tx_builder;

pub use keys::KeyPair;
pub use tx_builder::TransactionBuilder;
