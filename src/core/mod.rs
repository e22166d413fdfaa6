//! Core ledger types
//!
//! Transactions and their unlock capability, and the block record the chain store
//! persists.

pub mod block;
pub mod signature;
pub mod transaction;

pub use block::Block;
pub use signature::{EcdsaVerifier, Signer, Verifier};
pub use transaction::{SpendableOutputs, TXInput, TXOutput, Transaction, COINBASE_VOUT, SUBSIDY};
