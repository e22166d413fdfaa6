//! Data storage and persistence
//!
//! The chain store maps the chain onto Sled: blocks keyed by hash plus a tip pointer.

pub mod chain_store;

pub use chain_store::{BlockIterator, ChainStore, TIP_BLOCK_HASH_KEY};
