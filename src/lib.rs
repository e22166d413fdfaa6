//! # Ledger Core
//!
//! The ledger half of a small UTXO cryptocurrency: addresses, wallets, transactions
//! and the append-only block store. Mining, networking and the UTXO index are
//! somebody else's job; this crate takes their results as inputs.
//!
//! ## Layout
//! - `wallet/`: key generation, Bitcoin-style checksummed addresses, the wallet snapshot
//! - `core/`: transactions, the signing capability, the block record
//! - `storage/`: the Sled-backed chain store (blocks by hash plus a tip pointer)
//! - `config/`: where the store and the snapshot live
//! - `utils/`: hashing, base58, ECDSA P-256 and bincode helpers
//! - `error/`: the crate-wide error type
//!
//! ## Typical flow
//! 1. `Config::from_env()`, then `open_chain_store()` and `load_wallets()`
//! 2. `Wallets::create()` for a new address, `Wallets::persist()` to save it
//! 3. `Transaction::new_coinbase_tx` / `Transaction::new_utxo_transaction` with the
//!    spendable outputs reported by the UTXO index
//! 4. `ChainStore::append_block` once the miner has a block

pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod utils;
pub mod wallet;

pub use config::Config;
pub use core::{
    Block, EcdsaVerifier, Signer, SpendableOutputs, TXInput, TXOutput, Transaction, Verifier,
    COINBASE_VOUT, SUBSIDY,
};
pub use error::{BlockchainError, ErrorKind, Result};
pub use storage::{BlockIterator, ChainStore, TIP_BLOCK_HASH_KEY};
pub use wallet::{
    checksum, convert_address, decode_pub_key_hash, hash_pub_key, validate_address, Wallet,
    Wallets, ADDRESS_CHECK_SUM_LEN, WALLET_FILE,
};
