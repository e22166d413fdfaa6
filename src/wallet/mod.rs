//! Wallet management and address derivation
//!
//! `wallet` holds the address codec (key generation, public-key hashing, checksummed
//! base58 addresses). `wallets` is the address -> wallet collection and its snapshot file.

#[allow(clippy::module_inception)]
pub mod wallet;
pub mod wallets;

pub use wallet::{
    checksum, convert_address, decode_pub_key_hash, hash_pub_key, validate_address, Wallet,
    ADDRESS_CHECK_SUM_LEN,
};
pub use wallets::{Wallets, WALLET_FILE};
