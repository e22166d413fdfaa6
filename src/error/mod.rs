//! Error handling for the ledger core
//!
//! Every fallible operation in the crate returns [`Result`]. Nothing here panics or
//! exits the process; callers decide whether to abort or retry.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Broad classification of a [`BlockchainError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Expected rejection of caller input (funds, checksums, malformed records)
    Validation,
    /// A wallet, block or tip that does not exist
    NotFound,
    /// Storage engine or filesystem failure
    Storage,
    /// Bytes that cannot be decoded or used: corrupt records, schema mismatches,
    /// unusable key material and failed cryptographic operations
    Encoding,
}

/// Error types for ledger operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    /// Database-related errors
    Database(String),
    /// Cryptographic operation errors
    Crypto(String),
    /// Transaction construction or validation errors
    Transaction(String),
    /// Configuration errors
    Config(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// File I/O errors
    Io(String),
    /// Invalid address format or checksum mismatch
    InvalidAddress(String),
    /// Insufficient funds for transaction
    InsufficientFunds { required: u64, available: u64 },
    /// Block rejected by the append-only store
    InvalidBlock(String),
    /// No wallet stored under this address
    WalletNotFound(String),
    /// No block stored under this hash (hex)
    BlockNotFound(String),
    /// The chain is empty, so there is no tip
    TipNotFound,
}

impl BlockchainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlockchainError::Transaction(_)
            | BlockchainError::InvalidAddress(_)
            | BlockchainError::InsufficientFunds { .. }
            | BlockchainError::InvalidBlock(_) => ErrorKind::Validation,
            BlockchainError::WalletNotFound(_)
            | BlockchainError::BlockNotFound(_)
            | BlockchainError::TipNotFound => ErrorKind::NotFound,
            BlockchainError::Database(_) | BlockchainError::Io(_) | BlockchainError::Config(_) => {
                ErrorKind::Storage
            }
            BlockchainError::Serialization(_) | BlockchainError::Crypto(_) => ErrorKind::Encoding,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::Database(msg) => write!(f, "Database error: {msg}"),
            BlockchainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            BlockchainError::Transaction(msg) => write!(f, "Transaction error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
            BlockchainError::InvalidAddress(addr) => write!(f, "Invalid address: {addr}"),
            BlockchainError::InsufficientFunds {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds: required {required}, available {available}"
                )
            }
            BlockchainError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            BlockchainError::WalletNotFound(addr) => write!(f, "Wallet not found: {addr}"),
            BlockchainError::BlockNotFound(hash) => write!(f, "Block not found: {hash}"),
            BlockchainError::TipNotFound => write!(f, "Chain is empty: no tip block"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<sled::Error> for BlockchainError {
    fn from(err: sled::Error) -> Self {
        BlockchainError::Database(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for BlockchainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for BlockchainError {
    fn from(err: bincode::error::DecodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}
