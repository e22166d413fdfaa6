use crate::core::Transaction;
use crate::error::{BlockchainError, Result};
use crate::utils::{current_timestamp, deserialize, serialize, sha256_digest};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};

/// A block as persisted by the chain store. Mining and consensus live outside this
/// crate; they either build blocks with [`Block::from_parts`] or let [`Block::new`]
/// derive the header hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    timestamp: i64,
    pre_block_hash: Vec<u8>,
    hash: Vec<u8>,
    transactions: Vec<Transaction>,
    nonce: i64,
    height: usize,
}

// Fields covered by the block hash
#[derive(bincode::Encode)]
struct BlockHeader {
    timestamp: i64,
    pre_block_hash: Vec<u8>,
    transactions_hash: Vec<u8>,
    nonce: i64,
    height: usize,
}

impl Block {
    pub fn new(pre_block_hash: &[u8], transactions: &[Transaction], height: usize) -> Result<Block> {
        if transactions.is_empty() {
            return Err(BlockchainError::InvalidBlock(
                "Block must contain at least one transaction".to_string(),
            ));
        }

        let mut block = Block {
            timestamp: current_timestamp()?,
            pre_block_hash: pre_block_hash.to_vec(),
            hash: vec![],
            transactions: transactions.to_vec(),
            nonce: 0,
            height,
        };
        block.hash = block.header_hash()?;
        Ok(block)
    }

    /// First block of a chain: no parent, height zero.
    pub fn generate_genesis_block(transaction: &Transaction) -> Result<Block> {
        Block::new(&[], std::slice::from_ref(transaction), 0)
    }

    pub fn from_parts(
        timestamp: i64,
        pre_block_hash: Vec<u8>,
        hash: Vec<u8>,
        transactions: Vec<Transaction>,
        nonce: i64,
        height: usize,
    ) -> Block {
        Block {
            timestamp,
            pre_block_hash,
            hash,
            transactions,
            nonce,
            height,
        }
    }

    fn header_hash(&self) -> Result<Vec<u8>> {
        let header = BlockHeader {
            timestamp: self.timestamp,
            pre_block_hash: self.pre_block_hash.clone(),
            transactions_hash: self.hash_transactions(),
            nonce: self.nonce,
            height: self.height,
        };
        let config = bincode::config::standard();
        let bytes = bincode::encode_to_vec(&header, config)?;
        Ok(sha256_digest(bytes.as_slice()))
    }

    pub fn hash_transactions(&self) -> Vec<u8> {
        let mut txhashs = vec![];
        for transaction in &self.transactions {
            txhashs.extend(transaction.get_id());
        }
        sha256_digest(txhashs.as_slice())
    }

    pub fn is_genesis(&self) -> bool {
        self.pre_block_hash.is_empty()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize(bytes)
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_pre_block_hash(&self) -> &[u8] {
        self.pre_block_hash.as_slice()
    }

    pub fn get_hash(&self) -> &[u8] {
        self.hash.as_slice()
    }

    pub fn get_hash_hex(&self) -> String {
        HEXLOWER.encode(self.hash.as_slice())
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_nonce(&self) -> i64 {
        self.nonce
    }

    pub fn get_height(&self) -> usize {
        self.height
    }
}
