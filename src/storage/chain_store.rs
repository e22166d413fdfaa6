// Append-only block storage on top of Sled.
// Blocks live under their own hash; one fixed key points at the newest block. Both are
// written in a single Sled transaction, so readers never see a tip without its block.

use crate::core::Block;
use crate::error::{BlockchainError, Result};
use data_encoding::HEXLOWER;
use log::{debug, info};
use sled::transaction::{abort, ConflictableTransactionResult, TransactionError};
use sled::{Db, Tree};
use std::path::{Path, PathBuf};

/// Key holding the hash of the most recently appended block
pub const TIP_BLOCK_HASH_KEY: &str = "lastHashKey";
const BLOCKS_TREE: &str = "blocks";

/// Handle to an open chain store. Cloning shares the underlying database, so readers
/// on other threads can use a clone while one writer appends.
#[derive(Clone)]
pub struct ChainStore {
    db: Db,
    blocks: Tree,
    path: PathBuf,
}

impl ChainStore {
    /// Opens or creates the store at `path`. Callers should treat failure as fatal:
    /// without a store there is nowhere to persist blocks.
    ///
    /// No background flusher is started; every append is flushed before it returns, and
    /// the file lock is released as soon as the last handle drops.
    pub fn open(path: impl AsRef<Path>) -> Result<ChainStore> {
        let path = path.as_ref().to_path_buf();
        let db = sled::Config::new()
            .path(&path)
            .flush_every_ms(None)
            .open()
            .map_err(|e| {
                BlockchainError::Database(format!(
                    "Failed to open database at {}: {e}",
                    path.display()
                ))
            })?;
        let blocks = db
            .open_tree(BLOCKS_TREE)
            .map_err(|e| BlockchainError::Database(format!("Failed to open blocks tree: {e}")))?;

        info!("Opened chain store at {}", path.display());
        Ok(ChainStore { db, blocks, path })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub fn has_chain(&self) -> Result<bool> {
        self.blocks
            .contains_key(TIP_BLOCK_HASH_KEY)
            .map_err(|e| BlockchainError::Database(format!("Failed to read tip hash: {e}")))
    }

    pub fn get_tip(&self) -> Result<Vec<u8>> {
        self.blocks
            .get(TIP_BLOCK_HASH_KEY)
            .map_err(|e| BlockchainError::Database(format!("Failed to read tip hash: {e}")))?
            .map(|tip| tip.to_vec())
            .ok_or(BlockchainError::TipNotFound)
    }

    pub fn get_tip_block(&self) -> Result<Block> {
        self.get_block(&self.get_tip()?)
    }

    pub fn get_block(&self, block_hash: &[u8]) -> Result<Block> {
        let not_found = || BlockchainError::BlockNotFound(HEXLOWER.encode(block_hash));
        if block_hash == TIP_BLOCK_HASH_KEY.as_bytes() {
            return Err(not_found());
        }

        let block_bytes = self
            .blocks
            .get(block_hash)
            .map_err(|e| BlockchainError::Database(format!("Failed to get block: {e}")))?
            .ok_or_else(not_found)?;
        Block::deserialize(block_bytes.as_ref())
    }

    pub fn contains_block(&self, block_hash: &[u8]) -> Result<bool> {
        if block_hash == TIP_BLOCK_HASH_KEY.as_bytes() {
            return Ok(false);
        }
        self.blocks.contains_key(block_hash).map_err(|e| {
            BlockchainError::Database(format!("Failed to check block existence: {e}"))
        })
    }

    /// Stores `block` under its hash and moves the tip to it, atomically.
    ///
    /// The block must extend the current tip (or be a genesis block on an empty
    /// store), and its hash must not already be stored.
    pub fn append_block(&self, block: &Block) -> Result<()> {
        let block_hash = block.get_hash();
        if block_hash.is_empty() || block_hash == TIP_BLOCK_HASH_KEY.as_bytes() {
            return Err(BlockchainError::InvalidBlock(format!(
                "Unusable block hash {}",
                block.get_hash_hex()
            )));
        }
        let block_data = block.serialize()?;

        self.blocks
            .transaction(|tx_db| -> ConflictableTransactionResult<(), BlockchainError> {
                if tx_db.get(block_hash)?.is_some() {
                    return abort(BlockchainError::InvalidBlock(format!(
                        "Block {} is already stored",
                        block.get_hash_hex()
                    )));
                }

                match tx_db.get(TIP_BLOCK_HASH_KEY)? {
                    Some(tip) if tip.as_ref() != block.get_pre_block_hash() => {
                        return abort(BlockchainError::InvalidBlock(format!(
                            "Block {} does not extend tip {}",
                            block.get_hash_hex(),
                            HEXLOWER.encode(tip.as_ref())
                        )));
                    }
                    None if !block.is_genesis() => {
                        return abort(BlockchainError::InvalidBlock(format!(
                            "First block {} must not reference a parent",
                            block.get_hash_hex()
                        )));
                    }
                    _ => {}
                }

                tx_db.insert(block_hash, block_data.as_slice())?;
                tx_db.insert(TIP_BLOCK_HASH_KEY, block_hash)?;
                Ok(())
            })
            .map_err(|e| match e {
                TransactionError::Abort(e) => e,
                TransactionError::Storage(e) => {
                    BlockchainError::Database(format!("Failed to append block: {e}"))
                }
            })?;
        self.db
            .flush()
            .map_err(|e| BlockchainError::Database(format!("Failed to flush block: {e}")))?;

        debug!(
            "Appended block {} at height {}",
            block.get_hash_hex(),
            block.get_height()
        );
        Ok(())
    }

    /// Walks the chain from the tip back to the genesis block.
    pub fn iter(&self) -> Result<BlockIterator> {
        let next_hash = match self.get_tip() {
            Ok(tip) => Some(tip),
            Err(BlockchainError::TipNotFound) => None,
            Err(e) => return Err(e),
        };
        Ok(BlockIterator {
            store: self.clone(),
            next_hash,
        })
    }

    /// Flushes pending writes and releases this handle. Clones made earlier (including
    /// live iterators) keep the database open until they are dropped too.
    pub fn close(self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| BlockchainError::Database(format!("Failed to flush database: {e}")))?;
        info!("Closed chain store at {}", self.path.display());
        Ok(())
    }
}

pub struct BlockIterator {
    store: ChainStore,
    next_hash: Option<Vec<u8>>,
}

impl Iterator for BlockIterator {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next_hash.take()?;
        match self.store.get_block(&hash) {
            Ok(block) => {
                if !block.is_genesis() {
                    self.next_hash = Some(block.get_pre_block_hash().to_vec());
                }
                Some(Ok(block))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;
    use crate::error::ErrorKind;
    use crate::wallet::Wallet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    fn coinbase() -> Transaction {
        Transaction::new_coinbase_tx(&Wallet::new().unwrap().get_address()).unwrap()
    }

    fn next_block(parent: &Block) -> Block {
        Block::new(parent.get_hash(), &[coinbase()], parent.get_height() + 1).unwrap()
    }

    #[test]
    fn test_fresh_store_is_empty() {
        let dir = tempdir().unwrap();
        let store = ChainStore::open(dir.path().join("blocks")).unwrap();

        assert!(!store.has_chain().unwrap());
        assert_eq!(store.get_tip().unwrap_err(), BlockchainError::TipNotFound);
        assert_eq!(store.iter().unwrap().count(), 0);
    }

    #[test]
    fn test_append_moves_tip() {
        let dir = tempdir().unwrap();
        let store = ChainStore::open(dir.path().join("blocks")).unwrap();

        let genesis = Block::generate_genesis_block(&coinbase()).unwrap();
        store.append_block(&genesis).unwrap();
        assert!(store.has_chain().unwrap());
        assert_eq!(store.get_tip().unwrap(), genesis.get_hash());

        let child = next_block(&genesis);
        store.append_block(&child).unwrap();
        assert_eq!(store.get_tip().unwrap(), child.get_hash());
        assert_eq!(store.get_block(child.get_hash()).unwrap(), child);
        assert_eq!(store.get_block(genesis.get_hash()).unwrap(), genesis);
        assert_eq!(store.get_tip_block().unwrap(), child);
    }

    #[test]
    fn test_missing_block_is_not_found() {
        let dir = tempdir().unwrap();
        let store = ChainStore::open(dir.path().join("blocks")).unwrap();

        let err = store.get_block(&[9; 32]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!store.contains_block(&[9; 32]).unwrap());
        // The tip key is not a block
        assert!(store
            .get_block(TIP_BLOCK_HASH_KEY.as_bytes())
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_duplicate_block_is_rejected() {
        let dir = tempdir().unwrap();
        let store = ChainStore::open(dir.path().join("blocks")).unwrap();

        let genesis = Block::generate_genesis_block(&coinbase()).unwrap();
        store.append_block(&genesis).unwrap();
        let err = store.append_block(&genesis).unwrap_err();
        assert!(matches!(err, BlockchainError::InvalidBlock(_)));
        assert_eq!(store.get_tip().unwrap(), genesis.get_hash());
    }

    #[test]
    fn test_unlinked_block_is_rejected() {
        let dir = tempdir().unwrap();
        let store = ChainStore::open(dir.path().join("blocks")).unwrap();

        // A child on an empty store has no parent to extend
        let orphan = Block::new(&[3; 32], &[coinbase()], 1).unwrap();
        assert!(store.append_block(&orphan).is_err());
        assert!(!store.has_chain().unwrap());

        let genesis = Block::generate_genesis_block(&coinbase()).unwrap();
        store.append_block(&genesis).unwrap();
        let first = next_block(&genesis);
        store.append_block(&first).unwrap();

        // Sibling of `first`: extends genesis, not the tip
        let stale = next_block(&genesis);
        let err = store.append_block(&stale).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.get_tip().unwrap(), first.get_hash());
        assert!(!store.contains_block(stale.get_hash()).unwrap());
    }

    #[test]
    fn test_iterates_from_tip_to_genesis() {
        let dir = tempdir().unwrap();
        let store = ChainStore::open(dir.path().join("blocks")).unwrap();

        let mut parent = Block::generate_genesis_block(&coinbase()).unwrap();
        store.append_block(&parent).unwrap();
        for _ in 0..4 {
            let block = next_block(&parent);
            store.append_block(&block).unwrap();
            parent = block;
        }

        let heights: Vec<usize> = store
            .iter()
            .unwrap()
            .map(|block| block.unwrap().get_height())
            .collect();
        assert_eq!(heights, vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_reopen_keeps_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocks");

        let genesis = Block::generate_genesis_block(&coinbase()).unwrap();
        let store = ChainStore::open(&path).unwrap();
        store.append_block(&genesis).unwrap();
        store.close().unwrap();

        let reopened = ChainStore::open(&path).unwrap();
        assert!(reopened.has_chain().unwrap());
        assert_eq!(reopened.get_tip().unwrap(), genesis.get_hash());
        assert_eq!(reopened.get_block(genesis.get_hash()).unwrap(), genesis);
    }

    #[test]
    fn test_close_releases_store_for_reopen() {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                thread::spawn(|| {
                    let dir = tempdir().unwrap();
                    let path = dir.path().join("blocks");
                    let genesis = Block::generate_genesis_block(&coinbase()).unwrap();
                    let store = ChainStore::open(&path).unwrap();
                    store.append_block(&genesis).unwrap();
                    store.close().unwrap();

                    let mut tip = genesis;
                    for _ in 0..20 {
                        let store = ChainStore::open(&path).unwrap();
                        assert_eq!(store.get_tip().unwrap(), tip.get_hash());
                        let block = next_block(&tip);
                        store.append_block(&block).unwrap();
                        store.close().unwrap();
                        tip = block;
                    }

                    let store = ChainStore::open(&path).unwrap();
                    assert_eq!(store.get_tip_block().unwrap().get_height(), 20);
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
    }

    #[test]
    fn test_readers_never_see_dangling_tip() {
        let dir = tempdir().unwrap();
        let store = ChainStore::open(dir.path().join("blocks")).unwrap();
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let store = store.clone();
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    while !done.load(Ordering::SeqCst) {
                        if let Ok(tip) = store.get_tip() {
                            assert!(store.get_block(&tip).is_ok());
                        }
                    }
                })
            })
            .collect();

        let mut parent = Block::generate_genesis_block(&coinbase()).unwrap();
        store.append_block(&parent).unwrap();
        for _ in 0..20 {
            let block = next_block(&parent);
            store.append_block(&block).unwrap();
            parent = block;
        }
        done.store(true, Ordering::SeqCst);

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.get_tip_block().unwrap().get_height(), 20);
    }
}
