//! Ledger integration tests
//!
//! Wallets, transactions and the chain store working together the way a node
//! would drive them: the UTXO index is simulated by hand.

use data_encoding::HEXLOWER;
use ledger_core::{
    hash_pub_key, Block, BlockchainError, ChainStore, Config, EcdsaVerifier, ErrorKind,
    SpendableOutputs, Transaction, Wallets, SUBSIDY,
};
use std::collections::BTreeSet;
use tempfile::tempdir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn test_config(root: &std::path::Path) -> Config {
    Config {
        data_dir: root.join("blocks"),
        wallet_file: root.join("wallet.dat"),
    }
}

#[test]
fn test_coinbase_then_transfer_scenario() {
    init_logging();
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());

    let wallets = config.load_wallets().unwrap();
    let a1 = wallets.create().unwrap();
    let a2 = wallets.create().unwrap();

    let store = config.open_chain_store().unwrap();
    assert!(!store.has_chain().unwrap());

    let coinbase = Transaction::new_coinbase_tx(&a1).unwrap();
    assert!(coinbase.is_coinbase());
    let genesis = Block::generate_genesis_block(&coinbase).unwrap();
    store.append_block(&genesis).unwrap();
    assert_eq!(store.get_tip().unwrap(), genesis.get_hash());

    // What the UTXO index would report for A1: output 0 of the coinbase
    let stored = store.get_block(&store.get_tip().unwrap()).unwrap();
    let reward_tx = &stored.get_transactions()[0];
    let mut spendable = SpendableOutputs::new();
    spendable.insert(HEXLOWER.encode(reward_tx.get_id()), BTreeSet::from([0]));

    let sender = wallets.get(&a1).unwrap();
    let tx = Transaction::new_utxo_transaction(&a1, &a2, 40, SUBSIDY, &spendable, &sender)
        .unwrap();

    let outputs: Vec<(u64, String)> = tx
        .get_vout()
        .iter()
        .map(|out| (out.get_value(), out.get_address()))
        .collect();
    assert_eq!(outputs, vec![(40, a2.clone()), (60, a1.clone())]);
    assert!(!tx.is_coinbase());
    assert!(tx.verify(&EcdsaVerifier, reward_tx.get_vout()));

    let block = Block::new(genesis.get_hash(), &[tx.clone()], 1).unwrap();
    store.append_block(&block).unwrap();
    assert_eq!(store.get_tip().unwrap(), block.get_hash());
    assert_eq!(store.get_block(block.get_hash()).unwrap(), block);

    // The recipient can spend what it received
    let recipient = wallets.get(&a2).unwrap();
    let received = &tx.get_vout()[0];
    assert!(received.can_be_unlocked(&hash_pub_key(recipient.get_public_key())));

    store.close().unwrap();
}

#[test]
fn test_insufficient_funds_builds_nothing() {
    init_logging();
    let temp_dir = tempdir().unwrap();
    let wallets = Wallets::init(temp_dir.path().join("wallet.dat")).unwrap();
    let from = wallets.create().unwrap();
    let to = wallets.create().unwrap();
    let sender = wallets.get(&from).unwrap();

    let mut spendable = SpendableOutputs::new();
    spendable.insert(HEXLOWER.encode(&[5; 32]), BTreeSet::from([0]));

    let result = Transaction::new_utxo_transaction(&from, &to, 100, 50, &spendable, &sender);
    match result {
        Err(BlockchainError::InsufficientFunds {
            required,
            available,
        }) => {
            assert_eq!(required, 100);
            assert_eq!(available, 50);
        }
        other => panic!("expected insufficient funds, got {other:?}"),
    }
}

#[test]
fn test_wallets_survive_restart_and_still_sign() {
    init_logging();
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());

    let (from, to) = {
        let wallets = config.load_wallets().unwrap();
        let from = wallets.create().unwrap();
        let to = wallets.create().unwrap();
        wallets.persist().unwrap();
        (from, to)
    };

    let wallets = config.load_wallets().unwrap();
    let mut addresses = wallets.list().unwrap();
    addresses.sort();
    let mut expected = vec![from.clone(), to.clone()];
    expected.sort();
    assert_eq!(addresses, expected);

    let funding = Transaction::new_coinbase_tx(&from).unwrap();
    let mut spendable = SpendableOutputs::new();
    spendable.insert(HEXLOWER.encode(funding.get_id()), BTreeSet::from([0]));

    let sender = wallets.get(&from).unwrap();
    let tx =
        Transaction::new_utxo_transaction(&from, &to, SUBSIDY, SUBSIDY, &spendable, &sender)
            .unwrap();
    assert_eq!(tx.get_vout().len(), 1);
    assert!(tx.verify(&EcdsaVerifier, funding.get_vout()));
}

#[test]
fn test_chain_survives_reopen() {
    init_logging();
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let wallets = config.load_wallets().unwrap();
    let miner = wallets.create().unwrap();

    let mut hashes = vec![];
    {
        let store = config.open_chain_store().unwrap();
        let mut parent =
            Block::generate_genesis_block(&Transaction::new_coinbase_tx(&miner).unwrap()).unwrap();
        store.append_block(&parent).unwrap();
        hashes.push(parent.get_hash().to_vec());

        for height in 1..=3 {
            let reward = Transaction::new_coinbase_tx(&miner).unwrap();
            let block = Block::new(parent.get_hash(), &[reward], height).unwrap();
            store.append_block(&block).unwrap();
            hashes.push(block.get_hash().to_vec());
            parent = block;
        }
        store.close().unwrap();
    }

    let store = ChainStore::open(&config.data_dir).unwrap();
    assert_eq!(store.get_tip().unwrap(), hashes[3]);

    let walked: Vec<Vec<u8>> = store
        .iter()
        .unwrap()
        .map(|block| block.unwrap().get_hash().to_vec())
        .collect();
    hashes.reverse();
    assert_eq!(walked, hashes);
}

#[test]
fn test_missing_wallet_and_block_are_not_found() {
    init_logging();
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());

    let wallets = config.load_wallets().unwrap();
    assert_eq!(
        wallets.get("1BoatSLRHtKNngkdXEeobR76b53LETtpyT").unwrap_err().kind(),
        ErrorKind::NotFound
    );

    let store = config.open_chain_store().unwrap();
    assert_eq!(store.get_tip().unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(store.get_block(&[1; 32]).unwrap_err().kind(), ErrorKind::NotFound);
}
