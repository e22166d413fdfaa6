// Transactions follow the UTXO model: each one consumes earlier outputs and creates new ones.
// This core never looks up which outputs are spendable; the caller's UTXO index passes
// them in, and value is conserved exactly because there are no fees.

use crate::core::{Signer, Verifier};
use crate::error::{BlockchainError, Result};
use crate::utils::{deserialize, serialize, sha256_digest};
use crate::wallet::{convert_address, decode_pub_key_hash, hash_pub_key};
use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Fixed block reward paid by every coinbase transaction
pub const SUBSIDY: u64 = 100;

/// Output index carried by the single coinbase input, which references nothing
pub const COINBASE_VOUT: i64 = -1;

/// Spendable outputs picked by the UTXO index: txid (hex) -> output indices
pub type SpendableOutputs = BTreeMap<String, BTreeSet<usize>>;

// An input points at exactly one earlier output by (txid, index) and carries the
// spender's public key plus a signature over the transaction pre-image.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct TXInput {
    txid: Vec<u8>,
    vout: i64,
    signature: Vec<u8>,
    pub_key: Vec<u8>,
}

impl TXInput {
    pub fn new(txid: &[u8], vout: i64) -> TXInput {
        TXInput {
            txid: txid.to_vec(),
            vout,
            signature: vec![],
            pub_key: vec![],
        }
    }

    pub fn get_txid(&self) -> &[u8] {
        self.txid.as_slice()
    }

    pub fn get_txid_hex(&self) -> String {
        HEXLOWER.encode(self.txid.as_slice())
    }

    pub fn get_vout(&self) -> i64 {
        self.vout
    }

    pub fn get_signature(&self) -> &[u8] {
        self.signature.as_slice()
    }

    pub fn get_pub_key(&self) -> &[u8] {
        self.pub_key.as_slice()
    }

    /// True if the key carried by this input hashes to `pub_key_hash`.
    pub fn can_unlock(&self, pub_key_hash: &[u8]) -> bool {
        let locking_hash = hash_pub_key(self.pub_key.as_slice());
        locking_hash.eq(pub_key_hash)
    }
}

// An output pays `value` to whoever controls the key hashing to `pub_key_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TXOutput {
    value: u64,
    pub_key_hash: Vec<u8>,
}

impl TXOutput {
    pub fn new(value: u64, address: &str) -> Result<TXOutput> {
        if value == 0 {
            return Err(BlockchainError::Transaction(
                "Output value must be positive".to_string(),
            ));
        }

        Ok(TXOutput {
            value,
            pub_key_hash: decode_pub_key_hash(address)?,
        })
    }

    pub fn get_value(&self) -> u64 {
        self.value
    }

    pub fn get_pub_key_hash(&self) -> &[u8] {
        self.pub_key_hash.as_slice()
    }

    /// The address this output is locked to.
    pub fn get_address(&self) -> String {
        convert_address(self.pub_key_hash.as_slice())
    }

    pub fn can_be_unlocked(&self, pub_key_hash: &[u8]) -> bool {
        self.pub_key_hash.eq(pub_key_hash)
    }
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    id: Vec<u8>,
    vin: Vec<TXInput>,
    vout: Vec<TXOutput>,
}

impl Transaction {
    /// Reward transaction: one input referencing nothing, one output of [`SUBSIDY`] to `to`.
    pub fn new_coinbase_tx(to: &str) -> Result<Transaction> {
        let txout = TXOutput::new(SUBSIDY, to)?;
        // The random payload keeps two rewards to the same address from sharing an ID
        let tx_input = TXInput {
            txid: vec![],
            vout: COINBASE_VOUT,
            signature: Uuid::new_v4().as_bytes().to_vec(),
            pub_key: vec![],
        };

        let mut tx = Transaction {
            id: vec![],
            vin: vec![tx_input],
            vout: vec![txout],
        };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    /// Transfers `amount` from `from` to `to`, spending every output in `spendable`.
    ///
    /// `available` is the total value of those outputs as reported by the UTXO index.
    /// Anything above `amount` comes back to `from` as a change output. Every input is
    /// signed by `signer`, whose key must hash to the lock key of `from`.
    pub fn new_utxo_transaction(
        from: &str,
        to: &str,
        amount: u64,
        available: u64,
        spendable: &SpendableOutputs,
        signer: &dyn Signer,
    ) -> Result<Transaction> {
        if available < amount {
            return Err(BlockchainError::InsufficientFunds {
                required: amount,
                available,
            });
        }

        if amount == 0 {
            return Err(BlockchainError::Transaction(
                "Amount must be positive".to_string(),
            ));
        }

        let from_pub_key_hash = decode_pub_key_hash(from).map_err(|_| {
            BlockchainError::InvalidAddress(format!("Invalid from address: {from}"))
        })?;
        let to_pub_key_hash = decode_pub_key_hash(to)
            .map_err(|_| BlockchainError::InvalidAddress(format!("Invalid to address: {to}")))?;

        if spendable.values().all(|outs| outs.is_empty()) {
            return Err(BlockchainError::Transaction(
                "No spendable outputs supplied".to_string(),
            ));
        }

        if !hash_pub_key(signer.public_key()).eq(&from_pub_key_hash) {
            return Err(BlockchainError::Transaction(format!(
                "Signer does not own address {from}"
            )));
        }

        let mut inputs = vec![];
        for (txid_hex, outs) in spendable {
            let txid = HEXLOWER_PERMISSIVE.decode(txid_hex.as_bytes()).map_err(|e| {
                BlockchainError::Transaction(format!("Invalid transaction ID {txid_hex}: {e}"))
            })?;
            if txid.is_empty() {
                return Err(BlockchainError::Transaction(
                    "Spendable output references an empty transaction ID".to_string(),
                ));
            }
            for &out in outs {
                let vout = i64::try_from(out).map_err(|_| {
                    BlockchainError::Transaction(format!("Output index {out} out of range"))
                })?;
                inputs.push(TXInput {
                    txid: txid.clone(),
                    vout,
                    signature: vec![],
                    pub_key: signer.public_key().to_vec(),
                });
            }
        }

        let mut outputs = vec![TXOutput {
            value: amount,
            pub_key_hash: to_pub_key_hash,
        }];
        let change = available - amount;
        if change > 0 {
            outputs.push(TXOutput {
                value: change,
                pub_key_hash: from_pub_key_hash.clone(),
            });
        }

        let mut tx = Transaction {
            id: vec![],
            vin: inputs,
            vout: outputs,
        };
        // Every referenced output is locked to `from`, so its key hash is the pre-image key
        tx.sign(signer, from_pub_key_hash.as_slice())?;
        tx.id = tx.hash()?;
        Ok(tx)
    }

    // Inputs keep only their outpoint; signatures and keys are blanked for the pre-image
    fn trimmed_copy(&self) -> Transaction {
        Transaction {
            id: vec![],
            vin: self
                .vin
                .iter()
                .map(|input| TXInput::new(input.get_txid(), input.get_vout()))
                .collect(),
            vout: self.vout.clone(),
        }
    }

    fn pre_image(tx_copy: &mut Transaction, idx: usize, locking_hash: &[u8]) -> Result<Vec<u8>> {
        tx_copy.vin[idx].pub_key = locking_hash.to_vec();
        let digest = tx_copy.hash();
        tx_copy.vin[idx].pub_key = vec![];
        digest
    }

    fn sign(&mut self, signer: &dyn Signer, locking_hash: &[u8]) -> Result<()> {
        let mut tx_copy = self.trimmed_copy();
        for idx in 0..self.vin.len() {
            let digest = Self::pre_image(&mut tx_copy, idx, locking_hash)?;
            self.vin[idx].signature = signer.sign(digest.as_slice())?;
        }
        Ok(())
    }

    /// Checks the transaction against the outputs its inputs spend, supplied in input
    /// order by the UTXO index: the ID matches the content, every input owns and signs
    /// for its referenced output, and outputs add up to exactly what was spent.
    pub fn verify(&self, verifier: &dyn Verifier, referenced_outputs: &[TXOutput]) -> bool {
        match self.hash() {
            Ok(id) if id == self.id => {}
            Ok(_) => {
                warn!("Transaction {} does not match its ID", self.get_id_hex());
                return false;
            }
            Err(e) => {
                warn!("Transaction {} could not be hashed: {e}", self.get_id_hex());
                return false;
            }
        }

        if self.is_coinbase() {
            return self.verify_coinbase();
        }

        if self.vin.is_empty() || referenced_outputs.len() != self.vin.len() {
            warn!(
                "Transaction {} has {} inputs but {} referenced outputs",
                self.get_id_hex(),
                self.vin.len(),
                referenced_outputs.len()
            );
            return false;
        }

        let mut tx_copy = self.trimmed_copy();
        for (idx, (vin, prev_out)) in self.vin.iter().zip(referenced_outputs).enumerate() {
            if !vin.can_unlock(prev_out.get_pub_key_hash()) {
                warn!(
                    "Input {idx} of {} cannot unlock {}:{}",
                    self.get_id_hex(),
                    vin.get_txid_hex(),
                    vin.get_vout()
                );
                return false;
            }

            let digest = match Self::pre_image(&mut tx_copy, idx, prev_out.get_pub_key_hash()) {
                Ok(digest) => digest,
                Err(e) => {
                    warn!("Failed to build pre-image for input {idx}: {e}");
                    return false;
                }
            };
            if !verifier.verify(vin.get_pub_key(), vin.get_signature(), digest.as_slice()) {
                warn!("Bad signature on input {idx} of {}", self.get_id_hex());
                return false;
            }
        }

        self.verify_balance(referenced_outputs)
    }

    fn verify_coinbase(&self) -> bool {
        if self.vout.len() != 1 || self.vout[0].get_value() != SUBSIDY {
            warn!(
                "Coinbase {} must pay exactly one output of {SUBSIDY}",
                self.get_id_hex()
            );
            return false;
        }
        true
    }

    fn verify_balance(&self, referenced_outputs: &[TXOutput]) -> bool {
        let input_value = referenced_outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.get_value()));
        let output_value = self.get_output_value().ok();

        match (input_value, output_value) {
            (Some(inputs), Some(outputs)) if inputs == outputs => true,
            (inputs, outputs) => {
                warn!(
                    "Transaction {} does not conserve value: inputs={inputs:?}, outputs={outputs:?}",
                    self.get_id_hex()
                );
                false
            }
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].txid.is_empty() && self.vin[0].vout == COINBASE_VOUT
    }

    // SHA-256 of the canonical encoding with the ID field left empty
    fn hash(&self) -> Result<Vec<u8>> {
        let tx_copy = Transaction {
            id: vec![],
            vin: self.vin.clone(),
            vout: self.vout.clone(),
        };
        Ok(sha256_digest(tx_copy.serialize()?.as_slice()))
    }

    pub fn get_id(&self) -> &[u8] {
        self.id.as_slice()
    }

    pub fn get_id_hex(&self) -> String {
        HEXLOWER.encode(self.id.as_slice())
    }

    pub fn get_vin(&self) -> &[TXInput] {
        self.vin.as_slice()
    }

    pub fn get_vout(&self) -> &[TXOutput] {
        self.vout.as_slice()
    }

    pub fn get_output_value(&self) -> Result<u64> {
        let mut total = 0u64;
        for vout in &self.vout {
            total = total
                .checked_add(vout.get_value())
                .ok_or_else(|| BlockchainError::Transaction("Output value overflow".to_string()))?;
        }
        Ok(total)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        deserialize(bytes)
    }
}
