use crate::error::{BlockchainError, Result};
use crate::storage::ChainStore;
use crate::wallet::{Wallets, WALLET_FILE};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_DATA_DIR: &str = "data";

const DATA_DIR_KEY: &str = "LEDGER_DATA_DIR";
const WALLET_FILE_KEY: &str = "LEDGER_WALLET_FILE";

/// Where the ledger keeps its files. Built once at startup and passed to whatever
/// opens the chain store or the wallet collection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub wallet_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            wallet_file: PathBuf::from(WALLET_FILE),
        }
    }
}

impl Config {
    /// Defaults overridden by `LEDGER_DATA_DIR` and `LEDGER_WALLET_FILE`.
    pub fn from_env() -> Config {
        Config::default().with_env_overrides()
    }

    /// Reads a TOML file; keys missing from the file keep their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            BlockchainError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Config::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Config> {
        toml::from_str(contents)
            .map_err(|e| BlockchainError::Config(format!("Invalid configuration: {e}")))
    }

    pub fn with_env_overrides(mut self) -> Config {
        if let Ok(dir) = env::var(DATA_DIR_KEY) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(file) = env::var(WALLET_FILE_KEY) {
            self.wallet_file = PathBuf::from(file);
        }
        self
    }

    pub fn open_chain_store(&self) -> Result<ChainStore> {
        ChainStore::open(&self.data_dir)
    }

    pub fn load_wallets(&self) -> Result<Wallets> {
        Wallets::init(&self.wallet_file)
    }
}
