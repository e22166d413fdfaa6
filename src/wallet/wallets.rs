use crate::error::{BlockchainError, Result};
use crate::utils::{deserialize, public_key_from_pkcs8, serialize};
use crate::wallet::Wallet;
use log::{debug, info};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const WALLET_FILE: &str = "wallet.dat";

/// Address -> wallet mapping backed by a single snapshot file.
///
/// `create` and `persist` hold the write lock, so they exclude each other and any
/// reader. `get` and `list` share the read lock.
pub struct Wallets {
    wallets: RwLock<HashMap<String, Wallet>>,
    path: PathBuf,
}

impl Wallets {
    /// Starts empty and loads the snapshot at `path`. A missing snapshot leaves the
    /// collection empty; any other read or decode failure is returned.
    pub fn init(path: impl Into<PathBuf>) -> Result<Wallets> {
        let wallets = Wallets {
            wallets: RwLock::new(HashMap::new()),
            path: path.into(),
        };
        wallets.load_from_file()?;
        Ok(wallets)
    }

    pub fn create(&self) -> Result<String> {
        let wallet = Wallet::new()?;
        let address = wallet.get_address();
        self.write_guard()?.insert(address.clone(), wallet);
        info!("Created wallet {address}");
        Ok(address)
    }

    pub fn list(&self) -> Result<Vec<String>> {
        Ok(self.read_guard()?.keys().cloned().collect())
    }

    pub fn get(&self, address: &str) -> Result<Wallet> {
        self.read_guard()?
            .get(address)
            .cloned()
            .ok_or_else(|| BlockchainError::WalletNotFound(address.to_string()))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read_guard()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Writes the whole mapping, private keys included, to `<file name>.tmp` next to the
    /// snapshot and renames it over the snapshot so a crash never leaves a truncated
    /// file behind.
    pub fn persist(&self) -> Result<()> {
        let wallets = self.write_guard()?;
        let bytes = serialize(&*wallets)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp_path = temp_path_for(&self.path);
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes.as_slice())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.path)?;
        sync_parent_dir(&self.path)?;
        info!(
            "Saved {} wallets to {}",
            wallets.len(),
            self.path.display()
        );
        Ok(())
    }

    fn load_from_file(&self) -> Result<()> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No wallet snapshot at {}", self.path.display());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let loaded: HashMap<String, Wallet> = deserialize(&bytes)?;
        for (address, wallet) in &loaded {
            check_entry(address, wallet)?;
        }
        info!(
            "Loaded {} wallets from {}",
            loaded.len(),
            self.path.display()
        );
        *self.write_guard()? = loaded;
        Ok(())
    }

    fn read_guard(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Wallet>>> {
        self.wallets
            .read()
            .map_err(|e| BlockchainError::Io(format!("Wallet lock poisoned: {e}")))
    }

    fn write_guard(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Wallet>>> {
        self.wallets
            .write()
            .map_err(|e| BlockchainError::Io(format!("Wallet lock poisoned: {e}")))
    }
}

/// A decoded entry is only usable if its key pair is intact and it is filed under its
/// own address.
fn check_entry(address: &str, wallet: &Wallet) -> Result<()> {
    let derived = public_key_from_pkcs8(wallet.get_pkcs8()).map_err(|e| {
        BlockchainError::Serialization(format!("Wallet {address} has an unusable key: {e}"))
    })?;
    if derived != wallet.get_public_key() {
        return Err(BlockchainError::Serialization(format!(
            "Wallet {address} public key does not match its private key"
        )));
    }
    let actual = wallet.get_address();
    if actual != address {
        return Err(BlockchainError::Serialization(format!(
            "Wallet filed under {address} belongs to {actual}"
        )));
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    match path.file_name() {
        Some(name) => {
            let mut temp_name = OsString::from(name);
            temp_name.push(".tmp");
            path.with_file_name(temp_name)
        }
        None => path.with_extension("tmp"),
    }
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent,
        None => Path::new("."),
    };
    File::open(parent)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}
