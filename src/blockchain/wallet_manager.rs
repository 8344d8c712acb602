//! Signing key management: keystore loading, keystore creation and the
//! [`TransactionSigner`] seam used by the transaction engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use ethers::{
    signers::{LocalWallet, Signer},
    types::{transaction::eip2718::TypedTransaction, Address, Signature},
};
use k256::ecdsa::SigningKey;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;
use zeroize::Zeroizing;

/// Signs fully-formed transactions with the held key.
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> Address;
    fn sign_transaction(&self, tx: &TypedTransaction) -> Result<Signature, String>;
}

impl TransactionSigner for LocalWallet {
    fn address(&self) -> Address {
        Signer::address(self)
    }

    fn sign_transaction(&self, tx: &TypedTransaction) -> Result<Signature, String> {
        self.sign_transaction_sync(tx).map_err(|e| e.to_string())
    }
}

/// Holds the process signing key, if any. Set once at startup, read-only after.
#[derive(Clone, Default)]
pub struct WalletManager {
    signer: Option<Arc<dyn TransactionSigner>>,
}

impl WalletManager {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_signer(signer: Arc<dyn TransactionSigner>) -> Self {
        Self {
            signer: Some(signer),
        }
    }

    pub fn signer(&self) -> Option<Arc<dyn TransactionSigner>> {
        self.signer.clone()
    }

    pub fn address(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }

    pub fn has_key(&self) -> bool {
        self.signer.is_some()
    }
}

/// `~/.ethereum/keystore` on Linux, `~/Library/Ethereum/keystore` on macOS,
/// `%APPDATA%\Ethereum\keystore` on Windows.
pub fn default_keystore_dir() -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Ethereum").join("keystore"))
    } else if cfg!(target_os = "windows") {
        dirs::data_dir().map(|d| d.join("Ethereum").join("keystore"))
    } else {
        dirs::home_dir().map(|h| h.join(".ethereum").join("keystore"))
    }
}

/// Finds the first keystore file in `dir` whose file name contains `name`.
pub fn find_keystore(dir: &Path, name: &str) -> Result<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read keystore directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    entries.sort();
    entries
        .into_iter()
        .find(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(name))
        })
        .ok_or_else(|| anyhow!("keystore '{}' not found in {}", name, dir.display()))
}

/// Decrypts the keystore matching `name` in `dir`.
pub fn load_keystore(dir: &Path, name: &str, password: &SecretString) -> Result<LocalWallet> {
    let path = find_keystore(dir, name)?;
    let wallet = LocalWallet::decrypt_keystore(&path, password.expose_secret())
        .map_err(|e| anyhow!("failed to decrypt keystore: {}", e))?;
    info!(address = ?Signer::address(&wallet), "loaded keystore");
    Ok(wallet)
}

/// Parses a raw hex private key, with or without `0x`.
pub fn wallet_from_private_key(raw: &SecretString) -> Result<LocalWallet> {
    let trimmed = raw.expose_secret().trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = Zeroizing::new(
        hex::decode(hex_part).map_err(|_| anyhow!("private key is not valid hex"))?,
    );
    if bytes.len() != 32 {
        return Err(anyhow!("private key must be 32 bytes"));
    }
    let key = SigningKey::from_slice(&bytes).map_err(|e| anyhow!("invalid private key: {}", e))?;
    Ok(LocalWallet::from(key))
}

/// A freshly created keystore.
#[derive(Debug, Clone)]
pub struct NewWallet {
    pub address: Address,
    pub path: PathBuf,
}

/// Generates a key and writes it as an encrypted keystore named
/// `UTC--<timestamp>--<name>--<address>.json` in `dir`.
pub fn create_keystore(dir: &Path, name: &str, password: &SecretString) -> Result<NewWallet> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create keystore directory {}", dir.display()))?;
    let mut rng = rand::thread_rng();
    let (wallet, uuid) = LocalWallet::new_keystore(dir, &mut rng, password.expose_secret(), None)
        .map_err(|e| anyhow!("failed to create keystore: {}", e))?;

    let address = Signer::address(&wallet);
    let file_name = format!(
        "UTC--{}--{}--{}.json",
        chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S"),
        name,
        hex::encode(address.as_bytes())
    );
    let path = dir.join(file_name);
    std::fs::rename(dir.join(&uuid), &path)
        .with_context(|| format!("failed to rename keystore file {}", uuid))?;

    info!(address = ?address, path = %path.display(), "created keystore");
    Ok(NewWallet { address, path })
}
