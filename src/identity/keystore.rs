//! Filesystem keystore.
//!
//! # Security
//! - Key files are written with owner-only permissions on unix
//! - Keys are never logged or serialized beyond their own file

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use alloy::primitives::{hex, Address, B256};
use alloy::signers::local::PrivateKeySigner;
use rand::RngCore;

use crate::identity::IdentityError;

const KEY_EXTENSION: &str = "key";

/// Keys loaded from a directory, indexed by address.
pub struct Keystore {
    dir: PathBuf,
    signers: RwLock<BTreeMap<Address, PrivateKeySigner>>,
}

impl Keystore {
    /// Load every `*.key` file from `dir`, creating the directory if needed.
    pub fn open(dir: &Path) -> Result<Self, IdentityError> {
        fs::create_dir_all(dir)?;

        let mut signers = BTreeMap::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(KEY_EXTENSION) {
                continue;
            }
            let signer = read_key(&path)?;
            signers.insert(signer.address(), signer);
        }

        tracing::debug!(dir = %dir.display(), keys = signers.len(), "Keystore opened");

        Ok(Self {
            dir: dir.to_path_buf(),
            signers: RwLock::new(signers),
        })
    }

    /// Addresses in ascending order.
    pub fn accounts(&self) -> Vec<Address> {
        self.signers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    /// Generate a fresh key and persist it.
    pub fn new_account(&self) -> Result<Address, IdentityError> {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let signer = PrivateKeySigner::from_bytes(&B256::from(bytes)).map_err(|e| {
            IdentityError::Signing(format!("generated key rejected: {}", e))
        })?;

        let address = signer.address();
        let path = self.dir.join(format!("{:x}.{}", address, KEY_EXTENSION));
        write_key(&path, &signer)?;

        self.signers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address, signer);

        tracing::info!(address = %address, "Identity created");
        Ok(address)
    }

    pub fn signer(&self, address: &Address) -> Option<PrivateKeySigner> {
        self.signers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .cloned()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl std::fmt::Debug for Keystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keystore")
            .field("dir", &self.dir)
            .field("accounts", &self.accounts())
            .finish()
    }
}

fn read_key(path: &Path) -> Result<PrivateKeySigner, IdentityError> {
    let content = fs::read_to_string(path)?;
    let key_hex = content.trim();
    let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);
    key_hex.parse().map_err(|e| IdentityError::InvalidKey {
        path: path.to_path_buf(),
        reason: format!("{}", e),
    })
}

fn write_key(path: &Path, signer: &PrivateKeySigner) -> Result<(), IdentityError> {
    fs::write(path, hex::encode(signer.to_bytes()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Anvil's first account
    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_loads_existing_keys() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("anvil.key"), format!("0x{}\n", TEST_PRIVATE_KEY)).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let keystore = Keystore::open(dir.path()).unwrap();
        let accounts = keystore.accounts();
        assert_eq!(accounts.len(), 1);
        assert_eq!(
            accounts[0].to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_new_account_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let address = Keystore::open(dir.path()).unwrap().new_account().unwrap();

        let reopened = Keystore::open(dir.path()).unwrap();
        assert_eq!(reopened.accounts(), vec![address]);
        assert!(reopened.signer(&address).is_some());
    }

    #[test]
    fn test_corrupt_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.key"), "zz").unwrap();
        let err = Keystore::open(dir.path()).unwrap_err();
        assert!(matches!(err, IdentityError::InvalidKey { .. }));
    }
}
