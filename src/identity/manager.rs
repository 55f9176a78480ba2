//! Identity selection and signing.

use std::sync::Arc;

use alloy::primitives::Address;
use alloy::signers::{Signature, Signer};

use crate::identity::{IdentityError, Keystore};

#[derive(Debug, Clone)]
pub struct IdentityManager {
    keystore: Arc<Keystore>,
}

impl IdentityManager {
    pub fn new(keystore: Arc<Keystore>) -> Self {
        Self { keystore }
    }

    /// The first stored identity, creating one when the keystore is empty.
    pub fn get_or_create_identity(&self) -> Result<Address, IdentityError> {
        match self.keystore.accounts().first() {
            Some(address) => Ok(*address),
            None => self.keystore.new_account(),
        }
    }

    pub fn identities(&self) -> Vec<Address> {
        self.keystore.accounts()
    }

    /// Sign arbitrary message bytes (with Ethereum prefix).
    pub async fn sign_message(
        &self,
        address: Address,
        message: &[u8],
    ) -> Result<Signature, IdentityError> {
        let signer = self
            .keystore
            .signer(&address)
            .ok_or(IdentityError::UnknownIdentity(address))?;
        signer
            .sign_message(message)
            .await
            .map_err(|e| IdentityError::Signing(e.to_string()))
    }
}
