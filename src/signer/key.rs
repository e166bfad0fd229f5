//! A single private key used for headless signing.

use super::{Signing, Transaction};
use alloy::{
    primitives::{Address, Signature},
    signers::{local::PrivateKeySigner, SignerSync as _},
};
use anyhow::{Context as _, Result};
use std::fmt::{self, Debug, Formatter};
use thiserror::Error;

/// An account backed by a locally held secp256k1 private key.
pub struct LocalKey {
    signer: PrivateKeySigner,
}

impl LocalKey {
    /// Parses a hex encoded private key, with or without a `0x` prefix.
    pub fn from_hex(key: &str) -> Result<Self, InvalidKeyError> {
        let key = key.trim();
        let digits = key.strip_prefix("0x").unwrap_or(key);
        let bytes = hex::decode(digits).map_err(|_| InvalidKeyError::Encoding)?;
        if bytes.len() != 32 {
            return Err(InvalidKeyError::Length(bytes.len()));
        }
        let signer = PrivateKeySigner::from_slice(&bytes).map_err(|_| InvalidKeyError::Scalar)?;

        Ok(Self { signer })
    }
}

impl Signing for LocalKey {
    fn account(&self) -> Address {
        self.signer.address()
    }

    fn sign_transaction(&self, transaction: &Transaction) -> Result<Signature> {
        self.signer
            .sign_hash_sync(&transaction.signing_message())
            .context("failed to sign transaction")
    }
}

impl Debug for LocalKey {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("LocalKey")
            .field("account", &self.signer.address())
            .finish_non_exhaustive()
    }
}

/// A malformed private key.
#[derive(Debug, Error)]
pub enum InvalidKeyError {
    #[error("private key is not valid hex")]
    Encoding,

    #[error("private key must be 32 bytes, got {0}")]
    Length(usize),

    #[error("private key is not a valid secp256k1 scalar")]
    Scalar,
}
