//! A signer that just logs all signing operations.

use super::{Signing, Transaction};
use alloy::primitives::{Address, Signature};
use anyhow::Result;

/// Wrapping signer that logs all signing operations to the global logger.
pub struct LogRecorder<S>(pub S);

impl<S> Signing for LogRecorder<S>
where
    S: Signing,
{
    fn account(&self) -> Address {
        self.0.account()
    }

    fn sign_transaction(&self, transaction: &Transaction) -> Result<Signature> {
        let account = self.account();
        match self.0.sign_transaction(transaction) {
            Ok(signature) => {
                tracing::info!(%account, ?transaction, ?signature, "signed transaction");
                Ok(signature)
            }
            Err(err) => {
                tracing::warn!(%account, ?transaction, ?err, "refused to sign transaction");
                Err(err)
            }
        }
    }
}
