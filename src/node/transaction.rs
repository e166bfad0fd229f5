//! EIP-1559 transactions filled from a remote node for local signing.

use super::{
    method::eth,
    remote::{Remote, RemoteError},
    types::{Block, CallRequest},
};
use crate::serialization::{Quantity, Str};
use alloy::{
    consensus::{SignableTransaction as _, TxEip1559, TxEnvelope},
    eips::eip2718::Encodable2718 as _,
    primitives::{keccak256, Address, Bytes, Signature, TxKind, B256, U256},
};
use ethnum::U256 as Wei;
use std::fmt::{self, Debug, Formatter};
use thiserror::Error;

/// Transaction request parameters for a contract call that still needs its
/// nonce, gas and fees computed.
#[derive(Clone, Debug)]
pub struct TransactionRequest {
    /// The account used for sending the transaction.
    pub from: Address,
    /// The contract being called.
    pub to: Address,
    /// The calldata to use for the transaction.
    pub data: Vec<u8>,
}

impl TransactionRequest {
    /// Fills a transaction by computing all unspecified fields from the remote
    /// node.
    pub async fn fill(self, remote: &Remote) -> Result<Transaction, FillError> {
        let call = CallRequest {
            from: Some(Str(self.from)),
            to: Str(self.to),
            data: self.data.clone(),
            gas: None,
        };

        let chain_id = remote.execute(eth::ChainId, ()).await?;
        let nonce = remote
            .execute(eth::GetTransactionCount, (Str(self.from), Block::Pending))
            .await?;
        let estimate = remote.execute(eth::EstimateGas, (call,)).await?;
        let history = remote
            .execute(eth::GetFeeHistory, (Quantity::from(1), Block::Latest, vec![]))
            .await?;
        let priority_fee = remote.execute(eth::MaxPriorityFeePerGas, ()).await?;

        let base_fee = history
            .next_base_fee()
            .ok_or(FillError::Field("base fee"))?;
        // Leave room for the base fee to double before the transaction lands.
        let max_fee = base_fee
            .0
            .checked_mul(Wei::from(2_u64))
            .and_then(|fee| fee.checked_add(priority_fee.0))
            .map(Quantity)
            .ok_or(FillError::Field("max fee"))?;
        let gas = estimate
            .0
            .checked_add(estimate.0 / Wei::from(5_u64))
            .map(Quantity)
            .ok_or(FillError::Field("gas"))?;

        let inner = TxEip1559 {
            chain_id: chain_id.to_u64().ok_or(FillError::Field("chain ID"))?,
            nonce: nonce.to_u64().ok_or(FillError::Field("nonce"))?,
            gas_limit: gas.to_u64().ok_or(FillError::Field("gas"))?,
            max_fee_per_gas: max_fee.to_u128().ok_or(FillError::Field("max fee"))?,
            max_priority_fee_per_gas: priority_fee
                .to_u128()
                .ok_or(FillError::Field("priority fee"))?,
            to: TxKind::Call(self.to),
            value: U256::ZERO,
            access_list: Default::default(),
            input: Bytes::from(self.data),
        };

        Ok(Transaction { inner })
    }
}

/// A filled EIP-1559 transaction ready for signing.
#[derive(Clone)]
pub struct Transaction {
    inner: TxEip1559,
}

impl Transaction {
    /// Returns the hash the sender must sign.
    pub fn signing_message(&self) -> B256 {
        self.inner.signature_hash()
    }

    /// Returns the transaction fields.
    pub fn fields(&self) -> &TxEip1559 {
        &self.inner
    }

    /// Encodes the signed transaction in its EIP-2718 envelope, returning the
    /// raw bytes together with the transaction hash.
    pub fn encode(self, signature: Signature) -> (Vec<u8>, B256) {
        let envelope = TxEnvelope::from(self.inner.into_signed(signature));
        let raw = envelope.encoded_2718();
        let hash = keccak256(&raw);
        (raw, hash)
    }
}

impl Debug for Transaction {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("chain_id", &self.inner.chain_id)
            .field("nonce", &self.inner.nonce)
            .field("to", &self.inner.to)
            .field("gas_limit", &self.inner.gas_limit)
            .field("max_fee_per_gas", &self.inner.max_fee_per_gas)
            .field("input", &self.inner.input)
            .finish()
    }
}

/// An error filling in transaction fields.
#[derive(Debug, Error)]
pub enum FillError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("remote returned an out of range {0}")]
    Field(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChain;

    #[tokio::test]
    async fn fills_eip1559_fields() {
        let chain = MockChain::new();
        let remote = Remote::new(chain.clone());
        let to = Address::repeat_byte(0x42);

        let transaction = TransactionRequest {
            from: Address::repeat_byte(0x01),
            to,
            data: vec![1, 2, 3],
        }
        .fill(&remote)
        .await
        .unwrap();

        let fields = transaction.fields();
        assert_eq!(fields.chain_id, MockChain::CHAIN_ID);
        assert_eq!(fields.to, TxKind::Call(to));
        assert_eq!(fields.gas_limit, MockChain::GAS_ESTIMATE * 6 / 5);
        assert_eq!(
            fields.max_fee_per_gas,
            MockChain::BASE_FEE as u128 * 2 + MockChain::PRIORITY_FEE as u128
        );
        assert_eq!(fields.input.as_ref(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn oversized_base_fee_is_rejected() {
        let chain = MockChain::new();
        chain.set_base_fee(Quantity(Wei::MAX));
        let remote = Remote::new(chain.clone());

        let result = TransactionRequest {
            from: Address::repeat_byte(0x01),
            to: Address::repeat_byte(0x42),
            data: vec![],
        }
        .fill(&remote)
        .await;

        assert!(matches!(result, Err(FillError::Field("max fee"))));
    }

    #[tokio::test]
    async fn estimate_failures_abort_filling() {
        let chain = MockChain::new();
        chain.fail_method("eth_estimateGas");
        let remote = Remote::new(chain.clone());

        let result = TransactionRequest {
            from: Address::repeat_byte(0x01),
            to: Address::repeat_byte(0x42),
            data: vec![],
        }
        .fill(&remote)
        .await;

        assert!(matches!(result, Err(FillError::Remote(_))));
    }
}
