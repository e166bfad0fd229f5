//! Additional Ethereum RPC types.

use crate::serialization::{self, Quantity, Str};
use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize, Serializer};

/// A block reference.
#[derive(Clone, Copy, Debug)]
pub enum Block {
    /// The latest block.
    Latest,
    /// The pending block.
    Pending,
}

impl Serialize for Block {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Latest => serializer.serialize_str("latest"),
            Self::Pending => serializer.serialize_str("pending"),
        }
    }
}

/// Message call parameters used for `eth_call`, `eth_estimateGas` and
/// `eth_sendTransaction`.
///
/// Fields left out are filled in by whoever executes the call.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CallRequest {
    /// The account the call is made from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Str<Address>>,
    /// The contract being called.
    pub to: Str<Address>,
    /// The ABI encoded calldata.
    #[serde(with = "serialization::bytes")]
    pub data: Vec<u8>,
    /// The gas limit for the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<Quantity>,
}

/// Fee history.
#[derive(Debug, Deserialize, Serialize)]
pub struct FeeHistory {
    /// Base fee per block, including the block following the newest one.
    #[serde(rename = "baseFeePerGas")]
    pub base_fee_per_gas: Vec<Quantity>,
    /// Ratio of gas used to the block limit.
    #[serde(rename = "gasUsedRatio")]
    pub gas_used_ratio: Vec<f64>,
    /// The number of the oldest block included in the fee history.
    #[serde(rename = "oldestBlock")]
    pub oldest_block: Quantity,
    /// Effective priority fee reward percentiles.
    #[serde(default)]
    pub reward: Option<Vec<Vec<Quantity>>>,
}

impl FeeHistory {
    /// The base fee expected for the next block.
    pub fn next_base_fee(&self) -> Option<Quantity> {
        self.base_fee_per_gas.last().copied()
    }
}

/// The parts of a transaction receipt needed to confirm an inclusion.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TransactionReceipt {
    /// The hash of the included transaction.
    #[serde(rename = "transactionHash")]
    pub transaction_hash: Str<B256>,
    /// The block the transaction was included in.
    #[serde(rename = "blockNumber")]
    pub block_number: Option<Quantity>,
    /// Execution status, `0x1` for success and `0x0` for a revert.
    #[serde(default)]
    pub status: Option<Quantity>,
}

impl TransactionReceipt {
    /// Returns true if the transaction executed without reverting.
    ///
    /// Receipts without a status field (pre-Byzantium) are treated as
    /// successful.
    pub fn succeeded(&self) -> bool {
        self.status.map_or(true, |status| status != Quantity::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blocks() {
        assert_eq!(serde_json::to_value(Block::Latest).unwrap(), json!("latest"));
        assert_eq!(
            serde_json::to_value(Block::Pending).unwrap(),
            json!("pending")
        );
    }

    #[test]
    fn call_request() {
        let request = CallRequest {
            to: Str(Address::repeat_byte(0x42)),
            data: vec![0xde, 0xad],
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "to": "0x4242424242424242424242424242424242424242",
                "data": "0xdead",
            }),
        );
    }

    #[test]
    fn receipt_status() {
        let receipt = |status| {
            serde_json::from_value::<TransactionReceipt>(json!({
                "transactionHash": format!("0x{}", "11".repeat(32)),
                "blockNumber": "0x2a",
                "status": status,
                "logs": [],
            }))
            .unwrap()
        };
        assert!(receipt(json!("0x1")).succeeded());
        assert!(!receipt(json!("0x0")).succeeded());
        assert!(receipt(json!(null)).succeeded());
    }
}
