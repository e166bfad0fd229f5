//! Method trait and type definitions for attaching associated types to RPC
//! methods.

use serde_json::Value;

/// An Ethereum JSON RPC method.
pub trait Method {
    type Params;
    type Result;

    fn into_name(self) -> String;
}

impl Method for String {
    type Params = Vec<Value>;
    type Result = Value;

    fn into_name(self) -> String {
        self
    }
}

impl Method for &'_ str {
    type Params = <String as Method>::Params;
    type Result = <String as Method>::Result;

    fn into_name(self) -> String {
        self.to_owned()
    }
}

macro_rules! impl_method {
    ($(
        $(#[$attr:meta])*
        pub struct $m:ident = $s:literal ($($p:ty),*) -> $r:ty;
    )*) => {$(
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $m;

        impl $crate::node::method::Method for $m {
            type Params = ($($p,)*);
            type Result = $r;

            fn into_name(self) -> String {
                $s.to_owned()
            }
        }

        impl PartialEq<str> for $m {
            fn eq(&self, other: &str) -> bool {
                $s == other
            }
        }
    )*};
}

pub mod eth {
    use crate::{
        node::types::{Block, CallRequest, FeeHistory, TransactionReceipt},
        serialization::{Bytes, Quantity, Str},
    };
    use alloy::primitives::{Address, B256};

    impl_method! {
        /// Returns the chain ID of the connected network.
        pub struct ChainId = "eth_chainId" () -> Quantity;

        /// Lists the accounts the provider currently exposes.
        pub struct Accounts = "eth_accounts" () -> Vec<Str<Address>>;

        /// Asks the provider to authorize accounts, prompting the user if
        /// needed.
        pub struct RequestAccounts = "eth_requestAccounts" () -> Vec<Str<Address>>;

        /// Executes a read-only message call.
        pub struct Call = "eth_call" (CallRequest, Block) -> Bytes;

        /// Estimates the gas a call would use if it were sent as a
        /// transaction.
        pub struct EstimateGas = "eth_estimateGas" (CallRequest) -> Quantity;

        /// Returns the number of transactions sent from an account.
        pub struct GetTransactionCount = "eth_getTransactionCount" (Str<Address>, Block) -> Quantity;

        /// Returns base fee history for a range of blocks.
        pub struct GetFeeHistory = "eth_feeHistory" (Quantity, Block, Vec<f64>) -> FeeHistory;

        /// Returns a suggested priority fee.
        pub struct MaxPriorityFeePerGas = "eth_maxPriorityFeePerGas" () -> Quantity;

        /// Asks the provider to fill, sign and send a transaction.
        pub struct SendTransaction = "eth_sendTransaction" (CallRequest) -> Str<B256>;

        /// Submits an already signed transaction.
        pub struct SendRawTransaction = "eth_sendRawTransaction" (Bytes) -> Str<B256>;

        /// Returns the receipt of a transaction, or `null` while it is not yet
        /// included.
        pub struct GetTransactionReceipt = "eth_getTransactionReceipt" (Str<B256>) -> Option<TransactionReceipt>;
    }
}

#[cfg(test)]
mod tests {
    use super::{eth, Method};

    #[test]
    fn method_names() {
        assert_eq!(eth::Call.into_name(), "eth_call");
        assert!(eth::GetTransactionReceipt == *"eth_getTransactionReceipt");
        assert!(eth::Accounts != *"eth_requestAccounts");
    }
}
