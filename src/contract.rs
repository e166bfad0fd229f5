//! Contract binding: a callable proxy for the voting contract.

pub mod abi;

use self::abi::{InterfaceDescriptor, Operation};
use crate::{
    node::{
        method::eth,
        remote::RemoteError,
        transaction::{FillError, TransactionRequest},
        types::{Block, CallRequest, TransactionReceipt},
    },
    serialization::{Bytes, Str},
    signer::{Capability, Signer},
};
use alloy::{
    primitives::{Address, B256, U256},
    sol_types::SolCall,
};
use std::{str::FromStr as _, sync::Arc};
use thiserror::Error;

/// A candidate as seen by the client.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Candidate {
    pub name: String,
    pub vote_count: u64,
}

/// A voting contract bound to an identity.
///
/// A handle is only usable while the identity it was bound for is active.
/// After an account change every call fails with a stale handle error until
/// the contract is bound again.
#[derive(Clone, Debug)]
pub struct ContractHandle {
    address: Address,
    descriptor: Arc<InterfaceDescriptor>,
    signer: Signer,
}

/// Binds the contract at `address` for the specified signer.
///
/// This does not perform any network I/O.
pub fn bind(
    signer: &Signer,
    address: &str,
    descriptor: Arc<InterfaceDescriptor>,
) -> Result<ContractHandle, InvalidAddress> {
    let address = Address::from_str(address.trim())
        .map_err(|_| InvalidAddress(address.to_owned()))?;
    tracing::debug!(%address, account = %signer.account(), "bound voting contract");

    Ok(ContractHandle {
        address,
        descriptor,
        signer: signer.clone(),
    })
}

impl ContractHandle {
    /// The contract address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The account calls are made from.
    pub fn account(&self) -> Address {
        self.signer.account()
    }

    /// Returns false once the identity this handle was bound for is no longer
    /// active.
    pub fn is_current(&self) -> bool {
        self.signer.ticket().is_current()
    }

    /// Fetches all candidates in contract order.
    pub async fn list_candidates(&self) -> Result<Vec<Candidate>, CallError> {
        let candidates = self
            .call(
                Operation::ListCandidates,
                abi::getAllVotesOfCandiatesCall {},
            )
            .await?;

        candidates
            .into_iter()
            .map(|candidate| -> Result<_, CallError> {
                Ok(Candidate {
                    vote_count: narrow(candidate.voteCount)?,
                    name: candidate.name,
                })
            })
            .collect()
    }

    /// Fetches whether the voting window is open.
    pub async fn voting_open(&self) -> Result<bool, CallError> {
        self.call(Operation::VotingOpen, abi::getVotingStatusCall {})
            .await
    }

    /// Fetches the number of seconds until the voting window closes.
    pub async fn remaining_seconds(&self) -> Result<u64, CallError> {
        let remaining = self
            .call(Operation::RemainingSeconds, abi::getRemainingTimeCall {})
            .await?;
        narrow(remaining)
    }

    /// Sends a vote transaction, returning its hash once the network accepted
    /// it.
    pub(crate) async fn send_vote(&self, candidate_index: usize) -> Result<B256, SubmitError> {
        if !self.is_current() {
            return Err(SubmitError::StaleHandle);
        }

        let call = abi::voteCall {
            candidateIndex: U256::from(candidate_index),
        };
        let data = self.calldata(Operation::Vote, &call);
        let remote = self.signer.remote();

        let hash = match self.signer.capability() {
            Capability::Wallet => {
                let request = CallRequest {
                    from: Some(Str(self.account())),
                    to: Str(self.address),
                    data,
                    gas: None,
                };
                remote.execute(eth::SendTransaction, (request,)).await?
            }
            Capability::Key(signer) => {
                let transaction = TransactionRequest {
                    from: self.account(),
                    to: self.address,
                    data,
                }
                .fill(remote)
                .await?;
                let signature = signer
                    .sign_transaction(&transaction)
                    .map_err(|err| SubmitError::Signing(format!("{err:#}")))?;
                let (raw, hash) = transaction.encode(signature);
                let accepted = remote
                    .execute(eth::SendRawTransaction, (Bytes(raw),))
                    .await?;
                if accepted.0 != hash {
                    tracing::warn!(local = %hash, remote = %accepted.0, "transaction hash mismatch");
                }
                accepted
            }
        };

        tracing::debug!(hash = %hash.0, candidate_index, "vote transaction sent");
        Ok(hash.0)
    }

    /// Fetches the receipt of a transaction, `None` while it is pending.
    pub(crate) async fn receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>, RemoteError> {
        self.signer
            .remote()
            .execute(eth::GetTransactionReceipt, (Str(hash),))
            .await
    }

    async fn call<C>(&self, operation: Operation, call: C) -> Result<C::Return, CallError>
    where
        C: SolCall,
    {
        if !self.is_current() {
            return Err(CallError::StaleHandle);
        }

        let request = CallRequest {
            from: Some(Str(self.account())),
            to: Str(self.address),
            data: self.calldata(operation, &call),
            gas: None,
        };
        let output = self
            .signer
            .remote()
            .execute(eth::Call, (request, Block::Latest))
            .await?;

        C::abi_decode_returns(&output.0).map_err(|err| CallError::Decode {
            operation,
            message: err.to_string(),
        })
    }

    fn calldata<C>(&self, operation: Operation, call: &C) -> Vec<u8>
    where
        C: SolCall,
    {
        let mut data = self.descriptor.selector(operation).to_vec();
        call.abi_encode_raw(&mut data);
        data
    }
}

fn narrow(value: U256) -> Result<u64, CallError> {
    u64::try_from(value).map_err(|_| CallError::OutOfRange(value))
}

/// A malformed contract address.
#[derive(Debug, Error)]
#[error("invalid contract address '{0}'")]
pub struct InvalidAddress(pub String);

/// A failed read call.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("contract handle belongs to a previous identity")]
    StaleHandle,

    #[error("call failed: {0}")]
    Remote(#[from] RemoteError),

    #[error("malformed {operation:?} response: {message}")]
    Decode {
        operation: Operation,
        message: String,
    },

    #[error("value {0} does not fit in 64 bits")]
    OutOfRange(U256),
}

/// A failure to get a transaction accepted by the network.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("contract handle belongs to a previous identity")]
    StaleHandle,

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("failed to prepare transaction: {0}")]
    Fill(#[from] FillError),

    #[error("signing failed: {0}")]
    Signing(String),
}
