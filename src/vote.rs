//! Vote submission.
//!
//! A submission moves through `Idle -> Submitted -> Confirmed | Failed`. The
//! submitter owns a single pending vote slot; it is occupied while a vote is
//! `Submitted` and cleared on confirmation, failure or when the submission
//! future is dropped.

use crate::{
    contract::{ContractHandle, SubmitError},
    sync::{self, StateSnapshot},
};
use alloy::primitives::B256;
use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};
use thiserror::Error;
use tokio::sync::watch;

/// A vote between submission and confirmation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingVote {
    pub candidate_index: usize,
    pub submitted_at: SystemTime,
    /// Set once the network accepted the transaction.
    pub tx_hash: Option<B256>,
}

/// Where the latest submission stands.
#[derive(Clone, Debug, Default)]
pub enum VoteState {
    #[default]
    Idle,
    Submitted(PendingVote),
    Confirmed {
        candidate_index: usize,
        tx_hash: B256,
    },
    Failed {
        candidate_index: usize,
        error: Arc<VoteError>,
    },
}

impl VoteState {
    /// The vote currently in flight, if any.
    pub fn pending(&self) -> Option<&PendingVote> {
        match self {
            Self::Submitted(pending) => Some(pending),
            _ => None,
        }
    }
}

/// The outcome of a confirmed vote.
#[derive(Clone, Debug)]
pub struct VoteReceipt {
    pub candidate_index: usize,
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    /// The state refreshed right after confirmation.
    pub snapshot: StateSnapshot,
}

/// Submits votes and waits for their confirmation.
pub struct VoteSubmitter {
    state: watch::Sender<VoteState>,
    poll_interval: Duration,
}

impl VoteSubmitter {
    /// Creates a submitter polling for receipts at the specified interval.
    pub fn new(poll_interval: Duration) -> Self {
        let (state, _) = watch::channel(VoteState::Idle);
        Self {
            state,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    /// The current submission state.
    pub fn state(&self) -> VoteState {
        self.state.borrow().clone()
    }

    /// The vote currently in flight, if any.
    pub fn pending(&self) -> Option<PendingVote> {
        self.state.borrow().pending().cloned()
    }

    /// Subscribes to submission state changes.
    pub fn subscribe(&self) -> watch::Receiver<VoteState> {
        self.state.subscribe()
    }

    /// Casts a vote for the candidate at `candidate_index` of the snapshot's
    /// candidate list and waits for it to be confirmed.
    ///
    /// The index is checked against the snapshot before anything is sent.
    /// The voting window status is not consulted; a closed window surfaces as
    /// a revert from the contract. There are no retries and no timeout.
    pub async fn submit_vote(
        &self,
        handle: &ContractHandle,
        snapshot: &StateSnapshot,
        candidate_index: usize,
    ) -> Result<VoteReceipt, VoteError> {
        let len = snapshot.candidates().map_or(0, <[_]>::len);
        if candidate_index >= len {
            return Err(VoteError::IndexOutOfRange {
                index: candidate_index,
                len,
            });
        }
        if !handle.is_current() {
            return Err(VoteError::StaleHandle);
        }

        let slot = self.occupy(candidate_index)?;
        let (tx_hash, block_number) = match self.confirm(handle, candidate_index).await {
            Ok(confirmed) => confirmed,
            Err(err) => {
                slot.release(VoteState::Failed {
                    candidate_index,
                    error: Arc::new(err.clone()),
                });
                return Err(err);
            }
        };
        slot.release(VoteState::Confirmed {
            candidate_index,
            tx_hash,
        });

        // A refresh through a handle that went stale while waiting returns
        // the pre-vote snapshot; the caller rebinds and refreshes anyway.
        let snapshot = sync::refresh(handle, snapshot)
            .await
            .unwrap_or_else(|_| snapshot.clone());

        Ok(VoteReceipt {
            candidate_index,
            tx_hash,
            block_number,
            snapshot,
        })
    }

    /// Sends the vote and waits for its inclusion, returning the transaction
    /// hash and block number.
    async fn confirm(
        &self,
        handle: &ContractHandle,
        candidate_index: usize,
    ) -> Result<(B256, Option<u64>), VoteError> {
        let tx_hash = handle
            .send_vote(candidate_index)
            .await
            .map_err(|err| match err {
                SubmitError::StaleHandle => VoteError::StaleHandle,
                err => VoteError::SubmissionRejected(err.to_string()),
            })?;
        self.state.send_modify(|state| {
            if let VoteState::Submitted(pending) = state {
                pending.tx_hash = Some(tx_hash);
            }
        });

        let receipt = self.wait_for_receipt(handle, tx_hash).await;
        if !receipt.succeeded() {
            tracing::info!(%tx_hash, candidate_index, "vote reverted");
            return Err(VoteError::VoteReverted {
                tx_hash,
                cause: "transaction reverted on chain".to_owned(),
            });
        }
        let block_number = receipt.block_number.and_then(|number| number.to_u64());
        tracing::info!(%tx_hash, ?block_number, candidate_index, "vote confirmed");

        Ok((tx_hash, block_number))
    }

    async fn wait_for_receipt(
        &self,
        handle: &ContractHandle,
        tx_hash: B256,
    ) -> crate::node::types::TransactionReceipt {
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            interval.tick().await;
            match handle.receipt(tx_hash).await {
                Ok(Some(receipt)) => return receipt,
                Ok(None) => tracing::trace!(%tx_hash, "vote not yet included"),
                Err(err) => tracing::debug!(%tx_hash, %err, "failed to fetch receipt"),
            }
        }
    }

    fn occupy(&self, candidate_index: usize) -> Result<Slot<'_>, VoteError> {
        let mut occupied = false;
        self.state.send_if_modified(|state| {
            if state.pending().is_some() {
                return false;
            }
            *state = VoteState::Submitted(PendingVote {
                candidate_index,
                submitted_at: SystemTime::now(),
                tx_hash: None,
            });
            occupied = true;
            true
        });

        if !occupied {
            return Err(VoteError::VoteInFlight);
        }
        tracing::debug!(candidate_index, "vote submitted");
        Ok(Slot {
            state: &self.state,
            released: false,
        })
    }
}

/// The occupied pending vote slot. Dropping it without releasing resets the
/// submitter to idle.
struct Slot<'a> {
    state: &'a watch::Sender<VoteState>,
    released: bool,
}

impl Slot<'_> {
    fn release(mut self, next: VoteState) {
        self.released = true;
        self.state.send_replace(next);
    }
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        if !self.released {
            tracing::debug!("vote submission abandoned");
            self.state.send_replace(VoteState::Idle);
        }
    }
}

/// A failed vote.
#[derive(Clone, Debug, Error)]
pub enum VoteError {
    #[error("candidate index {index} out of range for {len} candidates")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("a vote is already in flight")]
    VoteInFlight,

    #[error("contract handle belongs to a previous identity")]
    StaleHandle,

    #[error("vote submission rejected: {0}")]
    SubmissionRejected(String),

    #[error("vote {tx_hash} reverted: {cause}")]
    VoteReverted { tx_hash: B256, cause: String },
}
