//! The voting client context object tying the session, the bound contract,
//! its mirrored state and vote submission together.

use crate::{
    contract::{self, abi::InterfaceDescriptor, ContractHandle, InvalidAddress},
    session::{Epoch, Identity, SessionWatcher, Subscription},
    signer::{self, ConnectError, Signer},
    sync::{self, StateSnapshot},
    vote::{PendingVote, VoteError, VoteReceipt, VoteState, VoteSubmitter},
    wallet::WalletProvider,
};
use reqwest::Url;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::watch;

/// What a presentation layer gets to see.
#[derive(Clone, Debug, Default)]
pub struct ClientState {
    pub identity: Identity,
    pub snapshot: StateSnapshot,
    pub pending: Option<PendingVote>,
}

/// Coarse client status.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    NotConnected,
    /// Connected; `complete` is false while any snapshot field is stale or
    /// unknown.
    Connected { complete: bool },
    VoteInFlight,
}

impl ClientState {
    pub fn status(&self) -> Status {
        if self.pending.is_some() {
            Status::VoteInFlight
        } else if self.identity.is_connected() {
            Status::Connected {
                complete: self.snapshot.is_complete(),
            }
        } else {
            Status::NotConnected
        }
    }
}

#[derive(Clone, Default)]
struct Binding {
    provider: Option<Arc<dyn WalletProvider>>,
    handle: Option<ContractHandle>,
}

/// A voting client for a single contract.
pub struct VotingClient {
    contract: String,
    descriptor: Arc<InterfaceDescriptor>,
    epoch: Epoch,
    binding: watch::Sender<Binding>,
    state: watch::Sender<ClientState>,
    submitter: VoteSubmitter,
}

impl VotingClient {
    /// Creates a disconnected client for the contract at the specified
    /// address. The address is validated when an identity gets bound.
    pub fn new(
        contract: impl Into<String>,
        descriptor: InterfaceDescriptor,
        poll_interval: Duration,
    ) -> Self {
        Self {
            contract: contract.into(),
            descriptor: Arc::new(descriptor),
            epoch: Epoch::default(),
            binding: watch::channel(Binding::default()).0,
            state: watch::channel(ClientState::default()).0,
            submitter: VoteSubmitter::new(poll_interval),
        }
    }

    /// The current client state.
    pub fn state(&self) -> ClientState {
        self.state.borrow().clone()
    }

    /// Subscribes to identity, snapshot and pending vote changes.
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    /// Subscribes to vote submission state changes.
    pub fn votes(&self) -> watch::Receiver<VoteState> {
        self.submitter.subscribe()
    }

    /// The contract handle of the active identity.
    pub fn handle(&self) -> Option<ContractHandle> {
        self.binding.borrow().handle.clone()
    }

    /// Requests account access from a wallet provider and binds the contract
    /// for the first authorized account.
    pub async fn connect_interactive(
        &self,
        provider: Option<Arc<dyn WalletProvider>>,
    ) -> Result<(), Error> {
        self.epoch.advance();
        let result = match signer::connect(provider.clone(), &self.epoch).await {
            Ok(signer) => self.install(provider, signer),
            Err(err) => Err(err.into()),
        };
        self.reset_on_error(result)
    }

    /// Binds the contract for a locally held signing key.
    pub fn connect_headless(&self, key: &str, endpoint: Url) -> Result<(), Error> {
        self.epoch.advance();
        let result = signer::connect_with_key(key, endpoint, &self.epoch)
            .map_err(Error::from)
            .and_then(|signer| self.install(None, signer));
        self.reset_on_error(result)
    }

    /// Registers a callback for wallet account changes. Handles are already
    /// stale when the callback runs; pass the identity on to
    /// [`VotingClient::apply_account_change`] to rebind.
    ///
    /// Returns `None` when no wallet provider is connected.
    pub fn watch_accounts<F>(&self, callback: F) -> Option<Subscription>
    where
        F: FnMut(Identity) + Send + 'static,
    {
        let provider = self.binding.borrow().provider.clone()?;
        Some(SessionWatcher::new(provider, self.epoch.clone()).on_account_change(callback))
    }

    /// Switches to a new identity reported by the wallet provider, rebinding
    /// the contract and refreshing its state.
    pub async fn apply_account_change(&self, identity: Identity) -> Result<(), Error> {
        self.epoch.advance();
        let provider = self.binding.borrow().provider.clone();

        match (identity, provider) {
            (Identity::Connected(account), Some(provider)) => {
                let signer = Signer::for_account(provider.clone(), account, &self.epoch);
                self.install(Some(provider), signer)?;
                self.refresh().await?;
            }
            (identity, provider) => {
                tracing::info!(%identity, "session ended");
                self.binding.send_replace(Binding {
                    provider,
                    handle: None,
                });
                self.state.send_replace(ClientState::default());
            }
        }
        Ok(())
    }

    /// Refreshes the mirrored contract state.
    pub async fn refresh(&self) -> Result<StateSnapshot, Error> {
        let handle = self.handle().ok_or(Error::NotConnected)?;
        let previous = self.state.borrow().snapshot.clone();
        let snapshot = sync::refresh(&handle, &previous).await?;

        self.publish(&handle, &snapshot);
        Ok(snapshot)
    }

    /// Votes for the candidate at `candidate_index` of the current snapshot
    /// and waits for confirmation.
    pub async fn submit_vote(&self, candidate_index: usize) -> Result<VoteReceipt, Error> {
        let handle = self.handle().ok_or(Error::NotConnected)?;
        let snapshot = self.state.borrow().snapshot.clone();

        let mut votes = self.submitter.subscribe();
        let submission = self.submitter.submit_vote(&handle, &snapshot, candidate_index);
        tokio::pin!(submission);
        let result = loop {
            tokio::select! {
                result = &mut submission => break result,
                Ok(()) = votes.changed() => {
                    let pending = votes.borrow_and_update().pending().cloned();
                    self.state.send_modify(|state| state.pending = pending);
                }
            }
        };
        self.state.send_modify(|state| state.pending = None);

        let receipt = result?;
        self.publish(&handle, &receipt.snapshot);
        Ok(receipt)
    }

    fn install(&self, provider: Option<Arc<dyn WalletProvider>>, signer: Signer) -> Result<(), Error> {
        let handle = contract::bind(&signer, &self.contract, self.descriptor.clone())?;
        let identity = Identity::Connected(signer.account());
        tracing::info!(%identity, interactive = signer.is_interactive(), "session started");

        self.binding.send_replace(Binding {
            provider,
            handle: Some(handle),
        });
        self.state.send_replace(ClientState {
            identity,
            ..Default::default()
        });
        Ok(())
    }

    /// A failed connection attempt leaves the client disconnected.
    fn reset_on_error(&self, result: Result<(), Error>) -> Result<(), Error> {
        if result.is_err() {
            self.binding.send_replace(Binding::default());
            self.state.send_replace(ClientState::default());
        }
        result
    }

    /// Publishes a snapshot unless the handle it was read through has been
    /// superseded in the meantime.
    fn publish(&self, handle: &ContractHandle, snapshot: &StateSnapshot) {
        if !handle.is_current() {
            tracing::debug!("discarding snapshot of a previous identity");
            return;
        }
        self.state
            .send_modify(|state| state.snapshot = snapshot.clone());
    }
}

/// A voting client error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddress),

    #[error("no account connected")]
    NotConnected,

    #[error(transparent)]
    StaleHandle(#[from] sync::StaleHandle),

    #[error(transparent)]
    Vote(#[from] VoteError),
}

impl Error {
    /// Returns true if the error only means that the identity changed while
    /// the operation was running.
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            Self::StaleHandle(_) | Self::Vote(VoteError::StaleHandle)
        )
    }
}
