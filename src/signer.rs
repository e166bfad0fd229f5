//! Signer binding: acquiring an account and a capability to sign for it.
//!
//! An account is either authorized by a wallet provider, which keeps the keys
//! and signs on our behalf, or derived from a locally configured private key
//! for non-interactive use.

pub mod key;
pub mod log_recorder;

use crate::{
    jsonrpc::{Client, InvalidScheme, Transport},
    node::{method::eth, remote::Remote, transaction::Transaction},
    session::{Epoch, Ticket},
    wallet::{ProviderTransport, WalletProvider},
};
use alloy::primitives::{Address, Signature};
use anyhow::Result;
use reqwest::Url;
use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};
use thiserror::Error;

use self::{
    key::{InvalidKeyError, LocalKey},
    log_recorder::LogRecorder,
};

/// A trait abstracting Ethereum transaction signing with a local key.
pub trait Signing {
    /// Returns the address of the account managed by the signer.
    fn account(&self) -> Address;

    /// Signs an Ethereum transaction.
    fn sign_transaction(&self, transaction: &Transaction) -> Result<Signature>;
}

/// A boxed signer that is safe to send between threads.
pub type BoxSigner = Box<dyn Signing + Send + Sync + 'static>;

/// How state-mutating calls get authorized.
#[derive(Clone)]
pub(crate) enum Capability {
    /// The wallet provider fills, signs and sends transactions itself.
    Wallet,
    /// Transactions are filled and signed locally, then sent raw.
    Key(Arc<BoxSigner>),
}

/// An authorized account together with the endpoint and capability used to
/// act on its behalf.
#[derive(Clone)]
pub struct Signer {
    account: Address,
    capability: Capability,
    remote: Arc<Remote>,
    ticket: Ticket,
}

impl Signer {
    /// Creates an interactive signer for an account the provider already
    /// authorized, for example one reported by an account change.
    pub fn for_account(provider: Arc<dyn WalletProvider>, account: Address, epoch: &Epoch) -> Self {
        Self {
            account,
            capability: Capability::Wallet,
            remote: Arc::new(Remote::new(Arc::new(ProviderTransport(provider)))),
            ticket: epoch.ticket(),
        }
    }

    /// Creates a headless signer sending transactions over the specified
    /// transport.
    pub(crate) fn with_key(key: BoxSigner, transport: Arc<dyn Transport>, epoch: &Epoch) -> Self {
        Self {
            account: key.account(),
            capability: Capability::Key(Arc::new(key)),
            remote: Arc::new(Remote::new(transport)),
            ticket: epoch.ticket(),
        }
    }

    /// The signing account.
    pub fn account(&self) -> Address {
        self.account
    }

    /// Returns true if this signer signs through a wallet provider.
    pub fn is_interactive(&self) -> bool {
        matches!(self.capability, Capability::Wallet)
    }

    pub(crate) fn capability(&self) -> &Capability {
        &self.capability
    }

    pub(crate) fn remote(&self) -> &Arc<Remote> {
        &self.remote
    }

    pub(crate) fn ticket(&self) -> &Ticket {
        &self.ticket
    }
}

impl Debug for Signer {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Signer")
            .field("account", &self.account)
            .field("interactive", &self.is_interactive())
            .finish_non_exhaustive()
    }
}

/// Requests account access from a wallet provider.
///
/// Returns a signer for the first authorized account.
pub async fn connect(
    provider: Option<Arc<dyn WalletProvider>>,
    epoch: &Epoch,
) -> Result<Signer, ConnectError> {
    let provider = provider
        .ok_or_else(|| ConnectError::ProviderUnavailable("no provider present".to_owned()))?;
    let remote = Remote::new(Arc::new(ProviderTransport(provider)));

    let accounts = remote
        .execute(eth::RequestAccounts, ())
        .await
        .map_err(|err| {
            if err.is_user_rejected() {
                ConnectError::UserRejected
            } else if err.is_unreachable() {
                ConnectError::ProviderUnavailable(err.to_string())
            } else {
                ConnectError::Remote(err.to_string())
            }
        })?;
    let account = accounts.first().ok_or(ConnectError::NoAccounts)?.0;
    tracing::debug!(%account, authorized = accounts.len(), "wallet connected");

    Ok(Signer {
        account,
        capability: Capability::Wallet,
        remote: Arc::new(remote),
        ticket: epoch.ticket(),
    })
}

/// Derives a headless signer from a private key and a node endpoint.
///
/// This performs no network I/O.
pub fn connect_with_key(key: &str, endpoint: Url, epoch: &Epoch) -> Result<Signer, ConnectError> {
    let key = LocalKey::from_hex(key)?;
    let account = key.account();
    let client = Client::new(endpoint)?;
    tracing::debug!(%account, url = %client.url(), "using local signing key");

    Ok(Signer::with_key(Box::new(LogRecorder(key)), Arc::new(client), epoch))
}

/// An error establishing a signing identity.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("wallet provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("user rejected the account access request")]
    UserRejected,

    #[error("wallet provider authorized no accounts")]
    NoAccounts,

    #[error("invalid signing key: {0}")]
    InvalidKey(#[from] InvalidKeyError),

    #[error("invalid node endpoint: {0}")]
    InvalidEndpoint(#[from] InvalidScheme),

    #[error("wallet provider error: {0}")]
    Remote(String),
}
