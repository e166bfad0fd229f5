//! The wallet provider boundary.
//!
//! A wallet provider holds the user's keys. It answers JSON RPC requests the
//! way an EIP-1193 provider does (prompting for account access, filling and
//! signing transactions) and reports when the set of exposed accounts changes.

use crate::{
    jsonrpc::{Client, ClientError, InvalidScheme, Request, Response, Transport},
    node::{method::eth, remote::Remote},
};
use alloy::primitives::Address;
use futures_util::future::BoxFuture;
use reqwest::Url;
use std::{sync::Arc, time::Duration};
use tokio::{sync::broadcast, task::JoinHandle};

/// An external wallet provider.
pub trait WalletProvider: Send + Sync {
    /// Forwards a JSON RPC request to the provider.
    fn request(&self, request: Request) -> BoxFuture<'_, Result<Response, ClientError>>;

    /// Subscribes to `accountsChanged` notifications. Each message carries the
    /// full list of accounts now exposed, empty on disconnect.
    fn accounts_changed(&self) -> broadcast::Receiver<Vec<Address>>;
}

/// Adapter for sending JSON RPC requests through a wallet provider.
pub struct ProviderTransport(pub Arc<dyn WalletProvider>);

impl Transport for ProviderTransport {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Response, ClientError>> {
        self.0.request(request)
    }
}

/// A wallet provider reached over JSON RPC, such as a node with unlocked
/// accounts or a signing proxy.
///
/// Account changes are detected by polling `eth_accounts`.
pub struct RpcWallet {
    client: Arc<Client>,
    changes: broadcast::Sender<Vec<Address>>,
    poller: JoinHandle<()>,
}

impl RpcWallet {
    /// Connects to the wallet endpoint and starts watching its accounts.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(url: Url, poll_interval: Duration) -> Result<Self, InvalidScheme> {
        let client = Arc::new(Client::new(url)?);
        let (changes, _) = broadcast::channel(16);
        let poller = tokio::spawn(poll_accounts(
            client.clone(),
            changes.clone(),
            poll_interval,
        ));

        Ok(Self {
            client,
            changes,
            poller,
        })
    }
}

impl WalletProvider for RpcWallet {
    fn request(&self, request: Request) -> BoxFuture<'_, Result<Response, ClientError>> {
        Box::pin(self.client.execute(request))
    }

    fn accounts_changed(&self) -> broadcast::Receiver<Vec<Address>> {
        self.changes.subscribe()
    }
}

impl Drop for RpcWallet {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

async fn poll_accounts(
    client: Arc<Client>,
    changes: broadcast::Sender<Vec<Address>>,
    poll_interval: Duration,
) {
    let remote = Remote::new(client);
    let mut known: Option<Vec<Address>> = None;
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let accounts = match remote.execute(eth::Accounts, ()).await {
            Ok(accounts) => accounts.into_iter().map(|a| a.0).collect::<Vec<_>>(),
            Err(err) => {
                tracing::debug!(%err, "failed to poll wallet accounts");
                continue;
            }
        };

        match &known {
            Some(previous) if *previous == accounts => {}
            Some(_) => {
                tracing::debug!(?accounts, "wallet accounts changed");
                // No receivers is fine, nobody is watching the session yet.
                let _ = changes.send(accounts.clone());
                known = Some(accounts);
            }
            None => known = Some(accounts),
        }
    }
}
