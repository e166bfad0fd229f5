//! Session tracking: the active identity, handle invalidation and account
//! change notifications.

use crate::wallet::WalletProvider;
use alloy::primitives::Address;
use std::{
    fmt::{self, Display, Formatter},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};
use tokio::{
    sync::{broadcast::error::RecvError, watch},
    task::JoinHandle,
};

/// The active account, if any.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Identity {
    /// No account is connected.
    #[default]
    Disconnected,
    /// The specified account is active.
    Connected(Address),
}

impl Identity {
    /// Derives the identity from a provider's account list, where the first
    /// entry is the active account.
    pub fn from_accounts(accounts: &[Address]) -> Self {
        accounts
            .first()
            .copied()
            .map_or(Self::Disconnected, Self::Connected)
    }

    /// Returns the active account.
    pub fn account(&self) -> Option<Address> {
        match self {
            Self::Disconnected => None,
            Self::Connected(account) => Some(*account),
        }
    }

    /// Returns true if an account is active.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("not connected"),
            Self::Connected(account) => write!(f, "{account}"),
        }
    }
}

/// A counter that advances every time the active identity changes.
///
/// Everything derived from an identity holds a [`Ticket`] for the epoch it was
/// created in and stops being usable as soon as the epoch moves on.
#[derive(Clone, Debug, Default)]
pub struct Epoch(Arc<AtomicU64>);

impl Epoch {
    /// Issues a ticket for the current epoch.
    pub fn ticket(&self) -> Ticket {
        Ticket {
            epoch: self.clone(),
            issued: self.0.load(Ordering::SeqCst),
        }
    }

    /// Ends the current epoch, invalidating all outstanding tickets.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Proof of having been created in a specific epoch.
#[derive(Clone, Debug)]
pub struct Ticket {
    epoch: Epoch,
    issued: u64,
}

impl Ticket {
    /// Returns true while no identity change happened since the ticket was
    /// issued.
    pub fn is_current(&self) -> bool {
        self.epoch.0.load(Ordering::SeqCst) == self.issued
    }
}

/// Watches a wallet provider for account changes.
pub struct SessionWatcher {
    provider: Arc<dyn WalletProvider>,
    epoch: Epoch,
}

impl SessionWatcher {
    /// Creates a watcher that invalidates tickets of the specified epoch on
    /// every account change.
    pub fn new(provider: Arc<dyn WalletProvider>, epoch: Epoch) -> Self {
        Self { provider, epoch }
    }

    /// Registers a callback invoked with the new identity whenever the
    /// provider reports an account change, including disconnects.
    ///
    /// Handles bound before the change are already stale when the callback
    /// runs. The watcher does not rebind them.
    pub fn on_account_change<F>(&self, mut callback: F) -> Subscription
    where
        F: FnMut(Identity) + Send + 'static,
    {
        let mut changes = self.provider.accounts_changed();
        let (shutdown, mut stopped) = watch::channel(false);
        let active = Arc::new(Mutex::new(true));
        let epoch = self.epoch.clone();

        let task = tokio::spawn({
            let active = active.clone();
            async move {
                loop {
                    let accounts = tokio::select! {
                        _ = stopped.changed() => break,
                        accounts = changes.recv() => accounts,
                    };
                    let accounts = match accounts {
                        Ok(accounts) => accounts,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "missed account change notifications");
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    // Held while the callback runs so that `unsubscribe`
                    // waits for an ongoing notification to finish.
                    let guard = lock(&active);
                    if !*guard {
                        break;
                    }
                    let identity = Identity::from_accounts(&accounts);
                    let epoch = epoch.advance();
                    tracing::debug!(%identity, epoch, "account changed");
                    callback(identity);
                }
            }
        });

        Subscription {
            active,
            shutdown: Some(shutdown),
            task: Some(task),
        }
    }
}

/// A registered account change callback.
///
/// Dropping the subscription unsubscribes it.
pub struct Subscription {
    active: Arc<Mutex<bool>>,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Stops delivering notifications. Safe to call more than once.
    ///
    /// A callback running concurrently finishes before this returns, so the
    /// callback must not unsubscribe itself.
    pub fn unsubscribe(&mut self) {
        *lock(&self.active) = false;
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Returns true until [`Subscription::unsubscribe`] is called.
    pub fn is_active(&self) -> bool {
        *lock(&self.active)
    }
}

fn lock(active: &Mutex<bool>) -> MutexGuard<'_, bool> {
    active.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
