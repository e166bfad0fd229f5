//! State synchronization: mirroring contract state into a local snapshot.

use crate::contract::{CallError, Candidate, ContractHandle};
use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    sync::Arc,
};
use thiserror::Error;

/// The independently read parts of a snapshot.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum SnapshotField {
    Candidates,
    VotingOpen,
    RemainingSeconds,
}

impl Display for SnapshotField {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Candidates => "candidates",
            Self::VotingOpen => "voting status",
            Self::RemainingSeconds => "remaining time",
        })
    }
}

/// A point-in-time, possibly partially stale, copy of the contract state.
///
/// Fields that failed to refresh keep the value of the previous snapshot, if
/// there was one, and are listed in [`StateSnapshot::failures`].
#[derive(Clone, Debug, Default)]
pub struct StateSnapshot {
    candidates: Option<Vec<Candidate>>,
    voting_open: Option<bool>,
    remaining_seconds: Option<u64>,
    failures: BTreeMap<SnapshotField, Arc<CallError>>,
}

impl StateSnapshot {
    /// The candidates in contract order.
    pub fn candidates(&self) -> Option<&[Candidate]> {
        self.candidates.as_deref()
    }

    /// Whether the voting window is open.
    pub fn voting_open(&self) -> Option<bool> {
        self.voting_open
    }

    /// Seconds until the voting window closes.
    pub fn remaining_seconds(&self) -> Option<u64> {
        self.remaining_seconds
    }

    /// Fields whose last refresh failed, with the cause.
    pub fn failures(&self) -> &BTreeMap<SnapshotField, Arc<CallError>> {
        &self.failures
    }

    /// Returns true if every field holds a freshly read value.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
            && self.candidates.is_some()
            && self.voting_open.is_some()
            && self.remaining_seconds.is_some()
    }

    /// Returns true if the field's value came from the latest refresh.
    pub fn is_fresh(&self, field: SnapshotField) -> bool {
        let known = match field {
            SnapshotField::Candidates => self.candidates.is_some(),
            SnapshotField::VotingOpen => self.voting_open.is_some(),
            SnapshotField::RemainingSeconds => self.remaining_seconds.is_some(),
        };
        known && !self.failures.contains_key(&field)
    }
}

/// Refreshes the snapshot through the specified handle.
///
/// The three reads are issued concurrently and are not atomic with respect
/// to each other. A failed read never discards the others.
pub async fn refresh(
    handle: &ContractHandle,
    previous: &StateSnapshot,
) -> Result<StateSnapshot, StaleHandle> {
    if !handle.is_current() {
        return Err(StaleHandle);
    }

    let (candidates, voting_open, remaining_seconds) = tokio::join!(
        handle.list_candidates(),
        handle.voting_open(),
        handle.remaining_seconds(),
    );

    if let (Ok(next), Some(previous)) = (&candidates, previous.candidates()) {
        check_monotonic(previous, next);
    }

    let mut failures = BTreeMap::new();
    let snapshot = StateSnapshot {
        candidates: reconcile(
            SnapshotField::Candidates,
            candidates,
            &previous.candidates,
            &mut failures,
        ),
        voting_open: reconcile(
            SnapshotField::VotingOpen,
            voting_open,
            &previous.voting_open,
            &mut failures,
        ),
        remaining_seconds: reconcile(
            SnapshotField::RemainingSeconds,
            remaining_seconds,
            &previous.remaining_seconds,
            &mut failures,
        ),
        failures,
    };

    tracing::debug!(
        candidates = snapshot.candidates.as_ref().map(Vec::len),
        voting_open = ?snapshot.voting_open,
        remaining_seconds = ?snapshot.remaining_seconds,
        failed = snapshot.failures.len(),
        "refreshed contract state"
    );
    Ok(snapshot)
}

fn reconcile<T>(
    field: SnapshotField,
    result: Result<T, CallError>,
    previous: &Option<T>,
    failures: &mut BTreeMap<SnapshotField, Arc<CallError>>,
) -> Option<T>
where
    T: Clone,
{
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(%field, %err, "failed to refresh field, keeping previous value");
            failures.insert(field, Arc::new(err));
            previous.clone()
        }
    }
}

fn check_monotonic(previous: &[Candidate], next: &[Candidate]) {
    if previous.len() != next.len() {
        tracing::warn!(
            previous = previous.len(),
            next = next.len(),
            "candidate list changed length"
        );
        return;
    }
    for (index, (before, after)) in previous.iter().zip(next).enumerate() {
        if after.vote_count < before.vote_count {
            tracing::warn!(
                index,
                before = before.vote_count,
                after = after.vote_count,
                "vote count decreased"
            );
        }
    }
}

/// A refresh attempted through a handle of a previous identity.
#[derive(Debug, Error)]
#[error("contract handle belongs to a previous identity")]
pub struct StaleHandle;
