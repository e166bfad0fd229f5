//! A client for on-chain voting contracts.
//!
//! The client binds a signing identity (either a wallet provider or a local
//! key), binds the voting contract for it, mirrors the contract state into a
//! [`sync::StateSnapshot`] and submits votes.

pub mod client;
pub mod config;
pub mod contract;
pub mod jsonrpc;
pub mod node;
pub mod serialization;
pub mod session;
pub mod signer;
pub mod sync;
pub mod vote;
pub mod wallet;

#[cfg(test)]
mod testing;

pub use self::{
    client::{ClientState, Status, VotingClient},
    contract::{bind, Candidate, ContractHandle},
    session::{Identity, Subscription},
    sync::StateSnapshot,
    vote::{PendingVote, VoteReceipt, VoteState},
};
