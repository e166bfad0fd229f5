//! Typed access to Ethereum JSON RPC endpoints.

pub mod method;
pub mod remote;
pub mod transaction;
pub mod types;
