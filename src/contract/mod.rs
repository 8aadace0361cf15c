//! Crowdfunding contract integration.
//!
//! This module provides the gateway trait through which the rest of the client reads contract
//! state, submits transactions and listens for contract events, together with the
//! ethers-backed implementation. No other module issues network calls to the contract.

/// Ethers client for the deployed contract
mod client;
/// Gateway and event handler traits
mod gateway;
#[cfg(test)]
pub(crate) mod mock;
/// Wire-level types and errors
mod types;

pub use client::EthersGateway;
pub use gateway::{ContractEventHandler, ContractGateway};
pub use types::*;
