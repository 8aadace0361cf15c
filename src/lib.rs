//! Client state synchronization for an on-chain crowdfunding contract.
//!
//! - [`wallet`] resolves the active account into a shared [`wallet::Identity`]
//! - [`contract`] is the only path to the chain: reads, writes and the event stream
//! - [`sync`] mirrors contract state into a replace-only snapshot and resyncs on every event
//! - [`transaction`] checks each user action against the identity and snapshot before submitting it

pub mod config;
pub mod contract;
pub mod sync;
pub mod transaction;
pub mod utils;
pub mod wallet;

pub use config::ClientConfig;
pub use contract::{ContractGateway, EthersGateway};
pub use sync::{SyncEngine, SyncState};
pub use transaction::{ActionDispatcher, Permissions};
pub use wallet::{AccountProvider, Identity};
