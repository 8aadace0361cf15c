//! Contract state synchronization.
//!
//! The [`SyncEngine`] keeps a read-only local snapshot of the crowdfunding contract and
//! replaces it after every full refresh. Contract events of any kind trigger a refresh.
//!
//! Architecture:
//! - `engine`: session lifecycle, concurrent reads and snapshot publication
//! - `events`: fan-out of contract events to registered handlers
//! - `refresh_tracker`: generation numbers and counters for overlapping refreshes
//! - `snapshot`: the immutable snapshot types
//! - `types`: state, policy, config and error types

pub mod engine;
pub mod events;
pub mod refresh_tracker;
pub mod snapshot;
pub mod types;

pub use engine::SyncEngine;
pub use events::{EventDispatcher, EventLogHandler, ResyncHandler};
pub use refresh_tracker::{RefreshStats, RefreshTracker};
pub use snapshot::{Campaign, CampaignStatus, ContractSnapshot, SyncedSnapshot};
pub use types::{EngineConfig, RefreshPolicy, SyncError, SyncState};
