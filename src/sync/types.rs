use crate::contract::GatewayError;
use crate::utils::UnitError;

use serde::Serialize;
use std::str::FromStr;

/// Lifecycle of the sync engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncState {
	/// No session identity; nothing is fetched.
	Idle,
	/// At least one refresh is in flight, or the last one failed.
	Syncing,
	/// The published snapshot came from a refresh that completed with nothing else in flight.
	Synced,
}

/// What to do when overlapping refreshes complete out of order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
	/// Every completed refresh is published; the last one to complete wins.
	#[default]
	LastCompletionWins,
	/// A completed refresh is dropped if a refresh triggered after it has already been
	/// published.
	LatestTriggerWins,
}

impl FromStr for RefreshPolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"last-completion" | "last_completion" => Ok(Self::LastCompletionWins),
			"latest-trigger" | "latest_trigger" => Ok(Self::LatestTriggerWins),
			other => Err(format!(
				"unknown refresh policy '{}' (expected 'last-completion' or 'latest-trigger')",
				other
			)),
		}
	}
}

/// Configuration for the sync engine
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
	pub refresh_policy: RefreshPolicy,
}

/// Errors raised by the sync engine
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	#[error("Sync engine is idle: no active identity")]
	Idle,

	#[error("Read failure: {0}")]
	ReadFailure(#[from] GatewayError),

	#[error("Unit conversion error: {0}")]
	ConversionError(#[from] UnitError),

	#[error("Subscription error: {0}")]
	SubscriptionError(String),
}
