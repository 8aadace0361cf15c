//! Wire-level types for the crowdfunding contract gateway

use ethers::types::{Address, H256, Log, U256, U64};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Campaign record as returned by `getCampaign(id)`, in base units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignDetail {
	pub entrepreneur: Address,
	pub title: String,
	/// Price of one pledge, in base units.
	pub pledge_cost: U256,
	/// Number of pledges needed to fulfill the campaign.
	pub pledges_needed: U256,
	/// Number of pledges received so far.
	pub pledges_count: U256,
}

impl From<(Address, String, U256, U256, U256)> for CampaignDetail {
	fn from(
		(entrepreneur, title, pledge_cost, pledges_needed, pledges_count): (
			Address,
			String,
			U256,
			U256,
			U256,
		),
	) -> Self {
		Self {
			entrepreneur,
			title,
			pledge_cost,
			pledges_needed,
			pledges_count,
		}
	}
}

/// A contract-emitted event of any kind.
///
/// The sync engine does not look inside; every event means "state may have changed".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEvent {
	pub block_number: Option<U64>,
	pub transaction_hash: Option<H256>,
	pub log_index: Option<U256>,
	/// First topic, i.e. the event signature hash for non-anonymous events.
	pub signature: Option<H256>,
}

impl From<Log> for ContractEvent {
	fn from(log: Log) -> Self {
		Self {
			block_number: log.block_number,
			transaction_hash: log.transaction_hash,
			log_index: log.log_index,
			signature: log.topics.first().copied(),
		}
	}
}

/// Handle to an event subscription.
///
/// Delivery stops when the handle is unsubscribed or dropped, or when the underlying event
/// stream ends on its own.
pub struct Subscription {
	cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
	/// Reports whether delivery has stopped without being unsubscribed.
	ended: Option<Box<dyn Fn() -> bool + Send + Sync>>,
}

impl Subscription {
	pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
		Self {
			cancel: Some(Box::new(cancel)),
			ended: None,
		}
	}

	pub fn with_end_check(mut self, ended: impl Fn() -> bool + Send + Sync + 'static) -> Self {
		self.ended = Some(Box::new(ended));
		self
	}

	/// Subscription driven by a background task; unsubscribing aborts it and it ends when the
	/// task returns.
	pub fn from_task(task: tokio::task::JoinHandle<()>) -> Self {
		let task = Arc::new(task);
		let watched = task.clone();
		Self::new(move || task.abort()).with_end_check(move || watched.is_finished())
	}

	/// False once unsubscribed or once the event stream has ended.
	pub fn is_active(&self) -> bool {
		self.cancel.is_some() && !self.ended.as_ref().is_some_and(|ended| ended())
	}

	pub fn unsubscribe(mut self) {
		self.cancel_now();
	}

	fn cancel_now(&mut self) {
		if let Some(cancel) = self.cancel.take() {
			cancel();
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.cancel_now();
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription")
			.field("active", &self.is_active())
			.finish()
	}
}

/// Error types for contract gateway operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
	#[error("Read of {method} failed: {message}")]
	ReadError { method: &'static str, message: String },

	#[error("Submission rejected by signer: {0}")]
	SubmissionRejected(String),

	#[error("Execution reverted: {0}")]
	ExecutionReverted(String),

	#[error("Submission of {method} failed: {message}")]
	SubmissionError { method: &'static str, message: String },

	#[error("Subscription error: {0}")]
	SubscriptionError(String),
}
