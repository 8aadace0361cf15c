//! The sync engine: keeps a local snapshot of the crowdfunding contract eventually consistent
//! with the chain.
//!
//! A refresh issues the six top-level reads (owner, balance, fees and the three campaign id
//! lists) concurrently, then the per-campaign detail reads, and only then assembles and
//! publishes a new snapshot. The reads are not transactionally consistent with each other;
//! the snapshot is a best-effort point-in-time view.
//!
//! Every contract event starts another full refresh in the background. Refreshes may overlap
//! and are not cancelled; under the default [`RefreshPolicy::LastCompletionWins`] whichever
//! completes last determines the published snapshot.

use crate::contract::{ContractGateway, Subscription};
use crate::sync::events::{EventDispatcher, EventLogHandler, ResyncHandler};
use crate::sync::refresh_tracker::{RefreshStats, RefreshTracker};
use crate::sync::snapshot::{Campaign, ContractSnapshot, SyncedSnapshot};
use crate::sync::types::{EngineConfig, RefreshPolicy, SyncError, SyncState};
use crate::utils::to_display_units;
use crate::wallet::Identity;

use chrono::Utc;
use ethers::types::U256;
use futures::future::try_join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

/// Owns the canonical snapshot and the contract event subscription.
///
/// Cloning is cheap; clones share the same engine.
#[derive(Clone)]
pub struct SyncEngine {
	core: Arc<EngineCore>,
}

struct EngineCore {
	gateway: Arc<dyn ContractGateway>,
	config: EngineConfig,
	identity: watch::Sender<Option<Identity>>,
	state: watch::Sender<SyncState>,
	/// The single published snapshot; replaced, never mutated.
	snapshot: watch::Sender<Option<Arc<SyncedSnapshot>>>,
	/// At most one subscription per session.
	subscription: Mutex<Option<Subscription>>,
	/// Set while a subscription is open; `Synced` requires it.
	listening: AtomicBool,
	tracker: RefreshTracker,
}

impl SyncEngine {
	pub fn new(gateway: Arc<dyn ContractGateway>, config: EngineConfig) -> Self {
		let (identity, _) = watch::channel(None);
		let (state, _) = watch::channel(SyncState::Idle);
		let (snapshot, _) = watch::channel(None);

		Self {
			core: Arc::new(EngineCore {
				gateway,
				config,
				identity,
				state,
				snapshot,
				subscription: Mutex::new(None),
				listening: AtomicBool::new(false),
				tracker: RefreshTracker::new(),
			}),
		}
	}

	/// Start a session for `identity`: full refresh, then the event subscription.
	///
	/// The subscription is opened even if the first refresh fails, so the next contract event
	/// retries it. Calling `start` again while a session is active refreshes without opening a
	/// second subscription, unless the previous event stream has ended.
	///
	/// The state only reaches `Synced` once the subscription is open. If subscribing fails the
	/// refreshed snapshot is still published but the state stays `Syncing`.
	pub async fn start(&self, identity: Identity) -> Result<Arc<SyncedSnapshot>, SyncError> {
		info!("Starting sync session for {}", identity);
		self.core.identity.send_replace(Some(identity));
		self.core.state.send_replace(SyncState::Syncing);
		self.drop_ended_subscription().await;

		let refreshed = self.core.refresh().await;
		self.ensure_subscribed().await?;

		if refreshed.is_ok() && self.core.tracker.in_flight() == 0 {
			self.core.state.send_if_modified(|state| {
				let settle = *state == SyncState::Syncing;
				if settle {
					*state = SyncState::Synced;
				}
				settle
			});
		}
		refreshed
	}

	/// Run a full refresh now.
	///
	/// Returns the snapshot this refresh assembled. Refused without touching the gateway while
	/// the engine is idle.
	pub async fn refresh(&self) -> Result<Arc<SyncedSnapshot>, SyncError> {
		self.core.refresh().await
	}

	/// Start a full refresh in the background without waiting for it.
	pub fn trigger_refresh(&self) {
		EngineCore::spawn_refresh(self.core.clone());
	}

	/// End the session: unsubscribe, forget the identity and the snapshot, go idle.
	///
	/// Refreshes still in flight complete but are not published.
	pub async fn stop(&self) {
		if let Some(subscription) = self.core.subscription.lock().await.take() {
			subscription.unsubscribe();
		}
		self.core.listening.store(false, Ordering::SeqCst);
		self.core.identity.send_replace(None);
		self.core.state.send_replace(SyncState::Idle);
		self.core.snapshot.send_replace(None);
		info!("Sync session stopped: {}", self.core.tracker.stats().summary());
	}

	pub fn state(&self) -> SyncState {
		*self.core.state.borrow()
	}

	pub fn identity(&self) -> Option<Identity> {
		self.core.identity.borrow().clone()
	}

	pub fn snapshot(&self) -> Option<Arc<SyncedSnapshot>> {
		self.core.snapshot.borrow().clone()
	}

	/// Read-only view of the published snapshot.
	pub fn subscribe_snapshot(&self) -> watch::Receiver<Option<Arc<SyncedSnapshot>>> {
		self.core.snapshot.subscribe()
	}

	pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
		self.core.state.subscribe()
	}

	pub fn stats(&self) -> RefreshStats {
		self.core.tracker.stats()
	}

	/// True while the event subscription is open and its stream has not ended.
	pub async fn is_subscribed(&self) -> bool {
		self.core
			.subscription
			.lock()
			.await
			.as_ref()
			.is_some_and(Subscription::is_active)
	}

	async fn drop_ended_subscription(&self) {
		let mut slot = self.core.subscription.lock().await;
		let ended = slot.as_ref().is_some_and(|s| !s.is_active());
		if ended {
			warn!("Contract event stream ended, resubscribing");
			if let Some(subscription) = slot.take() {
				subscription.unsubscribe();
			}
			self.core.listening.store(false, Ordering::SeqCst);
		}
	}

	async fn ensure_subscribed(&self) -> Result<(), SyncError> {
		let mut slot = self.core.subscription.lock().await;
		if slot.is_some() {
			debug!("Event subscription already active");
			return Ok(());
		}

		let core = Arc::downgrade(&self.core);
		let mut dispatcher = EventDispatcher::new();
		dispatcher.register_handler(Arc::new(EventLogHandler::default()));
		dispatcher.register_handler(Arc::new(ResyncHandler::new(move || {
			if let Some(core) = core.upgrade() {
				EngineCore::spawn_refresh(core);
			}
		})));

		let subscription = self
			.core
			.gateway
			.subscribe_all(Arc::new(dispatcher))
			.await
			.map_err(|e| SyncError::SubscriptionError(e.to_string()))?;

		info!("Listening for contract events");
		*slot = Some(subscription);
		self.core.listening.store(true, Ordering::SeqCst);
		Ok(())
	}
}

impl EngineCore {
	fn spawn_refresh(core: Arc<EngineCore>) {
		tokio::spawn(async move {
			match core.refresh().await {
				Ok(_) => {}
				Err(SyncError::Idle) => debug!("Skipped event-triggered refresh: engine idle"),
				Err(e) => warn!("Event-triggered refresh failed: {}", e),
			}
		});
	}

	async fn refresh(&self) -> Result<Arc<SyncedSnapshot>, SyncError> {
		let idle = *self.state.borrow() == SyncState::Idle;
		if idle {
			debug!("Refresh refused: no active session");
			return Err(SyncError::Idle);
		}

		let generation = self.tracker.begin();
		self.state.send_replace(SyncState::Syncing);
		debug!("Refresh #{} started", generation);

		match self.fetch().await {
			Ok(contract) => self.complete(generation, contract),
			Err(e) => {
				let remaining = self.tracker.record_failed();
				warn!(
					"Refresh #{} failed, keeping previous snapshot ({} still in flight): {}",
					generation, remaining, e
				);
				Err(e)
			}
		}
	}

	fn complete(
		&self,
		generation: u64,
		contract: ContractSnapshot,
	) -> Result<Arc<SyncedSnapshot>, SyncError> {
		let completion = self.tracker.record_completed(generation);

		let stopped = *self.state.borrow() == SyncState::Idle;
		if stopped {
			debug!("Discarding refresh #{}: session stopped", generation);
			return Err(SyncError::Idle);
		}
		if !completion.in_order {
			warn!(
				"Refresh #{} completed after a newer refresh had already completed",
				generation
			);
		}

		let snapshot = Arc::new(SyncedSnapshot {
			generation,
			refreshed_at: Utc::now(),
			contract,
		});

		let policy = self.config.refresh_policy;
		let published = self.snapshot.send_if_modified(|current| {
			let superseded = policy == RefreshPolicy::LatestTriggerWins
				&& current.as_ref().is_some_and(|c| c.generation > generation);
			if superseded {
				return false;
			}
			*current = Some(snapshot.clone());
			true
		});

		if published {
			info!(
				"Published snapshot #{}: {} live, {} fulfilled, {} cancelled campaigns",
				generation,
				snapshot.live.len(),
				snapshot.fulfilled.len(),
				snapshot.cancelled.len()
			);
		} else {
			debug!("Refresh #{} superseded by a newer snapshot", generation);
		}

		if completion.remaining == 0 && self.listening.load(Ordering::SeqCst) {
			self.state.send_replace(SyncState::Synced);
		}
		Ok(snapshot)
	}

	async fn fetch(&self) -> Result<ContractSnapshot, SyncError> {
		let gateway = self.gateway.as_ref();
		let (owner, balance, fees, live_ids, fulfilled_ids, cancelled_ids) = tokio::try_join!(
			gateway.owner(),
			gateway.contract_balance(),
			gateway.total_fees(),
			gateway.active_campaign_ids(),
			gateway.fulfilled_campaign_ids(),
			gateway.cancelled_campaign_ids(),
		)?;

		let (live, fulfilled, cancelled) = tokio::try_join!(
			self.load_campaigns(&live_ids),
			self.load_campaigns(&fulfilled_ids),
			self.load_campaigns(&cancelled_ids),
		)?;

		Ok(ContractSnapshot {
			owner: Identity::from_address(owner),
			balance: to_display_units(balance)?,
			collected_fees: to_display_units(fees)?,
			live,
			fulfilled,
			cancelled,
		})
	}

	async fn load_campaigns(&self, ids: &[U256]) -> Result<Vec<Campaign>, SyncError> {
		let details = try_join_all(ids.iter().map(|id| self.gateway.campaign_detail(*id))).await?;
		ids.iter()
			.zip(details)
			.map(|(id, detail)| Campaign::from_detail(*id, detail).map_err(SyncError::from))
			.collect()
	}
}
