//! Event fan-out for the sync engine.
//!
//! The gateway delivers every contract event to a single handler. The engine installs an
//! [`EventDispatcher`] there, which forwards each event to its registered handlers in
//! registration order. Event kinds are not distinguished: any event means the contract state
//! may have changed.

use crate::contract::{ContractEvent, ContractEventHandler};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Event dispatcher that manages multiple event handlers.
#[derive(Default)]
pub struct EventDispatcher {
	handlers: Vec<Arc<dyn ContractEventHandler>>,
}

impl EventDispatcher {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a new event handler.
	///
	/// Handlers are called in the order they are registered.
	pub fn register_handler(&mut self, handler: Arc<dyn ContractEventHandler>) {
		self.handlers.push(handler);
	}

	pub fn handler_names(&self) -> Vec<&'static str> {
		self.handlers.iter().map(|h| h.name()).collect()
	}
}

#[async_trait::async_trait]
impl ContractEventHandler for EventDispatcher {
	async fn on_event(&self, event: ContractEvent) {
		for handler in &self.handlers {
			handler.on_event(event.clone()).await;
		}
	}

	fn name(&self) -> &'static str {
		"EventDispatcher"
	}
}

/// Starts a full resync for every event.
///
/// The trigger must not wait for the refresh to finish, so a slow refresh never holds up
/// delivery of the next event.
pub struct ResyncHandler {
	trigger: Box<dyn Fn() + Send + Sync>,
}

impl ResyncHandler {
	pub fn new(trigger: impl Fn() + Send + Sync + 'static) -> Self {
		Self {
			trigger: Box::new(trigger),
		}
	}
}

#[async_trait::async_trait]
impl ContractEventHandler for ResyncHandler {
	async fn on_event(&self, _event: ContractEvent) {
		(self.trigger)();
	}

	fn name(&self) -> &'static str {
		"ResyncHandler"
	}
}

/// Counts and logs received events
#[derive(Default)]
pub struct EventLogHandler {
	received: AtomicU64,
}

impl EventLogHandler {
	pub fn received(&self) -> u64 {
		self.received.load(Ordering::Relaxed)
	}
}

#[async_trait::async_trait]
impl ContractEventHandler for EventLogHandler {
	async fn on_event(&self, event: ContractEvent) {
		let count = self.received.fetch_add(1, Ordering::Relaxed) + 1;
		debug!(
			"Contract event #{}: block {:?}, tx {:?}, signature {:?}",
			count, event.block_number, event.transaction_hash, event.signature
		);
	}

	fn name(&self) -> &'static str {
		"EventLogHandler"
	}
}
