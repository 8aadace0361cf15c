//! Bookkeeping for overlapping refreshes.
//!
//! Every refresh is stamped with a generation number when it starts. Refreshes are allowed to
//! overlap, so they can complete in any order; the tracker counts how many are in flight and
//! flags completions that land after a newer refresh has already completed.
//!
//! All counters are atomics so the tracker can be shared by concurrently running refreshes
//! without a lock.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct RefreshTracker {
	/// Last generation handed out; generations start at 1.
	last_generation: AtomicU64,
	/// Highest generation that has completed successfully
	newest_completed: AtomicU64,
	in_flight: AtomicUsize,
	completed: AtomicU64,
	failed: AtomicU64,
	/// Completions that finished after a newer refresh had already completed
	out_of_order: AtomicU64,
}

/// How a refresh ended, as seen by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
	/// Refreshes still in flight after this one.
	pub remaining: usize,
	/// False if a newer refresh completed first.
	pub in_order: bool,
}

impl RefreshTracker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Start a refresh and return its generation.
	pub fn begin(&self) -> u64 {
		self.in_flight.fetch_add(1, Ordering::SeqCst);
		self.last_generation.fetch_add(1, Ordering::SeqCst) + 1
	}

	pub fn record_completed(&self, generation: u64) -> Completion {
		self.completed.fetch_add(1, Ordering::SeqCst);
		let previous = self.newest_completed.fetch_max(generation, Ordering::SeqCst);
		let in_order = previous < generation;
		if !in_order {
			self.out_of_order.fetch_add(1, Ordering::SeqCst);
		}
		Completion {
			remaining: self.finish(),
			in_order,
		}
	}

	/// Record a failed refresh; returns the number still in flight.
	pub fn record_failed(&self) -> usize {
		self.failed.fetch_add(1, Ordering::SeqCst);
		self.finish()
	}

	pub fn in_flight(&self) -> usize {
		self.in_flight.load(Ordering::SeqCst)
	}

	pub fn stats(&self) -> RefreshStats {
		RefreshStats {
			started: self.last_generation.load(Ordering::SeqCst),
			completed: self.completed.load(Ordering::SeqCst),
			failed: self.failed.load(Ordering::SeqCst),
			out_of_order: self.out_of_order.load(Ordering::SeqCst),
			in_flight: self.in_flight(),
			newest_completed: self.newest_completed.load(Ordering::SeqCst),
		}
	}

	fn finish(&self) -> usize {
		// Saturating: a finish without a matching begin must not wrap.
		let previous = self
			.in_flight
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
			.unwrap_or(0);
		previous.saturating_sub(1)
	}
}

/// Statistics about refreshes over the engine's lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshStats {
	pub started: u64,
	pub completed: u64,
	pub failed: u64,
	pub out_of_order: u64,
	pub in_flight: usize,
	pub newest_completed: u64,
}

impl RefreshStats {
	/// Get a human-readable summary of the refresh statistics
	pub fn summary(&self) -> String {
		format!(
			"{} started, {} completed, {} failed, {} in flight, newest generation {}{}",
			self.started,
			self.completed,
			self.failed,
			self.in_flight,
			self.newest_completed,
			if self.out_of_order == 0 {
				String::new()
			} else {
				format!(" ({} out of order)", self.out_of_order)
			}
		)
	}
}
