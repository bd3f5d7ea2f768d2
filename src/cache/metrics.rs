// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing how a [`TokenCache`](crate::cache::TokenCache) served calls.
#[derive(Debug, Default)]
pub struct CacheMetrics {
	hits: AtomicU64,
	waits: AtomicU64,
	acquisitions: AtomicU64,
	failures: AtomicU64,
	background_started: AtomicU64,
	background_succeeded: AtomicU64,
	background_fallbacks: AtomicU64,
	background_abandoned: AtomicU64,
}
impl CacheMetrics {
	/// Calls answered from an already-completed token without waiting.
	pub fn hits(&self) -> u64 {
		self.hits.load(Ordering::Relaxed)
	}

	/// Calls that waited on another caller's in-flight acquisition.
	pub fn waits(&self) -> u64 {
		self.waits.load(Ordering::Relaxed)
	}

	/// Synchronous credential acquisitions started.
	pub fn acquisitions(&self) -> u64 {
		self.acquisitions.load(Ordering::Relaxed)
	}

	/// Synchronous acquisitions that ended in a credential failure.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Background refreshes started.
	pub fn background_started(&self) -> u64 {
		self.background_started.load(Ordering::Acquire)
	}

	/// Background refreshes that produced a new token.
	pub fn background_succeeded(&self) -> u64 {
		self.background_succeeded.load(Ordering::Acquire)
	}

	/// Background refreshes that failed or timed out and fell back to the previous header.
	pub fn background_fallbacks(&self) -> u64 {
		self.background_fallbacks.load(Ordering::Acquire)
	}

	/// Background refreshes dropped before they finished, e.g. by a runtime shutdown.
	pub fn background_abandoned(&self) -> u64 {
		self.background_abandoned.load(Ordering::Acquire)
	}

	/// Background refreshes that have not written their slot yet.
	pub fn background_in_flight(&self) -> u64 {
		let settled =
			self.background_succeeded() + self.background_fallbacks() + self.background_abandoned();

		self.background_started().saturating_sub(settled)
	}

	pub(crate) fn record_hit(&self) {
		self.hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_wait(&self) {
		self.waits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_acquisition(&self) {
		self.acquisitions.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_background_started(&self) {
		self.background_started.fetch_add(1, Ordering::AcqRel);
	}

	pub(crate) fn record_background_succeeded(&self) {
		self.background_succeeded.fetch_add(1, Ordering::AcqRel);
	}

	pub(crate) fn record_background_fallback(&self) {
		self.background_fallbacks.fetch_add(1, Ordering::AcqRel);
	}

	pub(crate) fn record_background_abandoned(&self) {
		self.background_abandoned.fetch_add(1, Ordering::AcqRel);
	}
}
