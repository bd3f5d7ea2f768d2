//! Time sources used for expiry and refresh decisions.

// self
use crate::_prelude::*;

/// Source of "now" for expiry bookkeeping.
pub trait Clock
where
	Self: 'static + Send + Sync,
{
	/// Current UTC instant.
	fn now(&self) -> OffsetDateTime;
}

/// Wall clock backed by [`OffsetDateTime::now_utc`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Manually driven clock for deterministic expiry tests and simulations.
///
/// Clones share the same instant, so a test can keep one handle while the cache owns another.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<OffsetDateTime>>);
impl ManualClock {
	/// Creates a clock frozen at `start`.
	pub fn new(start: OffsetDateTime) -> Self {
		Self(Arc::new(Mutex::new(start)))
	}

	/// Moves the clock forward (or backward, for negative values) by `delta`.
	pub fn advance(&self, delta: Duration) {
		*self.0.lock() += delta;
	}

	/// Jumps to `instant`.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.lock() = instant;
	}
}
impl Default for ManualClock {
	fn default() -> Self {
		Self::new(OffsetDateTime::now_utc())
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn manual_clock_clones_share_time() {
		let clock = ManualClock::new(macros::datetime!(2025-01-01 00:00 UTC));
		let handle = clock.clone();

		handle.advance(Duration::minutes(6));

		assert_eq!(clock.now(), macros::datetime!(2025-01-01 00:06 UTC));

		handle.set(macros::datetime!(2025-02-01 00:00 UTC));

		assert_eq!(clock.now(), macros::datetime!(2025-02-01 00:00 UTC));
	}

	#[test]
	fn system_clock_moves_forward() {
		let before = OffsetDateTime::now_utc();

		assert!(SystemClock.now() >= before);
	}
}
