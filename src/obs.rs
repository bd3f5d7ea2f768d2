//! Optional observability helpers for token acquisitions.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `bearer_cache.acquisition` with the `mode`
//!   (synchronous or background) and `stage` (call site) fields, plus a warning whenever a
//!   background refresh falls back to the previous token.
//! - Enable `metrics` to increment the `bearer_cache_acquisition_total` counter for every
//!   attempt/success/failure/cancellation, labeled by `mode` + `outcome`, and the
//!   `bearer_cache_background_fallback_total` counter labeled by `reason`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// How an acquisition relates to the caller that triggered it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AcquisitionMode {
	/// The triggering caller (and any concurrent waiters) block on the result.
	Synchronous,
	/// Detached renewal while the previous token keeps serving.
	Background,
}
impl AcquisitionMode {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AcquisitionMode::Synchronous => "synchronous",
			AcquisitionMode::Background => "background",
		}
	}
}
impl Display for AcquisitionMode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AcquisitionOutcome {
	/// Credential call started.
	Attempt,
	/// Credential produced a token.
	Success,
	/// Credential failed (or, in background mode, timed out).
	Failure,
	/// The acquiring caller was cancelled.
	Cancelled,
}
impl AcquisitionOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AcquisitionOutcome::Attempt => "attempt",
			AcquisitionOutcome::Success => "success",
			AcquisitionOutcome::Failure => "failure",
			AcquisitionOutcome::Cancelled => "cancelled",
		}
	}
}
impl Display for AcquisitionOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Why a background refresh fell back to the previous token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FallbackReason {
	/// The credential returned an error; the next attempt waits for the retry delay.
	Failure,
	/// The refresh exceeded its deadline, which already spent the retry delay; the next call
	/// retries.
	Timeout,
	/// No tokio runtime was reachable to run the refresh.
	NoRuntime,
}
impl FallbackReason {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FallbackReason::Failure => "failure",
			FallbackReason::Timeout => "timeout",
			FallbackReason::NoRuntime => "no_runtime",
		}
	}
}
impl Display for FallbackReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
