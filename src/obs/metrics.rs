// self
use crate::obs::{AcquisitionMode, AcquisitionOutcome, FallbackReason};

/// Records an acquisition outcome via the global metrics recorder (when enabled).
pub fn record_acquisition_outcome(mode: AcquisitionMode, outcome: AcquisitionOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"bearer_cache_acquisition_total",
			"mode" => mode.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (mode, outcome);
	}
}

/// Counts background refreshes that kept serving the previous token.
pub fn count_background_fallback(reason: FallbackReason) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("bearer_cache_background_fallback_total", "reason" => reason.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = reason;
	}
}
