// self
use crate::{
	_prelude::*,
	auth::TokenRequestContext,
	obs::{AcquisitionMode, FallbackReason},
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedAcquisition<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedAcquisition<F> = F;

/// A span builder used around credential calls.
#[derive(Clone, Debug)]
pub struct AcquisitionSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl AcquisitionSpan {
	/// Creates a new span tagged with the acquisition mode, stage, and context fingerprint.
	pub fn new(mode: AcquisitionMode, stage: &'static str, context: &TokenRequestContext) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"bearer_cache.acquisition",
				mode = mode.as_str(),
				stage,
				context = %context.fingerprint(),
				correlation_id = context.correlation_id(),
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (mode, stage, context);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedAcquisition<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Reports a background refresh that fell back to the previous token.
///
/// The failure never reaches callers, so this warning (and the fallback counter) is the only
/// trace it leaves.
pub fn record_background_fallback(
	context: &TokenRequestContext,
	reason: FallbackReason,
	error: &dyn Display,
) {
	super::count_background_fallback(reason);

	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			context = %context.fingerprint(),
			correlation_id = context.correlation_id(),
			reason = reason.as_str(),
			error = %error,
			"Background token refresh failed; continuing with the previous token."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (context, error);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn fallback_report_accepts_any_display() {
		let context = TokenRequestContext::new(["scope"]);

		record_background_fallback(&context, FallbackReason::Timeout, &"deadline elapsed");
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let context = TokenRequestContext::new(["scope"]).with_correlation_id("req-7");
		let span = AcquisitionSpan::new(AcquisitionMode::Synchronous, "instrument", &context);
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
