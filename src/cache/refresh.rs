// crates.io
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{CachedToken, TokenRequestContext},
	cache::{
		CacheMetrics,
		slot::{AcquisitionSlot, SlotOutcome},
	},
	clock::Clock,
	credential::TokenCredential,
	error::ConfigError,
	obs::{self, AcquisitionMode, AcquisitionOutcome, AcquisitionSpan, FallbackReason},
};

const MODE: AcquisitionMode = AcquisitionMode::Background;

/// Detached renewal of a token that is due for refresh but still valid.
///
/// The task owns everything it touches, writes its slot exactly once, and is never joined.
/// Failures never reach callers: the slot receives a fallback that keeps the previous header and
/// expiry and only moves the next refresh instant. Dropping the task before it writes the slot
/// (for example when the runtime shuts down) resolves the slot as cancelled, which the cache
/// discards on its next plan.
pub(crate) struct BackgroundRefresh {
	pub(crate) credential: Arc<dyn TokenCredential>,
	pub(crate) context: TokenRequestContext,
	pub(crate) previous: CachedToken,
	pub(crate) slot: AcquisitionSlot,
	pub(crate) clock: Arc<dyn Clock>,
	pub(crate) metrics: Arc<CacheMetrics>,
	pub(crate) refresh_offset: Duration,
	pub(crate) retry_timeout: Duration,
}
impl BackgroundRefresh {
	/// Starts the refresh on `runtime`, or settles it immediately when no runtime is reachable.
	pub(crate) fn start(self, runtime: Option<Handle>) {
		self.metrics.record_background_started();

		match runtime {
			Some(runtime) => {
				runtime.spawn(self.run());
			},
			None => {
				let fallback = self.previous.deferred_fallback(self.clock.now(), self.retry_timeout);

				self.fall_back(FallbackReason::NoRuntime, &ConfigError::RuntimeUnavailable, fallback);
			},
		}
	}

	async fn run(self) {
		let cancel = CancellationToken::new();
		let span = AcquisitionSpan::new(MODE, "background_refresh", &self.context);

		obs::record_acquisition_outcome(MODE, AcquisitionOutcome::Attempt);

		let result = span
			.instrument(tokio::time::timeout(
				self.retry_timeout.unsigned_abs(),
				self.credential.acquire(&self.context, &cancel),
			))
			.await;
		let now = self.clock.now();

		match result {
			Ok(Ok(token)) => {
				self.slot.resolve(SlotOutcome::Ready(CachedToken::from_access_token(
					&token,
					self.refresh_offset,
				)));
				self.metrics.record_background_succeeded();
				obs::record_acquisition_outcome(MODE, AcquisitionOutcome::Success);
			},
			Ok(Err(err)) => {
				let fallback = self.previous.deferred_fallback(now, self.retry_timeout);

				self.fall_back(FallbackReason::Failure, &err, fallback);
			},
			Err(elapsed) => {
				cancel.cancel();

				let fallback = self.previous.deferred_fallback(now, Duration::ZERO);

				self.fall_back(FallbackReason::Timeout, &elapsed, fallback);
			},
		}
	}

	fn fall_back(&self, reason: FallbackReason, error: &dyn Display, fallback: CachedToken) {
		obs::record_background_fallback(&self.context, reason, error);
		self.slot.resolve(SlotOutcome::Ready(fallback));
		self.metrics.record_background_fallback();
		obs::record_acquisition_outcome(MODE, AcquisitionOutcome::Failure);
	}
}
impl Drop for BackgroundRefresh {
	fn drop(&mut self) {
		if self.slot.resolve(SlotOutcome::Cancelled) {
			self.metrics.record_background_abandoned();
			obs::record_acquisition_outcome(MODE, AcquisitionOutcome::Cancelled);
		}
	}
}
