//! Single-flight bearer token cache with background renewal.
//!
//! [`TokenCache`] keeps one token for the most recent [`TokenRequestContext`]. Each call plans
//! under a short, synchronous lock and then executes outside it:
//!
//! - no token (or a different context, or an expired/failed one) → acquire synchronously; every
//!   concurrent caller waits on the same [`AcquisitionSlot`] instead of calling the credential
//!   again;
//! - a token past its refresh instant → spawn one detached background refresh and keep serving
//!   the current header until the refresh lands or the token hard-expires;
//! - otherwise → serve the current header.
//!
//! Background failures are swallowed (logged and counted) and the old token keeps serving until
//! it hard-expires. A failed refresh schedules the next background attempt
//! `background_retry_timeout` later; a timed-out one has already waited that long, so the next
//! call retries immediately. Once the old token expires callers block on a fresh acquisition.

mod metrics;
mod refresh;
pub mod slot;

pub use metrics::CacheMetrics;
pub use slot::{AcquisitionSlot, SlotOutcome};

// crates.io
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{CachedToken, TokenRequestContext},
	cache::refresh::BackgroundRefresh,
	clock::{Clock, SystemClock},
	credential::TokenCredential,
	error::ConfigError,
	obs::{self, AcquisitionMode, AcquisitionOutcome, AcquisitionSpan},
};

/// Tuning knobs for [`TokenCache`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCacheOptions {
	refresh_offset: Duration,
	background_retry_timeout: Duration,
}
impl TokenCacheOptions {
	/// Default lead time before expiry at which a background refresh starts.
	pub const DEFAULT_REFRESH_OFFSET: Duration = Duration::minutes(5);
	/// Default deadline for a background refresh, also used as its retry delay.
	pub const DEFAULT_BACKGROUND_RETRY_TIMEOUT: Duration = Duration::seconds(30);

	/// Overrides the refresh offset. Negative values are clamped to zero.
	pub fn with_refresh_offset(mut self, offset: Duration) -> Self {
		self.refresh_offset = offset.max(Duration::ZERO);

		self
	}

	/// Overrides the background deadline and retry delay. Negative values are clamped to zero.
	pub fn with_background_retry_timeout(mut self, timeout: Duration) -> Self {
		self.background_retry_timeout = timeout.max(Duration::ZERO);

		self
	}

	/// Lead time before expiry at which a background refresh starts.
	pub fn refresh_offset(&self) -> Duration {
		self.refresh_offset
	}

	/// Deadline for a background refresh and the delay before the next attempt after a timeout.
	pub fn background_retry_timeout(&self) -> Duration {
		self.background_retry_timeout
	}
}
impl Default for TokenCacheOptions {
	fn default() -> Self {
		Self {
			refresh_offset: Self::DEFAULT_REFRESH_OFFSET,
			background_retry_timeout: Self::DEFAULT_BACKGROUND_RETRY_TIMEOUT,
		}
	}
}

/// Shared cache handing out `Authorization` header values for one credential.
pub struct TokenCache {
	credential: Arc<dyn TokenCredential>,
	options: TokenCacheOptions,
	clock: Arc<dyn Clock>,
	runtime: Option<Handle>,
	metrics: Arc<CacheMetrics>,
	state: Mutex<CacheState>,
}
impl TokenCache {
	/// Creates a cache for `credential`.
	///
	/// When called inside a tokio runtime the current handle is captured for background
	/// refreshes and [`get_blocking`](Self::get_blocking); otherwise use
	/// [`with_runtime`](Self::with_runtime).
	pub fn new(credential: Arc<dyn TokenCredential>, options: TokenCacheOptions) -> Self {
		Self {
			credential,
			options,
			clock: Arc::new(SystemClock),
			runtime: Handle::try_current().ok(),
			metrics: Default::default(),
			state: Default::default(),
		}
	}

	/// Replaces the clock used for expiry and refresh decisions.
	pub fn with_clock(mut self, clock: impl Clock) -> Self {
		self.clock = Arc::new(clock);

		self
	}

	/// Uses `runtime` for background refreshes and blocking calls.
	///
	/// [`get_blocking`](Self::get_blocking) needs a multi-thread runtime, because the calling
	/// thread does not drive the runtime's timers.
	pub fn with_runtime(mut self, runtime: Handle) -> Self {
		self.runtime = Some(runtime);

		self
	}

	/// Options this cache was built with.
	pub fn options(&self) -> &TokenCacheOptions {
		&self.options
	}

	/// Counters describing how calls were served.
	pub fn metrics(&self) -> &CacheMetrics {
		&self.metrics
	}

	/// Context of the most recent acquisition cycle, if any.
	pub fn current_context(&self) -> Option<TokenRequestContext> {
		self.state.lock().context.clone()
	}

	/// Returns an `Authorization` header value usable right now for `context`.
	///
	/// Concurrent callers with equivalent contexts share one credential call. If the acquiring
	/// caller is cancelled, waiters start a fresh acquisition rather than failing.
	pub async fn get(
		&self,
		context: &TokenRequestContext,
		cancel: &CancellationToken,
	) -> Result<String> {
		loop {
			match self.plan(context) {
				Plan::Serve(token) => {
					self.metrics.record_hit();

					return Ok(token.header_value().to_owned());
				},
				Plan::Refresh { token, slot } => {
					self.metrics.record_hit();
					self.start_refresh(context, &token, slot, Handle::try_current().ok());

					return Ok(token.header_value().to_owned());
				},
				Plan::Acquire(slot) => return self.acquire(context, cancel, &slot).await,
				Plan::Wait(slot) => {
					self.metrics.record_wait();

					match wait_on(&slot, cancel).await? {
						SlotOutcome::Cancelled => continue,
						outcome => return outcome.into_header(),
					}
				},
			}
		}
	}

	/// Blocking counterpart of [`get`](Self::get) for callers outside async code.
	///
	/// Both waiting on the shared slot and driving the credential run on the cache's runtime,
	/// so `cancel` is honoured while the calling thread is blocked. Fails with [`ConfigError::RuntimeUnavailable`] when no
	/// runtime was captured or supplied and with [`ConfigError::BlockingInAsyncContext`] when
	/// called from inside a runtime.
	pub fn get_blocking(
		&self,
		context: &TokenRequestContext,
		cancel: &CancellationToken,
	) -> Result<String> {
		if Handle::try_current().is_ok() {
			return Err(ConfigError::BlockingInAsyncContext.into());
		}

		let runtime = self.runtime()?;

		loop {
			if cancel.is_cancelled() {
				return Err(Error::Cancelled);
			}

			match self.plan(context) {
				Plan::Serve(token) => {
					self.metrics.record_hit();

					return Ok(token.header_value().to_owned());
				},
				Plan::Refresh { token, slot } => {
					self.metrics.record_hit();
					self.start_refresh(context, &token, slot, Some(runtime.clone()));

					return Ok(token.header_value().to_owned());
				},
				Plan::Acquire(slot) =>
					return runtime.block_on(self.acquire(context, cancel, &slot)),
				Plan::Wait(slot) => {
					self.metrics.record_wait();

					match runtime.block_on(wait_on(&slot, cancel))? {
						SlotOutcome::Cancelled => continue,
						outcome => return outcome.into_header(),
					}
				},
			}
		}
	}

	pub(crate) fn runtime(&self) -> Result<Handle> {
		self.runtime.clone().ok_or_else(|| ConfigError::RuntimeUnavailable.into())
	}

	fn plan(&self, context: &TokenRequestContext) -> Plan {
		let mut state = self.state.lock();
		let equivalent =
			state.context.as_ref().is_some_and(|stored| stored.is_equivalent(context));
		let current = match state.current.clone() {
			Some(current) if equivalent => current,
			_ => {
				state.context = Some(context.clone());

				return Plan::Acquire(state.restart());
			},
		};

		if current.is_pending() {
			return Plan::Wait(current);
		}

		let now = self.clock.now();
		let current = match state.take_promotable(now) {
			Some(promoted) => promoted,
			None => current,
		};
		let token = match current.token() {
			Some(token) if !token.is_expired_at(now) => token.clone(),
			_ => return Plan::Acquire(state.restart()),
		};

		if token.needs_refresh_at(now) && state.background.is_none() {
			let slot = AcquisitionSlot::default();

			state.background = Some(slot.clone());

			return Plan::Refresh { token, slot };
		}

		Plan::Serve(token)
	}

	async fn acquire(
		&self,
		context: &TokenRequestContext,
		cancel: &CancellationToken,
		slot: &AcquisitionSlot,
	) -> Result<String> {
		const MODE: AcquisitionMode = AcquisitionMode::Synchronous;

		let guard = slot.resolve_on_drop();
		let span = AcquisitionSpan::new(MODE, "get", context);

		self.metrics.record_acquisition();
		obs::record_acquisition_outcome(MODE, AcquisitionOutcome::Attempt);

		let result = span
			.instrument(async {
				tokio::select! {
					biased;
					_ = cancel.cancelled() => None,
					result = self.credential.acquire(context, cancel) => Some(result),
				}
			})
			.await;
		let outcome = match result {
			Some(Ok(token)) => {
				obs::record_acquisition_outcome(MODE, AcquisitionOutcome::Success);

				SlotOutcome::Ready(CachedToken::from_access_token(
					&token,
					self.options.refresh_offset,
				))
			},
			Some(Err(err)) => {
				self.metrics.record_failure();
				obs::record_acquisition_outcome(MODE, AcquisitionOutcome::Failure);

				SlotOutcome::Failed(Arc::new(err))
			},
			None => {
				obs::record_acquisition_outcome(MODE, AcquisitionOutcome::Cancelled);

				SlotOutcome::Cancelled
			},
		};

		guard.complete(outcome.clone());

		outcome.into_header()
	}

	fn start_refresh(
		&self,
		context: &TokenRequestContext,
		previous: &CachedToken,
		slot: AcquisitionSlot,
		runtime: Option<Handle>,
	) {
		let refresh = BackgroundRefresh {
			credential: self.credential.clone(),
			context: context.clone(),
			previous: previous.clone(),
			slot,
			clock: self.clock.clone(),
			metrics: self.metrics.clone(),
			refresh_offset: self.options.refresh_offset,
			retry_timeout: self.options.background_retry_timeout,
		};

		refresh.start(runtime.or_else(|| self.runtime.clone()));
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache")
			.field("options", &self.options)
			.field("metrics", &self.metrics)
			.field("state", &*self.state.lock())
			.finish()
	}
}

/// Waits for `slot` unless `cancel` fires first.
async fn wait_on(slot: &AcquisitionSlot, cancel: &CancellationToken) -> Result<SlotOutcome> {
	tokio::select! {
		biased;
		_ = cancel.cancelled() => Err(Error::Cancelled),
		outcome = slot.wait() => Ok(outcome.clone()),
	}
}

#[derive(Debug, Default)]
struct CacheState {
	context: Option<TokenRequestContext>,
	current: Option<AcquisitionSlot>,
	background: Option<AcquisitionSlot>,
}
impl CacheState {
	/// Starts a new synchronous cycle, discarding any background refresh.
	fn restart(&mut self) -> AcquisitionSlot {
		let slot = AcquisitionSlot::default();

		self.current = Some(slot.clone());
		self.background = None;

		slot
	}

	/// Promotes a finished background refresh whose token is still valid at `now`.
	///
	/// A refresh abandoned before writing a token is dropped so the next call may retry.
	fn take_promotable(&mut self, now: OffsetDateTime) -> Option<AcquisitionSlot> {
		let promotable = match self.background.as_ref().and_then(AcquisitionSlot::outcome) {
			Some(SlotOutcome::Ready(token)) => !token.is_expired_at(now),
			Some(SlotOutcome::Cancelled) => {
				self.background = None;

				false
			},
			_ => false,
		};

		if !promotable {
			return None;
		}

		self.current = self.background.take();

		self.current.clone()
	}
}

enum Plan {
	Acquire(AcquisitionSlot),
	Wait(AcquisitionSlot),
	Refresh { token: CachedToken, slot: AcquisitionSlot },
	Serve(CachedToken),
}
