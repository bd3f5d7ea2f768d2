//! Header value plus refresh schedule held by the cache.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, REDACTED},
};

/// Authorization scheme prefix written in front of every token.
pub const BEARER_SCHEME: &str = "Bearer";

/// Formatted `Authorization` header value with its expiry and refresh schedule.
///
/// Values are immutable once built. The cache replaces them wholesale, so a caller that has
/// observed one value never observes an older one for the same context afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedToken {
	header_value: String,
	expires_on: OffsetDateTime,
	refresh_on: OffsetDateTime,
}
impl CachedToken {
	/// Formats `token` as a bearer header that becomes due for refresh `refresh_offset` before
	/// it expires.
	pub fn from_access_token(token: &AccessToken, refresh_offset: Duration) -> Self {
		Self {
			header_value: token.token.bearer_header(),
			expires_on: token.expires_on,
			refresh_on: token.expires_on - refresh_offset,
		}
	}

	/// Header value, e.g. `Bearer eyJ0eXAi...`. Callers must avoid logging it.
	pub fn header_value(&self) -> &str {
		&self.header_value
	}

	/// Hard expiry instant.
	pub fn expires_on(&self) -> OffsetDateTime {
		self.expires_on
	}

	/// Instant from which a background renewal should be attempted.
	pub fn refresh_on(&self) -> OffsetDateTime {
		self.refresh_on
	}

	/// Returns `true` once `instant` reaches the hard expiry.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_on
	}

	/// Returns `true` once `instant` reaches the refresh instant.
	pub fn needs_refresh_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.refresh_on
	}

	/// Keeps this header and expiry but schedules the next renewal attempt `retry_delay` after
	/// `now`.
	pub(crate) fn deferred_fallback(&self, now: OffsetDateTime, retry_delay: Duration) -> Self {
		Self {
			header_value: self.header_value.clone(),
			expires_on: self.expires_on,
			refresh_on: now + retry_delay,
		}
	}
}
impl Debug for CachedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedToken")
			.field("header_value", &REDACTED)
			.field("expires_on", &self.expires_on)
			.field("refresh_on", &self.refresh_on)
			.finish()
	}
}
