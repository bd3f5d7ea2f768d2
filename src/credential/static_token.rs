//! Fixed-token credential for local tooling and tests.

// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenRequestContext},
	clock::{Clock, SystemClock},
	credential::{CredentialFuture, TokenCredential},
	error::CredentialError,
};

/// Credential that always returns the same token, ignoring scopes and claims.
///
/// Once the token has expired every call fails with [`CredentialError::Unavailable`].
#[derive(Clone)]
pub struct StaticTokenCredential {
	token: AccessToken,
	clock: Arc<dyn Clock>,
}
impl StaticTokenCredential {
	/// Wraps a pre-issued token, judged against the system clock.
	pub fn new(token: AccessToken) -> Self {
		Self { token, clock: Arc::new(SystemClock) }
	}

	/// Judges expiry against `clock` instead of the system clock.
	pub fn with_clock(mut self, clock: impl Clock) -> Self {
		self.clock = Arc::new(clock);

		self
	}
}
impl Debug for StaticTokenCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StaticTokenCredential").field("token", &self.token).finish()
	}
}
impl TokenCredential for StaticTokenCredential {
	fn acquire<'a>(
		&'a self,
		_context: &'a TokenRequestContext,
		_cancel: &'a CancellationToken,
	) -> CredentialFuture<'a> {
		Box::pin(async move {
			if self.token.is_expired_at(self.clock.now()) {
				return Err(CredentialError::Unavailable {
					message: "the static token has expired".into(),
				});
			}

			Ok(self.token.clone())
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::clock::ManualClock;

	#[tokio::test]
	async fn serves_until_expiry() {
		let context = TokenRequestContext::new(["scope"]);
		let cancel = CancellationToken::new();
		let live = StaticTokenCredential::new(AccessToken::new(
			"static",
			OffsetDateTime::now_utc() + Duration::hours(1),
		));
		let token = live.acquire(&context, &cancel).await.expect("Live token should be served.");

		assert_eq!(token.token.expose(), "static");

		let stale = StaticTokenCredential::new(AccessToken::new(
			"static",
			OffsetDateTime::now_utc() - Duration::seconds(1),
		));
		let err = stale.acquire(&context, &cancel).await.expect_err("Expired token must fail.");

		assert!(matches!(err, CredentialError::Unavailable { .. }));
	}

	#[tokio::test]
	async fn expiry_follows_the_injected_clock() {
		let context = TokenRequestContext::new(["scope"]);
		let cancel = CancellationToken::new();
		let clock = ManualClock::new(macros::datetime!(2025-01-01 00:00 UTC));
		let credential = StaticTokenCredential::new(AccessToken::new(
			"static",
			macros::datetime!(2025-01-01 00:10 UTC),
		))
		.with_clock(clock.clone());

		credential.acquire(&context, &cancel).await.expect("Token is live at the start.");
		clock.advance(Duration::minutes(10));

		let err = credential.acquire(&context, &cancel).await.expect_err("Token has expired.");

		assert!(matches!(err, CredentialError::Unavailable { .. }));
	}
}
