//! Raw credential output.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Token issued by a credential together with its hard expiry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
	/// Bearer token value; callers must avoid logging it.
	pub token: TokenSecret,
	/// Instant after which the issuer no longer accepts the token.
	pub expires_on: OffsetDateTime,
}
impl AccessToken {
	/// Wraps a token value and its expiry.
	pub fn new(token: impl Into<String>, expires_on: OffsetDateTime) -> Self {
		Self { token: TokenSecret::new(token), expires_on }
	}

	/// Returns `true` once `instant` reaches the expiry.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_on
	}
}
