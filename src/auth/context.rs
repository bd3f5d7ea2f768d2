//! Immutable description of what a token is being requested for.

// std
use std::slice::Iter;
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Scopes, claims challenge, and correlation id for one token request.
///
/// Two contexts are *equivalent* when their scope sequences match element by element (order is
/// significant) and their claims match, where an absent claims value only matches another absent
/// one. The correlation id is carried for diagnostics and never affects equivalence, so
/// [`PartialEq`] and [`Hash`] ignore it as well.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TokenRequestContext {
	scopes: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	claims: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	correlation_id: Option<String>,
}
impl TokenRequestContext {
	/// Creates a context for the provided scopes, preserving their order.
	pub fn new<I, S>(scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { scopes: scopes.into_iter().map(Into::into).collect(), ..Default::default() }
	}

	/// Returns a copy requesting `scopes` instead, keeping claims and correlation id.
	pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Returns a copy carrying the provided claims challenge.
	pub fn with_claims(mut self, claims: impl Into<String>) -> Self {
		self.claims = Some(claims.into());

		self
	}

	/// Returns a copy carrying the provided correlation id.
	pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
		self.correlation_id = Some(correlation_id.into());

		self
	}

	/// Requested scopes in caller order.
	pub fn scopes(&self) -> &[String] {
		&self.scopes
	}

	/// Iterator over the requested scopes.
	pub fn iter(&self) -> Iter<'_, String> {
		self.scopes.iter()
	}

	/// Decoded claims challenge, if any.
	pub fn claims(&self) -> Option<&str> {
		self.claims.as_deref()
	}

	/// Correlation id of the request that needs the token, if any.
	pub fn correlation_id(&self) -> Option<&str> {
		self.correlation_id.as_deref()
	}

	/// Returns `true` when a token issued for `other` may be served for `self`.
	pub fn is_equivalent(&self, other: &Self) -> bool {
		self.scopes == other.scopes && self.claims == other.claims
	}

	/// Stable, log-safe fingerprint of the equivalence-relevant fields.
	///
	/// The value is a base64 (no padding) SHA-256 digest over the scopes and claims, so two
	/// equivalent contexts always share a fingerprint and raw claims never reach log sinks.
	pub fn fingerprint(&self) -> String {
		let mut hasher = Sha256::new();

		for scope in &self.scopes {
			hasher.update(scope.as_bytes());
			hasher.update([0]);
		}

		match &self.claims {
			Some(claims) => {
				hasher.update([1]);
				hasher.update(claims.as_bytes());
			},
			None => hasher.update([2]),
		}

		STANDARD_NO_PAD.encode(hasher.finalize())
	}
}
impl PartialEq for TokenRequestContext {
	fn eq(&self, other: &Self) -> bool {
		self.is_equivalent(other)
	}
}
impl Eq for TokenRequestContext {}
impl Hash for TokenRequestContext {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.scopes.hash(state);
		self.claims.hash(state);
	}
}
impl<'a> IntoIterator for &'a TokenRequestContext {
	type IntoIter = Iter<'a, String>;
	type Item = &'a String;

	fn into_iter(self) -> Self::IntoIter {
		self.scopes.iter()
	}
}
