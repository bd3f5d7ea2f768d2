//! Token credential contracts and built-in credentials.
//!
//! The cache treats a credential as an opaque, possibly slow, possibly failing async operation
//! that turns a [`TokenRequestContext`] into an [`AccessToken`]. Implementations are shared
//! behind `Arc<dyn TokenCredential>` and are invoked both from caller tasks and from detached
//! background refresh tasks, so their futures must be `Send`.

pub mod client_secret;
pub mod static_token;

pub use client_secret::*;
pub use static_token::*;

// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenRequestContext},
	error::CredentialError,
};

/// Boxed future returned by [`TokenCredential::acquire`].
pub type CredentialFuture<'a> =
	Pin<Box<dyn Future<Output = Result<AccessToken, CredentialError>> + 'a + Send>>;

/// Source of bearer tokens.
pub trait TokenCredential
where
	Self: Send + Sync,
{
	/// Requests a token for `context`.
	///
	/// `cancel` fires when the caller gives up (or a background refresh times out).
	/// The cache stops polling the future at that point, so honoring it is optional.
	fn acquire<'a>(
		&'a self,
		context: &'a TokenRequestContext,
		cancel: &'a CancellationToken,
	) -> CredentialFuture<'a>;
}
