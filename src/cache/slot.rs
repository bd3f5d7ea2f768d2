//! Single-assignment acquisition cells shared by every caller of one acquisition cycle.

// crates.io
use async_lock::OnceCell;
// self
use crate::{_prelude::*, auth::CachedToken, error::CredentialError};

/// Final state of an acquisition.
#[derive(Clone, Debug)]
pub enum SlotOutcome {
	/// The credential produced a token.
	Ready(CachedToken),
	/// The credential failed; every waiter receives the same error.
	Failed(Arc<CredentialError>),
	/// The acquiring caller was cancelled (or dropped) before the credential answered.
	Cancelled,
}
impl SlotOutcome {
	/// Token held by a successful outcome.
	pub fn token(&self) -> Option<&CachedToken> {
		match self {
			Self::Ready(token) => Some(token),
			_ => None,
		}
	}

	/// Converts the outcome into the header value handed back to callers.
	pub fn into_header(self) -> Result<String> {
		match self {
			Self::Ready(token) => Ok(token.header_value().to_owned()),
			Self::Failed(err) => Err(Error::Credential(err)),
			Self::Cancelled => Err(Error::Cancelled),
		}
	}
}

/// Single-assignment future cell holding the result of one acquisition.
///
/// Clones share the cell. The outcome is written once and can be awaited cooperatively
/// ([`wait`](Self::wait)) or from a plain thread ([`wait_blocking`](Self::wait_blocking)).
#[derive(Clone, Debug, Default)]
pub struct AcquisitionSlot(Arc<OnceCell<SlotOutcome>>);
impl AcquisitionSlot {
	/// Returns `true` until an outcome has been written.
	pub fn is_pending(&self) -> bool {
		!self.0.is_initialized()
	}

	/// Outcome, if already written.
	pub fn outcome(&self) -> Option<&SlotOutcome> {
		self.0.get()
	}

	/// Token, if the slot completed successfully.
	pub fn token(&self) -> Option<&CachedToken> {
		self.outcome().and_then(SlotOutcome::token)
	}

	/// Suspends until the outcome is written.
	pub async fn wait(&self) -> &SlotOutcome {
		self.0.wait().await
	}

	/// Blocks the current thread until the outcome is written.
	///
	/// Must not be called from inside an async task.
	pub fn wait_blocking(&self) -> &SlotOutcome {
		self.0.wait_blocking()
	}

	/// Writes the outcome. Returns `false` if one was already written.
	pub(crate) fn resolve(&self, outcome: SlotOutcome) -> bool {
		self.0.set_blocking(outcome).is_ok()
	}

	/// Returns a guard that resolves the slot as [`SlotOutcome::Cancelled`] if it is dropped
	/// before [`ResolveGuard::complete`] runs.
	pub(crate) fn resolve_on_drop(&self) -> ResolveGuard<'_> {
		ResolveGuard { slot: self, armed: true }
	}
}

/// Drop guard ensuring an abandoned acquisition never leaves waiters suspended forever.
pub(crate) struct ResolveGuard<'a> {
	slot: &'a AcquisitionSlot,
	armed: bool,
}
impl ResolveGuard<'_> {
	pub(crate) fn complete(mut self, outcome: SlotOutcome) {
		self.armed = false;
		self.slot.resolve(outcome);
	}
}
impl Drop for ResolveGuard<'_> {
	fn drop(&mut self) {
		if self.armed {
			self.slot.resolve(SlotOutcome::Cancelled);
		}
	}
}
