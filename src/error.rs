//! Crate-level error types shared by the cache, credentials, and the bearer policy.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The request targets a non-TLS endpoint; bearer tokens are never sent in the clear.
	#[error("Bearer token authentication is not permitted for non-TLS (`{scheme}`) endpoints.")]
	InsecureTransport {
		/// Scheme of the rejected request URI.
		scheme: String,
	},
	/// The credential failed to produce a token.
	///
	/// Every caller waiting on the same acquisition receives the same shared failure.
	#[error(transparent)]
	Credential(#[from] Arc<CredentialError>),
	/// The caller's cancellation token fired before a header was available.
	#[error("Token acquisition was cancelled.")]
	Cancelled,
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The wrapped HTTP transport failed.
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl From<CredentialError> for Error {
	fn from(e: CredentialError) -> Self {
		Self::Credential(Arc::new(e))
	}
}

/// Failures reported by [`TokenCredential`](crate::credential::TokenCredential) implementations.
#[derive(Debug, ThisError)]
pub enum CredentialError {
	/// The credential cannot issue tokens in the current environment.
	#[error("Credential is unavailable: {message}.")]
	Unavailable {
		/// Human-readable explanation.
		message: String,
	},
	/// The token endpoint rejected the client or the request.
	#[error("Token endpoint rejected the request: {reason}.")]
	AuthenticationFailed {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// No tokio runtime is reachable for blocking calls or background refreshes.
	#[error("No tokio runtime is available to drive token acquisition.")]
	RuntimeUnavailable,
	/// A blocking entry point was called from inside an async task.
	#[error("Blocking token acquisition cannot run inside an async task; use the async API.")]
	BlockingInAsyncContext,
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A header value could not be encoded.
	#[error("Header value contains characters that cannot be sent.")]
	InvalidHeader(#[from] oauth2::http::header::InvalidHeaderValue),
	/// Token endpoint URL cannot be parsed.
	#[error("Token endpoint URL is invalid.")]
	InvalidTokenEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Summary of the failure.
		message: String,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while sending the request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
