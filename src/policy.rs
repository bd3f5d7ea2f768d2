//! Pipeline-facing bearer authentication.
//!
//! [`BearerAuthPolicy`] signs each outgoing request with a header from its [`TokenCache`], sends
//! it through the wrapped [`HttpTransport`], and answers a `401` authentication challenge by
//! reacquiring a token and resending exactly once. A [`ChallengeHandler`] decides the token
//! context of both attempts; [`ClaimsChallengeHandler`] (the default) answers Bearer claims
//! challenges and [`ScopeChallengeHandler`] learns service scopes from the challenge.

pub mod challenge;
pub mod handler;

pub use challenge::*;
pub use handler::*;

// crates.io
use oauth2::http::{
	HeaderName, HeaderValue, StatusCode,
	header::{AUTHORIZATION, HeaderMap, WWW_AUTHENTICATE},
};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::TokenRequestContext,
	cache::{TokenCache, TokenCacheOptions},
	credential::TokenCredential,
	error::ConfigError,
	http::{HttpRequest, HttpResponse, HttpTransport},
};

/// Header whose value becomes the correlation id of each token request.
pub const DEFAULT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// Attaches bearer tokens to requests and handles authentication challenges.
pub struct BearerAuthPolicy {
	cache: TokenCache,
	scopes: Vec<String>,
	transport: Arc<dyn HttpTransport>,
	request_id_header: HeaderName,
	handler: Arc<dyn ChallengeHandler>,
}
impl BearerAuthPolicy {
	/// Creates a policy with a default-configured cache for `credential`.
	pub fn new<I, S>(
		credential: Arc<dyn TokenCredential>,
		scopes: I,
		transport: Arc<dyn HttpTransport>,
	) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self::from_cache(TokenCache::new(credential, TokenCacheOptions::default()), scopes, transport)
	}

	/// Creates a policy around an existing cache.
	pub fn from_cache<I, S>(cache: TokenCache, scopes: I, transport: Arc<dyn HttpTransport>) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			cache,
			scopes: scopes.into_iter().map(Into::into).collect(),
			transport,
			request_id_header: HeaderName::from_static(DEFAULT_REQUEST_ID_HEADER),
			handler: Arc::new(ClaimsChallengeHandler),
		}
	}

	/// Reads correlation ids from `header` instead of [`DEFAULT_REQUEST_ID_HEADER`].
	pub fn with_request_id_header(mut self, header: HeaderName) -> Self {
		self.request_id_header = header;

		self
	}

	/// Replaces the default [`ClaimsChallengeHandler`].
	pub fn with_challenge_handler(mut self, handler: impl ChallengeHandler) -> Self {
		self.handler = Arc::new(handler);

		self
	}

	/// Cache backing this policy.
	pub fn cache(&self) -> &TokenCache {
		&self.cache
	}

	/// Scopes requested for every call.
	pub fn scopes(&self) -> &[String] {
		&self.scopes
	}

	/// Signs and sends `request`, retrying once when the challenge handler answers a `401`.
	///
	/// Non-`https` requests are rejected before any token is acquired. A `401` the handler
	/// declines, or a second `401` after the retry, is returned unchanged.
	pub async fn send(
		&self,
		request: HttpRequest,
		cancel: &CancellationToken,
	) -> Result<HttpResponse> {
		ensure_https(&request)?;

		let context = self.handler.before_request(&request, self.context_for(request.headers()));
		let header = self.cache.get(&context, cancel).await?;
		let retry = duplicate(&request);
		let response = self.transport.send(authorize(request, &header)?).await?;

		if response.status() != StatusCode::UNAUTHORIZED
			|| !response.headers().contains_key(WWW_AUTHENTICATE)
		{
			return Ok(response);
		}

		let Some(context) = self.handler.on_challenge(&retry, &response, &context) else {
			return Ok(response);
		};

		#[cfg(feature = "tracing")]
		tracing::debug!(
			context = %context.fingerprint(),
			correlation_id = context.correlation_id(),
			"Answering authentication challenge with a fresh token."
		);

		let header = self.cache.get(&context, cancel).await?;

		Ok(self.transport.send(authorize(retry, &header)?).await?)
	}

	/// Blocking counterpart of [`send`](Self::send), driven on the cache's runtime.
	pub fn send_blocking(
		&self,
		request: HttpRequest,
		cancel: &CancellationToken,
	) -> Result<HttpResponse> {
		if Handle::try_current().is_ok() {
			return Err(ConfigError::BlockingInAsyncContext.into());
		}

		self.cache.runtime()?.block_on(self.send(request, cancel))
	}

	fn context_for(&self, headers: &HeaderMap) -> TokenRequestContext {
		let context = TokenRequestContext::new(self.scopes.iter().cloned());

		match headers.get(&self.request_id_header).and_then(|value| value.to_str().ok()) {
			Some(id) => context.with_correlation_id(id),
			None => context,
		}
	}
}
impl Debug for BearerAuthPolicy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BearerAuthPolicy")
			.field("cache", &self.cache)
			.field("scopes", &self.scopes)
			.field("request_id_header", &self.request_id_header)
			.finish()
	}
}

fn ensure_https(request: &HttpRequest) -> Result<()> {
	match request.uri().scheme_str() {
		Some(scheme) if scheme.eq_ignore_ascii_case("https") => Ok(()),
		scheme => Err(Error::InsecureTransport { scheme: scheme.unwrap_or_default().to_owned() }),
	}
}

fn authorize(mut request: HttpRequest, header: &str) -> Result<HttpRequest> {
	let mut value = HeaderValue::from_str(header).map_err(ConfigError::from)?;

	value.set_sensitive(true);
	request.headers_mut().insert(AUTHORIZATION, value);

	Ok(request)
}

fn duplicate(request: &HttpRequest) -> HttpRequest {
	let mut copy = HttpRequest::new(request.body().clone());

	*copy.method_mut() = request.method().clone();
	*copy.uri_mut() = request.uri().clone();
	*copy.version_mut() = request.version();
	*copy.headers_mut() = request.headers().clone();

	copy
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::{Method, StatusCode};
	// self
	use super::*;
	use crate::{
		_preludet::{RecordingTransport, ScriptedCredential},
		clock::SystemClock,
	};

	const CLAIMS_B64: &str = "eyJhY2Nlc3NfdG9rZW4iOnsibmJmIjp7ImVzc2VudGlhbCI6dHJ1ZX19fQ==";
	const CLAIMS_JSON: &str = r#"{"access_token":{"nbf":{"essential":true}}}"#;

	fn request(uri: &str) -> HttpRequest {
		oauth2::http::Request::builder()
			.method(Method::GET)
			.uri(uri)
			.header(DEFAULT_REQUEST_ID_HEADER, "req-1")
			.body(Vec::new())
			.expect("Request should build.")
	}

	fn fixture() -> (Arc<ScriptedCredential>, Arc<RecordingTransport>, BearerAuthPolicy) {
		let credential = Arc::new(ScriptedCredential::new(Arc::new(SystemClock)));
		let transport = Arc::new(RecordingTransport::default());
		let policy = BearerAuthPolicy::new(
			credential.clone(),
			["https://management.azure.com/.default"],
			transport.clone(),
		);

		(credential, transport, policy)
	}

	#[tokio::test]
	async fn rejects_plain_http_before_acquiring() {
		let (credential, transport, policy) = fixture();
		let err = policy
			.send(request("http://example.com/resource"), &CancellationToken::new())
			.await
			.expect_err("Plain HTTP must be rejected.");

		assert!(matches!(err, Error::InsecureTransport { ref scheme } if scheme == "http"));
		assert_eq!(credential.calls(), 0);
		assert_eq!(transport.sent(), 0);
	}

	#[tokio::test]
	async fn signs_requests_with_scopes_and_correlation_id() {
		let (credential, transport, policy) = fixture();
		let response = policy
			.send(request("https://example.com/resource"), &CancellationToken::new())
			.await
			.expect("Request should succeed.");

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(transport.authorizations(), vec![Some("Bearer token-1".to_owned())]);

		let contexts = credential.contexts();

		assert_eq!(contexts[0].scopes(), ["https://management.azure.com/.default"]);
		assert_eq!(contexts[0].correlation_id(), Some("req-1"));
		assert_eq!(contexts[0].claims(), None);
	}

	#[tokio::test]
	async fn custom_request_id_header_is_used() {
		let (credential, _transport, policy) = fixture();
		let policy = policy.with_request_id_header(HeaderName::from_static("x-request-id"));
		let mut request = request("https://example.com/resource");

		request.headers_mut().insert("x-request-id", HeaderValue::from_static("custom"));
		policy.send(request, &CancellationToken::new()).await.expect("Request should succeed.");

		assert_eq!(credential.contexts()[0].correlation_id(), Some("custom"));
	}

	#[tokio::test]
	async fn claims_challenge_is_retried_once() {
		let (credential, transport, policy) = fixture();

		transport
			.respond(
				StatusCode::UNAUTHORIZED,
				Some(&format!(
					r#"Bearer authorization_uri="https://login.example.com/", error="insufficient_claims", claims="{CLAIMS_B64}""#
				)),
			)
			.respond(StatusCode::OK, None);

		let response = policy
			.send(request("https://example.com/resource"), &CancellationToken::new())
			.await
			.expect("Retried request should succeed.");

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(
			transport.authorizations(),
			vec![Some("Bearer token-1".to_owned()), Some("Bearer token-2".to_owned())]
		);
		assert_eq!(credential.contexts()[1].claims(), Some(CLAIMS_JSON));
		assert_eq!(credential.contexts()[1].correlation_id(), Some("req-1"));
	}

	#[tokio::test]
	async fn second_challenge_is_returned_as_is() {
		let (credential, transport, policy) = fixture();
		let challenge = format!(r#"Bearer claims="{CLAIMS_B64}""#);

		transport
			.respond(StatusCode::UNAUTHORIZED, Some(&challenge))
			.respond(StatusCode::UNAUTHORIZED, Some(&challenge));

		let response = policy
			.send(request("https://example.com/resource"), &CancellationToken::new())
			.await
			.expect("Transport should answer.");

		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(transport.sent(), 2);
		assert_eq!(credential.calls(), 2);
	}

	#[tokio::test]
	async fn unrecognised_challenges_return_the_original_response() {
		let (credential, transport, policy) = fixture();

		transport
			.respond(StatusCode::UNAUTHORIZED, Some(r#"Bearer error="invalid_token""#))
			.respond(StatusCode::UNAUTHORIZED, Some(r#"Bearer claims="%%%""#));

		for _ in 0..2 {
			let response = policy
				.send(request("https://example.com/resource"), &CancellationToken::new())
				.await
				.expect("Transport should answer.");

			assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
		}

		assert_eq!(transport.sent(), 2);
		assert_eq!(credential.calls(), 1);
	}

	#[test]
	fn send_blocking_uses_the_cache_runtime() {
		let runtime = tokio::runtime::Builder::new_multi_thread()
			.worker_threads(1)
			.enable_all()
			.build()
			.expect("Runtime should build.");
		let credential = Arc::new(ScriptedCredential::new(Arc::new(SystemClock)));
		let transport = Arc::new(RecordingTransport::default());
		let cache = TokenCache::new(credential.clone(), TokenCacheOptions::default())
			.with_runtime(runtime.handle().clone());
		let policy = BearerAuthPolicy::from_cache(cache, ["scope"], transport.clone());
		let response = policy
			.send_blocking(request("https://example.com/resource"), &CancellationToken::new())
			.expect("Blocking send should succeed.");

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(transport.authorizations(), vec![Some("Bearer token-1".to_owned())]);
	}

	#[tokio::test]
	async fn scope_handler_signs_later_requests_for_the_learned_scope() {
		let (credential, transport, policy) = fixture();
		let policy = policy.with_challenge_handler(ScopeChallengeHandler::default());

		transport.respond(
			StatusCode::UNAUTHORIZED,
			Some(r#"Bearer authorization="https://login.example.com/tenant", resource="https://vault.azure.net""#),
		);

		for _ in 0..2 {
			let response = policy
				.send(request("https://myvault.vault.azure.net/secrets/a"), &CancellationToken::new())
				.await
				.expect("Request should succeed.");

			assert_eq!(response.status(), StatusCode::OK);
		}

		let contexts = credential.contexts();

		assert_eq!(credential.calls(), 2);
		assert_eq!(contexts[1].scopes(), ["https://vault.azure.net/.default"]);
		assert_eq!(
			transport.authorizations(),
			vec![
				Some("Bearer token-1".to_owned()),
				Some("Bearer token-2".to_owned()),
				Some("Bearer token-2".to_owned()),
			]
		);
	}
}
