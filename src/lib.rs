//! Single-flight bearer token cache for HTTP pipelines: one credential call per acquisition
//! cycle, background renewal ahead of expiry, and request signing that answers claims challenges.
//!
//! The crate is organised around [`cache::TokenCache`], which hands out `Authorization` header
//! values for a [`auth::TokenRequestContext`], and [`policy::BearerAuthPolicy`], which attaches
//! those headers to outgoing requests and answers `401` claims challenges exactly once.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod clock;
pub mod credential;
pub mod error;
pub mod http;
pub mod obs;
pub mod policy;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for unit and integration tests; enabled via
	//! `cfg(test)` or the `test` crate feature.

	pub use std::{collections::VecDeque, sync::atomic::AtomicUsize};

	pub use tokio_util::sync::CancellationToken;

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::Ordering;
	// crates.io
	use oauth2::http::{
		HeaderValue, StatusCode,
		header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE},
	};
	// self
	use crate::{
		auth::{AccessToken, TokenRequestContext},
		cache::TokenCache,
		clock::Clock,
		credential::{CredentialFuture, TokenCredential},
		error::CredentialError,
		http::{HttpRequest, HttpResponse, HttpTransport, TransportFuture},
	};
	#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Polls until every background refresh started by `cache` has written its slot.
	pub async fn wait_for_background(cache: &TokenCache) {
		for _ in 0..5_000 {
			if cache.metrics().background_in_flight() == 0 {
				return;
			}

			tokio::time::sleep(std::time::Duration::from_millis(1)).await;
		}

		panic!("Background refresh did not settle within five seconds.");
	}

	/// One scripted credential response.
	#[derive(Clone, Debug)]
	pub enum ScriptStep {
		/// Issue `token`, valid for the given lifetime from the credential clock.
		Token(String, Duration),
		/// Fail with [`CredentialError::Unavailable`].
		Failure(String),
		/// Never complete.
		Pending,
	}

	/// Credential that replays a script and records every call it receives.
	///
	/// Once the script is exhausted it issues `token-<call number>` with the default lifetime.
	pub struct ScriptedCredential {
		clock: Arc<dyn Clock>,
		lifetime: Duration,
		delay: Option<std::time::Duration>,
		script: Mutex<VecDeque<ScriptStep>>,
		contexts: Mutex<Vec<TokenRequestContext>>,
		calls: AtomicUsize,
	}
	impl ScriptedCredential {
		/// Creates a credential issuing ten-minute tokens stamped by `clock`.
		pub fn new(clock: Arc<dyn Clock>) -> Self {
			Self {
				clock,
				lifetime: Duration::minutes(10),
				delay: None,
				script: Default::default(),
				contexts: Default::default(),
				calls: AtomicUsize::new(0),
			}
		}

		/// Sleeps for `delay` (tokio time) before answering each call.
		pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
			self.delay = Some(delay);

			self
		}

		/// Overrides the lifetime used once the script is exhausted.
		pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
			self.lifetime = lifetime;

			self
		}

		/// Appends a step to the script.
		pub fn push(&self, step: ScriptStep) -> &Self {
			self.script.lock().push_back(step);

			self
		}

		/// Appends a token step to the script.
		pub fn push_token(&self, token: &str, lifetime: Duration) -> &Self {
			self.push(ScriptStep::Token(token.into(), lifetime))
		}

		/// Number of acquisitions started so far.
		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}

		/// Contexts received so far, in call order.
		pub fn contexts(&self) -> Vec<TokenRequestContext> {
			self.contexts.lock().clone()
		}
	}
	impl TokenCredential for ScriptedCredential {
		fn acquire<'a>(
			&'a self,
			context: &'a TokenRequestContext,
			_cancel: &'a CancellationToken,
		) -> CredentialFuture<'a> {
			Box::pin(async move {
				let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

				self.contexts.lock().push(context.clone());

				let step = self.script.lock().pop_front();

				if let Some(delay) = self.delay {
					tokio::time::sleep(delay).await;
				}

				match step.unwrap_or_else(|| ScriptStep::Token(format!("token-{call}"), self.lifetime))
				{
					ScriptStep::Token(token, lifetime) =>
						Ok(AccessToken::new(token, self.clock.now() + lifetime)),
					ScriptStep::Failure(message) => Err(CredentialError::Unavailable { message }),
					ScriptStep::Pending => std::future::pending().await,
				}
			})
		}
	}

	/// Transport that records every request and replays queued responses.
	///
	/// Once the queue is empty every request is answered with an empty `200 OK`.
	#[derive(Default)]
	pub struct RecordingTransport {
		responses: Mutex<VecDeque<HttpResponse>>,
		requests: Mutex<Vec<HttpRequest>>,
	}
	impl RecordingTransport {
		/// Queues a response with `status` and an optional `WWW-Authenticate` value.
		pub fn respond(&self, status: StatusCode, challenge: Option<&str>) -> &Self {
			let mut response = HttpResponse::new(Vec::new());

			*response.status_mut() = status;

			if let Some(challenge) = challenge {
				response.headers_mut().insert(
					WWW_AUTHENTICATE,
					HeaderValue::from_str(challenge).expect("Challenge should be a valid header."),
				);
			}

			self.responses.lock().push_back(response);

			self
		}

		/// Queues a JSON response with `status` and `body`.
		pub fn respond_json(&self, status: StatusCode, body: &str) -> &Self {
			let mut response = HttpResponse::new(body.as_bytes().to_vec());

			*response.status_mut() = status;
			response
				.headers_mut()
				.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
			self.responses.lock().push_back(response);

			self
		}

		/// Request bodies, decoded as UTF-8, in send order.
		pub fn bodies(&self) -> Vec<String> {
			self.requests
				.lock()
				.iter()
				.map(|request| String::from_utf8_lossy(request.body()).into_owned())
				.collect()
		}

		/// Number of requests sent so far.
		pub fn sent(&self) -> usize {
			self.requests.lock().len()
		}

		/// `Authorization` header of each request, in send order.
		pub fn authorizations(&self) -> Vec<Option<String>> {
			self.requests
				.lock()
				.iter()
				.map(|request| {
					request
						.headers()
						.get(AUTHORIZATION)
						.and_then(|value| value.to_str().ok())
						.map(ToOwned::to_owned)
				})
				.collect()
		}
	}
	impl HttpTransport for RecordingTransport {
		fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
			Box::pin(async move {
				self.requests.lock().push(request);

				Ok(self.responses.lock().pop_front().unwrap_or_else(|| HttpResponse::new(Vec::new())))
			})
		}
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::{Hash, Hasher},
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use tokio_util::sync::CancellationToken;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
