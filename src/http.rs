//! Transport primitives for the bearer policy and the built-in credentials.
//!
//! [`HttpTransport`] is the crate's only dependency on an HTTP stack: the policy hands each
//! signed request to it, and [`ClientSecretCredential`](crate::credential::ClientSecretCredential)
//! reaches the token endpoint through it. Requests and responses use the `http` types re-exported
//! by `oauth2`, so custom transports can be plugged in without pulling in reqwest.

pub use oauth2::{HttpRequest, HttpResponse};

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError};
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Sends fully built HTTP requests.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by the
/// policy and by credentials behind an `Arc`. The transport must not follow redirects on its
/// own; a redirected request would otherwise carry the bearer header to another origin.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and returns the complete response.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Configure any custom [`ReqwestClient`] to disable redirect following, because the policy
/// attaches bearer tokens before the request leaves and token endpoints answer directly.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client with redirect following disabled.
	pub fn new() -> Result<Self> {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(crate::error::ConfigError::http_client_build)?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let request = reqwest::Request::try_from(request)?;
			let response = client.execute(request).await?;
			let status = response.status();
			let version = response.version();
			let headers = response.headers().to_owned();
			let mut response_new = HttpResponse::new(response.bytes().await?.to_vec());

			*response_new.status_mut() = status;
			*response_new.version_mut() = version;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Adapter exposing an [`HttpTransport`] as an `oauth2` [`AsyncHttpClient`].
#[derive(Clone)]
pub(crate) struct TransportClient(Arc<dyn HttpTransport>);
impl TransportClient {
	pub(crate) fn new(transport: Arc<dyn HttpTransport>) -> Self {
		Self(transport)
	}
}
impl<'c> AsyncHttpClient<'c> for TransportClient {
	type Error = HttpClientError<TransportError>;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.0.send(request).await.map_err(|err| HttpClientError::Reqwest(Box::new(err)))
		})
	}
}
