//! Signs requests with client-credentials tokens from a mock token endpoint and shows how the
//! cache answers repeated calls without going back to the credential.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use bearer_cache::{
	auth::TokenRequestContext,
	cache::{TokenCache, TokenCacheOptions},
	credential::ClientSecretCredential,
	http::ReqwestHttpClient,
	reqwest::Client,
	CancellationToken,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":900}",
			);
		})
		.await;
	let transport = ReqwestHttpClient::with_client(
		Client::builder().redirect(bearer_cache::reqwest::redirect::Policy::none()).build()?,
	);
	let credential = ClientSecretCredential::with_transport(
		Url::parse(&server.url("/token"))?,
		"demo-client",
		"super-secret",
		Arc::new(transport),
	);
	let cache = TokenCache::new(Arc::new(credential), TokenCacheOptions::default());
	let context = TokenRequestContext::new(["api://demo/.default"]);
	let cancel = CancellationToken::new();

	for attempt in 1..=3 {
		let header = cache.get(&context, &cancel).await?;

		println!("Attempt {attempt}: {} characters of Authorization header.", header.len());
	}

	println!(
		"Credential calls: {}, cache hits: {}.",
		cache.metrics().acquisitions(),
		cache.metrics().hits()
	);

	token_mock.assert_async().await;

	Ok(())
}
