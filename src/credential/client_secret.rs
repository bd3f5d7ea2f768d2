//! OAuth 2.0 `client_credentials` credential backed by the `oauth2` crate.

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, HttpClientError, RequestTokenError, Scope, TokenResponse,
	TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenRequestContext, TokenSecret},
	credential::{CredentialFuture, TokenCredential},
	error::{ConfigError, CredentialError, TransientError, TransportError},
	http::{HttpTransport, TransportClient},
};

/// Form parameter used to forward a decoded claims challenge to the token endpoint.
pub const CLAIMS_PARAMETER: &str = "claims";

/// How the client secret is presented to the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientAuthMethod {
	/// HTTP Basic authentication header.
	#[default]
	ClientSecretBasic,
	/// `client_id` + `client_secret` form fields.
	ClientSecretPost,
}

/// Confidential client that requests tokens with the `client_credentials` grant.
///
/// Scopes from the [`TokenRequestContext`] are sent in order; a claims challenge is forwarded
/// verbatim in the `claims` form parameter.
pub struct ClientSecretCredential {
	token_endpoint: Url,
	client_id: String,
	client_secret: TokenSecret,
	auth_method: ClientAuthMethod,
	transport: Arc<dyn HttpTransport>,
}
impl ClientSecretCredential {
	/// Creates a credential that reaches `token_endpoint` through `transport`.
	pub fn with_transport(
		token_endpoint: Url,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		transport: Arc<dyn HttpTransport>,
	) -> Self {
		Self {
			token_endpoint,
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			auth_method: ClientAuthMethod::default(),
			transport,
		}
	}

	/// Creates a credential using a redirect-free reqwest transport.
	#[cfg(feature = "reqwest")]
	pub fn new(
		token_endpoint: Url,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Result<Self> {
		let transport = crate::http::ReqwestHttpClient::new()?;

		Ok(Self::with_transport(token_endpoint, client_id, client_secret, Arc::new(transport)))
	}

	/// Overrides how the client secret is presented.
	pub fn with_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.auth_method = method;

		self
	}

	/// Token endpoint the credential posts to.
	pub fn token_endpoint(&self) -> &Url {
		&self.token_endpoint
	}

	async fn request_token(
		&self,
		context: &TokenRequestContext,
	) -> Result<AccessToken, CredentialError> {
		let token_url = TokenUrl::new(self.token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidTokenEndpoint { source })?;
		let mut oauth_client = BasicClient::new(ClientId::new(self.client_id.clone()))
			.set_client_secret(ClientSecret::new(self.client_secret.expose().to_owned()))
			.set_token_uri(token_url);

		if matches!(self.auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		let http_client = TransportClient::new(self.transport.clone());
		let mut request = oauth_client.exchange_client_credentials();

		for scope in context {
			request = request.add_scope(Scope::new(scope.to_owned()));
		}
		if let Some(claims) = context.claims() {
			request = request.add_extra_param(CLAIMS_PARAMETER, claims.to_owned());
		}

		let response = request.request_async(&http_client).await.map_err(map_request_error)?;

		map_token_response(response)
	}
}
impl TokenCredential for ClientSecretCredential {
	fn acquire<'a>(
		&'a self,
		context: &'a TokenRequestContext,
		_cancel: &'a CancellationToken,
	) -> CredentialFuture<'a> {
		Box::pin(self.request_token(context))
	}
}
impl Debug for ClientSecretCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientSecretCredential")
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.field("auth_method", &self.auth_method)
			.finish()
	}
}

fn map_token_response(response: BasicTokenResponse) -> Result<AccessToken, CredentialError> {
	let expires_in = response.expires_in().ok_or(ConfigError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(ConfigError::NonPositiveExpiresIn.into());
	}

	let expires_on = OffsetDateTime::now_utc()
		.checked_add(Duration::seconds(expires_in))
		.ok_or(ConfigError::ExpiresInOutOfRange)?;

	Ok(AccessToken::new(response.access_token().secret().to_owned(), expires_on))
}

fn map_request_error(
	err: BasicRequestTokenError<HttpClientError<TransportError>>,
) -> CredentialError {
	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response),
		RequestTokenError::Request(error) => map_transport_error(error),
		RequestTokenError::Parse(source, _body) =>
			TransientError::TokenResponseParse { source }.into(),
		RequestTokenError::Other(message) => TransientError::TokenEndpoint { message }.into(),
	}
}

fn map_server_response_error(response: BasicErrorResponse) -> CredentialError {
	let reason = match response.error_description() {
		Some(description) => format!("{} ({description})", response.error().as_ref()),
		None => response.error().as_ref().to_owned(),
	};

	CredentialError::AuthenticationFailed { reason }
}

fn map_transport_error(err: HttpClientError<TransportError>) -> CredentialError {
	match err {
		HttpClientError::Reqwest(inner) => CredentialError::Transport(*inner),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::TokenEndpoint { message }.into(),
		_ => TransientError::TokenEndpoint {
			message: "HTTP client error occurred while calling the token endpoint".into(),
		}
		.into(),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::{
		AccessToken as OAuthAccessToken, EmptyExtraTokenFields, StandardErrorResponse,
		basic::{BasicErrorResponseType, BasicTokenType},
		http::StatusCode,
	};
	// self
	use super::*;
	use crate::_preludet::RecordingTransport;

	#[test]
	fn token_response_requires_positive_expiry() {
		let mut response = BasicTokenResponse::new(
			OAuthAccessToken::new("issued".into()),
			BasicTokenType::Bearer,
			EmptyExtraTokenFields {},
		);

		assert!(matches!(
			map_token_response(response.clone()),
			Err(CredentialError::Config(ConfigError::MissingExpiresIn))
		));

		response.set_expires_in(Some(&std::time::Duration::from_secs(0)));

		assert!(matches!(
			map_token_response(response.clone()),
			Err(CredentialError::Config(ConfigError::NonPositiveExpiresIn))
		));

		response.set_expires_in(Some(&std::time::Duration::from_secs(3600)));

		let token = map_token_response(response).expect("Positive expiry should map to a token.");

		assert_eq!(token.token.expose(), "issued");
		assert!(token.expires_on > OffsetDateTime::now_utc() + Duration::minutes(59));
	}

	#[test]
	fn server_errors_keep_the_description() {
		let response = StandardErrorResponse::new(
			BasicErrorResponseType::InvalidClient,
			Some("bad secret".into()),
			None,
		);
		let err = map_server_response_error(response);

		assert_eq!(
			err.to_string(),
			"Token endpoint rejected the request: invalid_client (bad secret)."
		);
	}

	const TOKEN_JSON: &str =
		"{\"access_token\":\"issued\",\"token_type\":\"bearer\",\"expires_in\":3600}";

	fn credential(transport: &Arc<RecordingTransport>) -> ClientSecretCredential {
		ClientSecretCredential::with_transport(
			Url::parse("https://login.example.com/tenant/oauth2/v2.0/token")
				.expect("Token URL should parse."),
			"client",
			"hunter2",
			transport.clone(),
		)
	}

	#[test]
	fn debug_redacts_client_secret() {
		let rendered = format!("{:?}", credential(&Arc::new(RecordingTransport::default())));

		assert!(rendered.contains("<redacted>"));
		assert!(!rendered.contains("hunter2"));
	}

	#[tokio::test]
	async fn posts_scopes_and_claims_as_form_fields() {
		let transport = Arc::new(RecordingTransport::default());

		transport.respond_json(StatusCode::OK, TOKEN_JSON);

		let context = TokenRequestContext::new(["api.read", "api.write"]).with_claims(r#"{"a":1}"#);
		let token = credential(&transport)
			.acquire(&context, &CancellationToken::new())
			.await
			.expect("Token request should succeed.");
		let body = &transport.bodies()[0];

		assert_eq!(token.token.expose(), "issued");
		assert!(body.contains("grant_type=client_credentials"));
		assert!(body.contains("scope=api.read+api.write"));
		assert!(body.contains("claims=%7B%22a%22%3A1%7D"));
		assert!(!body.contains("client_secret"), "Basic auth keeps the secret out of the body.");
		assert!(
			transport.authorizations()[0].as_deref().is_some_and(|value| value.starts_with("Basic "))
		);
	}

	#[tokio::test]
	async fn client_secret_post_moves_credentials_into_the_body() {
		let transport = Arc::new(RecordingTransport::default());

		transport.respond_json(StatusCode::OK, TOKEN_JSON);
		credential(&transport)
			.with_auth_method(ClientAuthMethod::ClientSecretPost)
			.acquire(&TokenRequestContext::new(["api.read"]), &CancellationToken::new())
			.await
			.expect("Token request should succeed.");

		let body = &transport.bodies()[0];

		assert!(body.contains("client_id=client"));
		assert!(body.contains("client_secret=hunter2"));
		assert!(!body.contains("claims="));
		assert_eq!(transport.authorizations()[0], None);
	}

	#[tokio::test]
	async fn malformed_token_json_is_transient() {
		let transport = Arc::new(RecordingTransport::default());

		transport.respond_json(StatusCode::OK, "{\"token_type\":\"bearer\"}");

		let err = credential(&transport)
			.acquire(&TokenRequestContext::new(["api.read"]), &CancellationToken::new())
			.await
			.expect_err("A response without access_token must fail.");

		assert!(matches!(err, CredentialError::Transient(TransientError::TokenResponseParse { .. })));
	}
}
