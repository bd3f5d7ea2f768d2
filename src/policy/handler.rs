//! Hooks deciding which token signs a request and how a `401` challenge is answered.

// std
use std::collections::HashMap;
// self
use crate::{
	_prelude::*,
	auth::{BEARER_SCHEME, TokenRequestContext},
	http::{HttpRequest, HttpResponse},
	policy::challenge::{self, Challenge},
};

/// Suffix turning a challenge `resource` into the scope requested for it.
pub const DEFAULT_SCOPE_SUFFIX: &str = "/.default";

const HTTPS_PORT: u16 = 443;

/// Chooses the token context for each attempt made by a
/// [`BearerAuthPolicy`](super::BearerAuthPolicy).
///
/// The policy consults [`on_challenge`](Self::on_challenge) only for a `401` response that
/// carries a `WWW-Authenticate` header, and resends at most once whatever the handler answers.
pub trait ChallengeHandler
where
	Self: 'static + Send + Sync,
{
	/// Context used to sign the first attempt.
	///
	/// `context` holds the policy scopes and the request's correlation id; the default keeps it.
	fn before_request(
		&self,
		request: &HttpRequest,
		context: TokenRequestContext,
	) -> TokenRequestContext {
		let _ = request;

		context
	}

	/// Context to resend `request` with, or `None` to hand `response` back unchanged.
	///
	/// `context` is the one the rejected attempt was signed with.
	fn on_challenge(
		&self,
		request: &HttpRequest,
		response: &HttpResponse,
		context: &TokenRequestContext,
	) -> Option<TokenRequestContext>;
}

/// Answers Bearer claims challenges with a token requested for the decoded claims.
///
/// Policies use this handler unless configured otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClaimsChallengeHandler;
impl ChallengeHandler for ClaimsChallengeHandler {
	fn on_challenge(
		&self,
		_request: &HttpRequest,
		response: &HttpResponse,
		context: &TokenRequestContext,
	) -> Option<TokenRequestContext> {
		challenge::claims_from_response(response).map(|claims| context.clone().with_claims(claims))
	}
}

/// Learns the scope a service expects from its Bearer challenges.
///
/// Services that name their token audience in the challenge, as `scope="..."` or as
/// `resource="..."` (requested as `<resource>/.default`), are answered with a token for that
/// scope. The scope is remembered per request authority so later requests to the same host are
/// signed for it up front. Claims carried by the same challenge are forwarded as well.
#[derive(Debug, Default)]
pub struct ScopeChallengeHandler {
	scopes: Mutex<HashMap<String, String>>,
}
impl ScopeChallengeHandler {
	/// Scope learned for `authority`, written as `host:port` (port 443 when the URI omits it).
	pub fn scope_for(&self, authority: &str) -> Option<String> {
		self.scopes.lock().get(authority).cloned()
	}
}
impl ChallengeHandler for ScopeChallengeHandler {
	fn before_request(
		&self,
		request: &HttpRequest,
		context: TokenRequestContext,
	) -> TokenRequestContext {
		match authority(request).and_then(|authority| self.scope_for(&authority)) {
			Some(scope) => context.with_scopes([scope]),
			None => context,
		}
	}

	fn on_challenge(
		&self,
		request: &HttpRequest,
		response: &HttpResponse,
		context: &TokenRequestContext,
	) -> Option<TokenRequestContext> {
		let challenges = challenge::challenges_from_response(response);
		let bearer = challenges.iter().find(|challenge| challenge.is_scheme(BEARER_SCHEME))?;
		let mut next = context.clone();

		if let Some(scope) = challenged_scope(bearer) {
			if let Some(authority) = authority(request) {
				self.scopes.lock().insert(authority, scope.clone());
			}

			next = next.with_scopes([scope]);
		}
		if let Some(claims) = bearer.claims() {
			next = next.with_claims(claims);
		}

		// Resending with an equivalent context would only replay the rejected token.
		if next.is_equivalent(context) { None } else { Some(next) }
	}
}

fn challenged_scope(challenge: &Challenge) -> Option<String> {
	match (challenge.scope(), challenge.resource()) {
		(Some(scope), _) => Some(scope.to_owned()),
		(None, Some(resource)) =>
			Some(format!("{}{DEFAULT_SCOPE_SUFFIX}", resource.trim_end_matches('/'))),
		(None, None) => None,
	}
}

fn authority(request: &HttpRequest) -> Option<String> {
	let uri = request.uri();
	let host = uri.host()?;

	Some(format!("{host}:{}", uri.port_u16().unwrap_or(HTTPS_PORT)))
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE};
	// self
	use super::*;

	const CLAIMS_B64: &str = "eyJhY2Nlc3NfdG9rZW4iOnsibmJmIjp7ImVzc2VudGlhbCI6dHJ1ZX19fQ==";
	const CLAIMS_JSON: &str = r#"{"access_token":{"nbf":{"essential":true}}}"#;

	fn request(uri: &str) -> HttpRequest {
		oauth2::http::Request::builder().uri(uri).body(Vec::new()).expect("Request should build.")
	}

	fn unauthorized(challenge: &str) -> HttpResponse {
		let mut response = HttpResponse::new(Vec::new());

		*response.status_mut() = StatusCode::UNAUTHORIZED;
		response.headers_mut().insert(
			WWW_AUTHENTICATE,
			HeaderValue::from_str(challenge).expect("Challenge should be a valid header."),
		);

		response
	}

	fn context() -> TokenRequestContext {
		TokenRequestContext::new(["https://management.azure.com/.default"])
			.with_correlation_id("req-1")
	}

	#[test]
	fn claims_handler_answers_only_claims_challenges() {
		let handler = ClaimsChallengeHandler;
		let request = request("https://example.com/resource");
		let next = handler
			.on_challenge(&request, &unauthorized(&format!(r#"Bearer claims="{CLAIMS_B64}""#)), &context())
			.expect("A claims challenge should be answered.");

		assert_eq!(next.claims(), Some(CLAIMS_JSON));
		assert_eq!(next.scopes(), context().scopes());
		assert_eq!(next.correlation_id(), Some("req-1"));
		assert!(
			handler
				.on_challenge(&request, &unauthorized(r#"Bearer scope="other""#), &context())
				.is_none()
		);
		assert_eq!(handler.before_request(&request, context()), context());
	}

	#[test]
	fn scope_handler_learns_scope_per_authority() {
		let handler = ScopeChallengeHandler::default();
		let vault = request("https://myvault.vault.azure.net/secrets/a");
		let next = handler
			.on_challenge(
				&vault,
				&unauthorized(
					r#"Bearer authorization="https://login.example.com/tenant", resource="https://vault.azure.net/""#,
				),
				&context(),
			)
			.expect("A resource challenge should be answered.");

		assert_eq!(next.scopes(), ["https://vault.azure.net/.default"]);
		assert_eq!(next.correlation_id(), Some("req-1"));
		assert_eq!(
			handler.scope_for("myvault.vault.azure.net:443").as_deref(),
			Some("https://vault.azure.net/.default")
		);

		let signed = handler.before_request(&request("https://myvault.vault.azure.net/keys/b"), context());

		assert_eq!(signed.scopes(), ["https://vault.azure.net/.default"]);

		let elsewhere = handler.before_request(&request("https://other.vault.azure.net:8443/"), context());

		assert_eq!(elsewhere.scopes(), context().scopes());
	}

	#[test]
	fn scope_handler_prefers_scope_and_forwards_claims() {
		let handler = ScopeChallengeHandler::default();
		let next = handler
			.on_challenge(
				&request("https://example.com/"),
				&unauthorized(&format!(
					r#"Bearer resource="https://ignored", scope="https://storage.azure.com/.default", claims="{CLAIMS_B64}""#
				)),
				&context(),
			)
			.expect("A scope challenge should be answered.");

		assert_eq!(next.scopes(), ["https://storage.azure.com/.default"]);
		assert_eq!(next.claims(), Some(CLAIMS_JSON));
	}

	#[test]
	fn scope_handler_ignores_challenges_it_cannot_improve_on() {
		let handler = ScopeChallengeHandler::default();
		let request = request("https://example.com/");
		let signed = TokenRequestContext::new(["https://vault.azure.net/.default"]);

		assert!(
			handler
				.on_challenge(&request, &unauthorized(r#"Bearer scope="https://vault.azure.net/.default""#), &signed)
				.is_none()
		);
		assert!(
			handler.on_challenge(&request, &unauthorized(r#"Basic realm="api""#), &signed).is_none()
		);
		assert!(
			handler.on_challenge(&request, &unauthorized(r#"Bearer error="invalid_token""#), &signed).is_none()
		);
	}
}
