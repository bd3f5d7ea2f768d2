//! `WWW-Authenticate` challenge tokenizer.
//!
//! Grammar (RFC 7235, leniently):
//!
//! ```text
//! challenges = challenge *( "," challenge )
//! challenge  = scheme [ 1*SP ( token68 / param *( "," param ) ) ]
//! param      = name "=" ( token / quoted-string )
//! ```
//!
//! A comma followed by `name =` continues the current challenge; a comma followed by anything
//! else starts a new one. Quoted strings may contain commas and backslash escapes. Malformed
//! fragments are skipped rather than reported, because a challenge the client cannot read is
//! treated the same as no challenge at all.

// crates.io
use base64::{
	Engine as _,
	alphabet,
	engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use oauth2::http::{StatusCode, header::WWW_AUTHENTICATE};
// self
use crate::{_prelude::*, auth::BEARER_SCHEME, http::HttpResponse};

/// Challenge parameter carrying a base64url-encoded claims request.
pub const CLAIMS_PARAM: &str = "claims";
/// Challenge parameter carrying the resource scope.
pub const SCOPE_PARAM: &str = "scope";
/// Challenge parameter naming the protected resource, used when no scope is advertised.
pub const RESOURCE_PARAM: &str = "resource";

const CLAIMS_ENGINE: GeneralPurpose = GeneralPurpose::new(
	&alphabet::URL_SAFE,
	GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// One parsed authentication challenge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Challenge {
	scheme: String,
	params: Vec<(String, String)>,
	token68: Option<String>,
}
impl Challenge {
	/// Authentication scheme as written by the server.
	pub fn scheme(&self) -> &str {
		&self.scheme
	}

	/// Returns `true` when the scheme matches `scheme`, ignoring ASCII case.
	pub fn is_scheme(&self, scheme: &str) -> bool {
		self.scheme.eq_ignore_ascii_case(scheme)
	}

	/// First parameter named `name` (ASCII case-insensitive), unquoted and unescaped.
	pub fn param(&self, name: &str) -> Option<&str> {
		self.params.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
	}

	/// All parameters in header order.
	pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
		self.params.iter().map(|(key, value)| (key.as_str(), value.as_str()))
	}

	/// Opaque token68 payload, if the challenge used that form.
	pub fn token68(&self) -> Option<&str> {
		self.token68.as_deref()
	}

	/// `scope` parameter, if present.
	pub fn scope(&self) -> Option<&str> {
		self.param(SCOPE_PARAM)
	}

	/// `resource` parameter, if present.
	pub fn resource(&self) -> Option<&str> {
		self.param(RESOURCE_PARAM)
	}

	/// Decoded `claims` parameter, if present and valid base64url-encoded UTF-8.
	pub fn claims(&self) -> Option<String> {
		self.param(CLAIMS_PARAM).and_then(decode_claims)
	}
}

/// Splits a `WWW-Authenticate` header value into challenges.
pub fn parse_challenges(header: &str) -> Vec<Challenge> {
	let mut tokenizer = Tokenizer::new(header);
	let mut challenges = Vec::new();

	loop {
		tokenizer.skip_while(|c| c == ',' || c.is_ascii_whitespace());

		if tokenizer.is_done() {
			break;
		}

		let scheme = tokenizer.word();

		if scheme.is_empty() {
			// Not a scheme; drop the offending character and resynchronise.
			tokenizer.bump();

			continue;
		}

		let mut challenge = Challenge { scheme: scheme.to_owned(), params: Vec::new(), token68: None };

		tokenizer.skip_while(|c| c == ' ' || c == '\t');

		if let Some(token68) = tokenizer.token68() {
			challenge.token68 = Some(token68.to_owned());
		} else {
			tokenizer.params(&mut challenge.params);
		}

		challenges.push(challenge);
	}

	challenges
}

/// Decoded claims from the first Bearer challenge in `header` that carries them.
///
/// Returns `None` when there is no Bearer claims challenge or its payload does not decode.
pub fn claims_from_challenge(header: &str) -> Option<String> {
	parse_challenges(header)
		.iter()
		.filter(|challenge| challenge.is_scheme(BEARER_SCHEME))
		.find_map(|challenge| challenge.param(CLAIMS_PARAM))
		.and_then(decode_claims)
}

/// Every challenge carried by a `401` response's `WWW-Authenticate` headers, in header order.
///
/// Responses with any other status yield no challenges.
pub fn challenges_from_response(response: &HttpResponse) -> Vec<Challenge> {
	if response.status() != StatusCode::UNAUTHORIZED {
		return Vec::new();
	}

	response
		.headers()
		.get_all(WWW_AUTHENTICATE)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(parse_challenges)
		.collect()
}

/// Decoded claims from a `401` response's `WWW-Authenticate` headers.
pub fn claims_from_response(response: &HttpResponse) -> Option<String> {
	if response.status() != StatusCode::UNAUTHORIZED {
		return None;
	}

	response
		.headers()
		.get_all(WWW_AUTHENTICATE)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.find_map(claims_from_challenge)
}

fn decode_claims(encoded: &str) -> Option<String> {
	let bytes = CLAIMS_ENGINE.decode(encoded.trim()).ok()?;
	let claims = String::from_utf8(bytes).ok()?;

	(!claims.is_empty()).then_some(claims)
}

fn is_tchar(c: char) -> bool {
	c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

fn is_token68_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || "-._~+/".contains(c)
}

struct Tokenizer<'a> {
	input: &'a str,
	pos: usize,
}
impl<'a> Tokenizer<'a> {
	fn new(input: &'a str) -> Self {
		Self { input, pos: 0 }
	}

	fn rest(&self) -> &'a str {
		&self.input[self.pos..]
	}

	fn is_done(&self) -> bool {
		self.pos >= self.input.len()
	}

	fn peek(&self) -> Option<char> {
		self.rest().chars().next()
	}

	fn bump(&mut self) -> Option<char> {
		let c = self.peek()?;

		self.pos += c.len_utf8();

		Some(c)
	}

	fn skip_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
		let start = self.pos;

		while self.peek().is_some_and(&pred) {
			self.bump();
		}

		&self.input[start..self.pos]
	}

	fn word(&mut self) -> &'a str {
		self.skip_while(is_tchar)
	}

	/// Consumes a token68 payload if one follows the scheme.
	///
	/// A token68 is a run of token68 characters with optional trailing `=` padding that ends the
	/// challenge (end of input or a comma). Anything else is left for parameter parsing.
	fn token68(&mut self) -> Option<&'a str> {
		let start = self.pos;
		let body = self.skip_while(is_token68_char);

		if body.is_empty() {
			self.pos = start;

			return None;
		}

		self.skip_while(|c| c == '=');

		let end = self.pos;

		self.skip_while(|c| c == ' ' || c == '\t');

		if self.is_done() || self.peek() == Some(',') {
			// `name=value` would have stopped at a non-padding character after `=`.
			return Some(&self.input[start..end]);
		}

		self.pos = start;

		None
	}

	/// Parses `name=value` pairs until the next challenge begins.
	fn params(&mut self, params: &mut Vec<(String, String)>) {
		loop {
			self.skip_while(|c| c == ' ' || c == '\t');

			if !self.at_param() {
				return;
			}

			let name = self.word().to_owned();

			self.skip_while(|c| c == ' ' || c == '\t');
			self.bump();
			self.skip_while(|c| c == ' ' || c == '\t');

			let value = if self.peek() == Some('"') {
				self.quoted()
			} else {
				self.skip_while(|c| c != ',' && !c.is_ascii_whitespace()).to_owned()
			};

			params.push((name, value));

			self.skip_while(|c| c == ' ' || c == '\t');

			if self.peek() != Some(',') {
				// Garbage between parameters; skip to the next separator.
				self.skip_while(|c| c != ',');
			}

			let separator = self.pos;

			self.skip_while(|c| c == ',' || c.is_ascii_whitespace());

			if !self.at_param() {
				// The comma introduced a new challenge; leave it for the outer loop.
				self.pos = separator;

				return;
			}
		}
	}

	/// Returns `true` if the cursor is at `name BWS "="` without consuming anything.
	fn at_param(&mut self) -> bool {
		let start = self.pos;
		let name = self.word();

		self.skip_while(|c| c == ' ' || c == '\t');

		let found = !name.is_empty() && self.peek() == Some('=');

		self.pos = start;

		found
	}

	/// Reads a quoted string, unescaping `\x` pairs. An unterminated string runs to the end.
	fn quoted(&mut self) -> String {
		let mut value = String::new();

		self.bump();

		while let Some(c) = self.bump() {
			match c {
				'"' => break,
				'\\' =>
					if let Some(escaped) = self.bump() {
						value.push(escaped);
					},
				c => value.push(c),
			}
		}

		value
	}
}
