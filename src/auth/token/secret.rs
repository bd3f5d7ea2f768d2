//! Redacting wrapper for bearer tokens and client secrets.

// self
use crate::{_prelude::*, auth::BEARER_SCHEME};

/// Placeholder printed wherever a secret would otherwise appear.
pub const REDACTED: &str = "<redacted>";

/// Secret string that never shows up in `Debug` or `Display` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Raw secret. Callers must avoid logging it.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Formats the secret as an `Authorization` header value.
	pub fn bearer_header(&self) -> String {
		format!("{BEARER_SCHEME} {}", self.0)
	}
}
impl From<String> for TokenSecret {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(REDACTED)
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(REDACTED)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn formatting_never_leaks_the_secret() {
		let secret = TokenSecret::from(String::from("eyJ0eXAi"));

		assert_eq!(format!("{secret:?}"), REDACTED);
		assert_eq!(secret.to_string(), REDACTED);
		assert_eq!(secret.bearer_header(), "Bearer eyJ0eXAi");
		assert_eq!(
			serde_json::to_string(&secret).expect("Secret should serialize."),
			"\"eyJ0eXAi\""
		);
	}
}
