//! RFC 6750 `WWW-Authenticate` challenges that tell clients why a request was unauthorized.
//!
//! Servers emit one challenge per 401 so the client can tell an expired access credential
//! (renew and replay) from an invalid one (fail fast).

// self
use crate::_prelude::*;

const EXPIRED_DESCRIPTION: &str = "token expired";
const INVALID_DESCRIPTION: &str = "token invalid";

/// Why a credential was not accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailure {
	/// Signature valid, expiry passed.
	Expired,
	/// Malformed, forged, or signed for another purpose.
	Invalid,
	/// No credential presented.
	Missing,
}
impl AuthFailure {
	/// Cause tag used in JSON error bodies.
	pub const fn cause(self) -> &'static str {
		match self {
			Self::Expired => "token_expired",
			Self::Invalid => "token_invalid",
			Self::Missing => "token_missing",
		}
	}

	/// Whether a client should attempt renewal after seeing this failure.
	pub const fn is_renewable(self) -> bool {
		!matches!(self, Self::Invalid)
	}

	/// Renders the `WWW-Authenticate` header value.
	pub fn challenge(self) -> String {
		match self {
			Self::Expired =>
				format!("Bearer error=\"invalid_token\", error_description=\"{EXPIRED_DESCRIPTION}\""),
			Self::Invalid =>
				format!("Bearer error=\"invalid_token\", error_description=\"{INVALID_DESCRIPTION}\""),
			Self::Missing => "Bearer".into(),
		}
	}

	/// Classifies a `WWW-Authenticate` header value produced by [`AuthFailure::challenge`].
	///
	/// Returns `None` for non-bearer or unrecognised challenges.
	pub fn from_challenge(value: &str) -> Option<Self> {
		let value = value.trim();
		let (scheme, params) = value.split_once(' ').unwrap_or((value, ""));

		if !scheme.eq_ignore_ascii_case("bearer") {
			return None;
		}

		let mut error = None;
		let mut description = None;

		for param in params.split(',') {
			let Some((key, raw)) = param.split_once('=') else { continue };
			let raw = raw.trim().trim_matches('"');

			match key.trim() {
				"error" => error = Some(raw),
				"error_description" => description = Some(raw),
				_ => {},
			}
		}

		match (error, description) {
			(None, _) => Some(Self::Missing),
			(Some("invalid_token"), Some(EXPIRED_DESCRIPTION)) => Some(Self::Expired),
			(Some("invalid_token"), _) => Some(Self::Invalid),
			_ => None,
		}
	}
}
impl Display for AuthFailure {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.cause())
	}
}
