//! Redacted credential wrappers that keep signed tokens out of logs.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

const FINGERPRINT_LEN: usize = 12;

/// Selects which signing secret a credential belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialPurpose {
	/// Short-lived bearer credential attached to business requests.
	Access,
	/// Long-lived credential carried in the renewal cookie.
	Renewal,
}
impl CredentialPurpose {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Access => "access",
			Self::Renewal => "renewal",
		}
	}
}
impl Display for CredentialPurpose {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

macro_rules! def_credential {
	($name:ident, $doc:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(String);
		impl $name {
			/// Wraps a signed token string.
			pub fn new(value: impl Into<String>) -> Self {
				Self(value.into())
			}

			/// Returns the signed token. Callers must avoid logging this string.
			pub fn expose(&self) -> &str {
				&self.0
			}

			/// Short, non-reversible digest that lets logs correlate credentials.
			pub fn fingerprint(&self) -> String {
				fingerprint(&self.0)
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				self.expose()
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.debug_tuple(stringify!($name)).field(&"<redacted>").finish()
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str("<redacted>")
			}
		}
	};
}

def_credential! { AccessCredential, "Short-lived signed bearer credential; kept in memory only." }
def_credential! { RenewalCredential, "Long-lived signed credential transported in an HTTP-only cookie." }

fn fingerprint(value: &str) -> String {
	let digest = Sha256::digest(value.as_bytes());
	let mut encoded = STANDARD_NO_PAD.encode(digest);

	encoded.truncate(FINGERPRINT_LEN);

	encoded
}
