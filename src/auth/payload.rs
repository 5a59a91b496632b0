//! JSON bodies exchanged by the login, renewal, and logout endpoints.

// self
use crate::{
	_prelude::*,
	auth::{AccessCredential, Role, SubjectId},
};

/// `{ "data": ... }` envelope wrapping every successful response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
	/// Wrapped payload.
	pub data: T,
}
impl<T> DataEnvelope<T> {
	/// Wraps a payload.
	pub fn new(data: T) -> Self {
		Self { data }
	}
}

/// Public profile of an authenticated subject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectProfile {
	/// Issuer-assigned identifier.
	pub id: SubjectId,
	/// Login email.
	pub email: String,
	/// Display name.
	pub name: String,
	/// Current role.
	pub role: Role,
}

/// Body returned by login and renewal: the subject plus a fresh access credential.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionPayload {
	/// Subject the session belongs to.
	#[serde(flatten)]
	pub subject: SubjectProfile,
	/// Fresh access credential; the renewal credential travels only in the cookie.
	pub access_token: AccessCredential,
}

/// Body accepted by the login endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
	/// Login email.
	pub email: String,
	/// Plain-text password; verified against the stored hash by the subject directory.
	pub password: String,
}
impl Debug for LoginRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginRequest")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// `{ "error": { "cause", "message" } }` body attached to every failure response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
	/// Failure details.
	pub error: ErrorBody,
}

/// Cause-tagged failure details.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	/// Stable machine-readable tag (e.g. `token_expired`).
	pub cause: String,
	/// Human-readable message.
	pub message: String,
}
