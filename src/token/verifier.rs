//! Validates credentials against purpose-specific secrets and classifies failures.

// crates.io
use jsonwebtoken::{
	Validation,
	errors::{Error as JwtError, ErrorKind as JwtErrorKind},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{AccessClaims, Claims, CredentialPurpose, RenewalClaims},
	error::VerifyError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	token::TokenKeys,
};

/// Stateless credential verifier.
#[derive(Clone, Debug)]
pub struct TokenVerifier {
	keys: Arc<TokenKeys>,
}
impl TokenVerifier {
	/// Creates a verifier over validated key material.
	pub fn new(keys: Arc<TokenKeys>) -> Self {
		Self { keys }
	}

	/// Verifies `credential` with the secret selected by `purpose`.
	///
	/// `None` and blank strings are reported as [`VerifyError::Missing`].
	pub fn verify(
		&self,
		credential: Option<&str>,
		purpose: CredentialPurpose,
	) -> Result<Claims, VerifyError> {
		match purpose {
			CredentialPurpose::Access => self.verify_access(credential).map(Claims::Access),
			CredentialPurpose::Renewal => self.verify_renewal(credential).map(Claims::Renewal),
		}
	}

	/// Verifies an access credential.
	pub fn verify_access(&self, credential: Option<&str>) -> Result<AccessClaims, VerifyError> {
		self.decode(credential, CredentialPurpose::Access)
	}

	/// Verifies a renewal credential.
	pub fn verify_renewal(&self, credential: Option<&str>) -> Result<RenewalClaims, VerifyError> {
		self.decode(credential, CredentialPurpose::Renewal)
	}

	fn decode<T>(&self, credential: Option<&str>, purpose: CredentialPurpose) -> Result<T, VerifyError>
	where
		T: DeserializeOwned,
	{
		const KIND: FlowKind = FlowKind::Verify;

		let _span = FlowSpan::new(KIND, purpose.as_str()).entered();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = credential
			.map(str::trim)
			.filter(|value| !value.is_empty())
			.ok_or(VerifyError::Missing)
			.and_then(|token| {
				jsonwebtoken::decode::<T>(token, self.keys.decoding(purpose), &self.validation())
					.map(|data| data.claims)
					.map_err(classify)
			});

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(err) => {
				tracing::debug!(purpose = %purpose, error = %err, "credential rejected");
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	fn validation(&self) -> Validation {
		let mut validation = Validation::new(TokenKeys::ALGORITHM);

		validation.leeway = self.keys.leeway_secs();
		validation.set_required_spec_claims(&["exp", "sub"]);

		validation
	}
}

// The signature is checked before any claim, so only a genuine credential can be `Expired`.
fn classify(err: JwtError) -> VerifyError {
	match err.kind() {
		JwtErrorKind::ExpiredSignature => VerifyError::Expired,
		JwtErrorKind::InvalidSignature => VerifyError::invalid("signature mismatch"),
		JwtErrorKind::InvalidAlgorithm => VerifyError::invalid("unexpected algorithm"),
		JwtErrorKind::MissingRequiredClaim(claim) =>
			VerifyError::invalid(format_args!("missing claim `{claim}`")),
		JwtErrorKind::ImmatureSignature => VerifyError::invalid("not yet valid"),
		JwtErrorKind::Json(_) => VerifyError::invalid("claims do not match the expected shape"),
		_ => VerifyError::invalid("malformed token"),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::{role, subject, test_token_pair};

	#[test]
	fn blank_credentials_are_missing() {
		let (_, verifier) = test_token_pair();

		assert_eq!(verifier.verify(None, CredentialPurpose::Access), Err(VerifyError::Missing));
		assert_eq!(
			verifier.verify(Some("   "), CredentialPurpose::Renewal),
			Err(VerifyError::Missing)
		);
	}

	#[test]
	fn garbage_is_invalid_not_expired() {
		let (_, verifier) = test_token_pair();
		let err = verifier
			.verify_access(Some("not-a-jwt"))
			.expect_err("Garbage input must not verify.");

		assert!(matches!(err, VerifyError::Invalid { .. }));
	}

	#[test]
	fn fresh_access_credential_round_trips() {
		let (issuer, verifier) = test_token_pair();
		let issued = issuer
			.issue(&subject("user-5"), &role("viewer"))
			.expect("Issuing should succeed.");
		let claims = verifier
			.verify(Some(issued.access.expose()), CredentialPurpose::Access)
			.expect("Fresh access credential should verify.");

		assert_eq!(claims.subject().as_ref(), "user-5");
		assert_eq!(claims.role().map(ToString::to_string), Some("viewer".into()));
	}
}
