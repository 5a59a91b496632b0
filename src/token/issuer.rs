//! Mints access + renewal credential pairs for an authenticated subject.

// crates.io
use jsonwebtoken::Header;
// self
use crate::{
	_prelude::*,
	auth::{
		AccessClaims, AccessCredential, CredentialPurpose, RenewalClaims, RenewalCredential, Role,
		SubjectId,
	},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	token::TokenKeys,
};

/// Credentials minted by a single [`TokenIssuer::issue`] call.
#[derive(Clone, Debug)]
pub struct IssuedCredentials {
	/// Short-lived bearer credential; returned in response bodies only.
	pub access: AccessCredential,
	/// Long-lived credential; returned in the renewal cookie only.
	pub renewal: RenewalCredential,
	/// Claims embedded in the access credential.
	pub access_claims: AccessClaims,
	/// Claims embedded in the renewal credential.
	pub renewal_claims: RenewalClaims,
}

/// Signs credential pairs with purpose-specific secrets.
#[derive(Clone, Debug)]
pub struct TokenIssuer {
	keys: Arc<TokenKeys>,
}
impl TokenIssuer {
	/// Creates an issuer over validated key material.
	pub fn new(keys: Arc<TokenKeys>) -> Self {
		Self { keys }
	}

	/// Issues a fresh pair stamped with the current clock.
	pub fn issue(&self, subject: &SubjectId, role: &Role) -> Result<IssuedCredentials> {
		self.issue_at(subject, role, OffsetDateTime::now_utc())
	}

	/// Issues a fresh pair as if the clock read `now`.
	pub fn issue_at(
		&self,
		subject: &SubjectId,
		role: &Role,
		now: OffsetDateTime,
	) -> Result<IssuedCredentials> {
		const KIND: FlowKind = FlowKind::Issue;

		let _span = FlowSpan::new(KIND, "issue").entered();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = self.sign_pair(subject, role, now);

		match &result {
			Ok(issued) => {
				tracing::debug!(
					subject = %subject,
					access = %issued.access.fingerprint(),
					renewal = %issued.renewal.fingerprint(),
					"issued credential pair"
				);
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			Err(err) => {
				tracing::error!(subject = %subject, error = %err, "credential signing failed");
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	fn sign_pair(
		&self,
		subject: &SubjectId,
		role: &Role,
		now: OffsetDateTime,
	) -> Result<IssuedCredentials> {
		let access_claims = AccessClaims {
			subject: subject.clone(),
			role: role.clone(),
			issued_at: now,
			expires_at: now + self.keys.ttl(CredentialPurpose::Access),
		};
		let renewal_claims = RenewalClaims {
			subject: subject.clone(),
			issued_at: now,
			expires_at: now + self.keys.ttl(CredentialPurpose::Renewal),
		};
		let access = self.sign(CredentialPurpose::Access, &access_claims)?;
		let renewal = self.sign(CredentialPurpose::Renewal, &renewal_claims)?;

		Ok(IssuedCredentials {
			access: AccessCredential::new(access),
			renewal: RenewalCredential::new(renewal),
			access_claims,
			renewal_claims,
		})
	}

	fn sign<T>(&self, purpose: CredentialPurpose, claims: &T) -> Result<String>
	where
		T: Serialize,
	{
		jsonwebtoken::encode(&Header::new(TokenKeys::ALGORITHM), claims, self.keys.encoding(purpose))
			.map_err(|source| Error::Signing { source })
	}
}
