//! Claim sets embedded in access and renewal credentials.

// self
use crate::{
	_prelude::*,
	auth::{Role, SubjectId},
};

/// Claims carried by an access credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
	/// Subject the credential was issued to.
	#[serde(rename = "sub")]
	pub subject: SubjectId,
	/// Role resolved at issuance time.
	pub role: Role,
	/// Issued-at instant.
	#[serde(rename = "iat", with = "time::serde::timestamp")]
	pub issued_at: OffsetDateTime,
	/// Expiry instant.
	#[serde(rename = "exp", with = "time::serde::timestamp")]
	pub expires_at: OffsetDateTime,
}

/// Claims carried by a renewal credential.
///
/// There is no role claim: every renewal looks the subject up again so role changes take
/// effect on the next access credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalClaims {
	/// Subject the credential was issued to.
	#[serde(rename = "sub")]
	pub subject: SubjectId,
	/// Issued-at instant.
	#[serde(rename = "iat", with = "time::serde::timestamp")]
	pub issued_at: OffsetDateTime,
	/// Expiry instant.
	#[serde(rename = "exp", with = "time::serde::timestamp")]
	pub expires_at: OffsetDateTime,
}

/// Claims decoded by [`TokenVerifier::verify`](crate::token::TokenVerifier::verify).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Claims {
	/// Claims decoded from an access credential.
	Access(AccessClaims),
	/// Claims decoded from a renewal credential.
	Renewal(RenewalClaims),
}
impl Claims {
	/// Subject shared by both claim sets.
	pub fn subject(&self) -> &SubjectId {
		match self {
			Self::Access(claims) => &claims.subject,
			Self::Renewal(claims) => &claims.subject,
		}
	}

	/// Role, present only on access claims.
	pub fn role(&self) -> Option<&Role> {
		match self {
			Self::Access(claims) => Some(&claims.role),
			Self::Renewal(_) => None,
		}
	}

	/// Expiry instant shared by both claim sets.
	pub fn expires_at(&self) -> OffsetDateTime {
		match self {
			Self::Access(claims) => claims.expires_at,
			Self::Renewal(claims) => claims.expires_at,
		}
	}
}
