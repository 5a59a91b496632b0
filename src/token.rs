//! Server-side credential minting and verification.
//!
//! [`TokenKeys`] holds one HS256 secret per [`CredentialPurpose`] and is validated once at
//! startup; [`TokenIssuer`] and [`TokenVerifier`] share it behind an `Arc` and never mutate it,
//! so request handlers can verify and issue concurrently without coordination.

pub mod issuer;
pub mod verifier;

pub use issuer::*;
pub use verifier::*;

// crates.io
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
// self
use crate::{_prelude::*, auth::CredentialPurpose, error::ConfigError};

/// Minimum secret length accepted for HS256 keys.
pub const MIN_SECRET_LEN: usize = 32;

/// Signing configuration, typically deserialized from the service's config file.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenConfig {
	/// Secret used to sign access credentials.
	pub access_secret: String,
	/// Secret used to sign renewal credentials; must differ from the access secret.
	pub renewal_secret: String,
	/// Lifetime of access credentials.
	#[serde(default = "TokenConfig::default_access_ttl", with = "duration_secs")]
	pub access_ttl: Duration,
	/// Lifetime of renewal credentials.
	#[serde(default = "TokenConfig::default_renewal_ttl", with = "duration_secs")]
	pub renewal_ttl: Duration,
	/// Clock skew tolerated when checking `exp`, in seconds.
	#[serde(default)]
	pub leeway_secs: u64,
}
impl TokenConfig {
	/// Default access credential lifetime.
	pub const DEFAULT_ACCESS_TTL: Duration = Duration::minutes(15);
	/// Default renewal credential lifetime.
	pub const DEFAULT_RENEWAL_TTL: Duration = Duration::days(30);

	/// Creates a configuration with default lifetimes and zero leeway.
	pub fn new(access_secret: impl Into<String>, renewal_secret: impl Into<String>) -> Self {
		Self {
			access_secret: access_secret.into(),
			renewal_secret: renewal_secret.into(),
			access_ttl: Self::DEFAULT_ACCESS_TTL,
			renewal_ttl: Self::DEFAULT_RENEWAL_TTL,
			leeway_secs: 0,
		}
	}

	/// Overrides the access credential lifetime.
	pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
		self.access_ttl = ttl;

		self
	}

	/// Overrides the renewal credential lifetime.
	pub fn with_renewal_ttl(mut self, ttl: Duration) -> Self {
		self.renewal_ttl = ttl;

		self
	}

	/// Overrides the expiry leeway.
	pub fn with_leeway_secs(mut self, leeway_secs: u64) -> Self {
		self.leeway_secs = leeway_secs;

		self
	}

	fn default_access_ttl() -> Duration {
		Self::DEFAULT_ACCESS_TTL
	}

	fn default_renewal_ttl() -> Duration {
		Self::DEFAULT_RENEWAL_TTL
	}
}
impl Debug for TokenConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenConfig")
			.field("access_secret", &"<redacted>")
			.field("renewal_secret", &"<redacted>")
			.field("access_ttl", &self.access_ttl)
			.field("renewal_ttl", &self.renewal_ttl)
			.field("leeway_secs", &self.leeway_secs)
			.finish()
	}
}

/// Validated, read-only key material shared by the issuer and verifier.
pub struct TokenKeys {
	access: PurposeKeys,
	renewal: PurposeKeys,
	access_ttl: Duration,
	renewal_ttl: Duration,
	leeway_secs: u64,
}
impl TokenKeys {
	/// Signing algorithm used for both purposes.
	pub const ALGORITHM: Algorithm = Algorithm::HS256;

	/// Validates the configuration and derives signing/verification keys.
	///
	/// Call this once at startup; any error here is a deployment problem.
	pub fn from_config(config: &TokenConfig) -> Result<Self, ConfigError> {
		validate_secret(CredentialPurpose::Access, &config.access_secret)?;
		validate_secret(CredentialPurpose::Renewal, &config.renewal_secret)?;

		if config.access_secret == config.renewal_secret {
			return Err(ConfigError::SharedSecret);
		}
		if !config.access_ttl.is_positive() {
			return Err(ConfigError::NonPositiveTtl { purpose: CredentialPurpose::Access.as_str() });
		}
		if !config.renewal_ttl.is_positive() {
			return Err(ConfigError::NonPositiveTtl {
				purpose: CredentialPurpose::Renewal.as_str(),
			});
		}

		Ok(Self {
			access: PurposeKeys::from_secret(&config.access_secret),
			renewal: PurposeKeys::from_secret(&config.renewal_secret),
			access_ttl: config.access_ttl,
			renewal_ttl: config.renewal_ttl,
			leeway_secs: config.leeway_secs,
		})
	}

	/// Lifetime applied to credentials of the given purpose.
	pub fn ttl(&self, purpose: CredentialPurpose) -> Duration {
		match purpose {
			CredentialPurpose::Access => self.access_ttl,
			CredentialPurpose::Renewal => self.renewal_ttl,
		}
	}

	/// Clock skew tolerated by the verifier.
	pub fn leeway_secs(&self) -> u64 {
		self.leeway_secs
	}

	fn encoding(&self, purpose: CredentialPurpose) -> &EncodingKey {
		&self.keys(purpose).encoding
	}

	fn decoding(&self, purpose: CredentialPurpose) -> &DecodingKey {
		&self.keys(purpose).decoding
	}

	fn keys(&self, purpose: CredentialPurpose) -> &PurposeKeys {
		match purpose {
			CredentialPurpose::Access => &self.access,
			CredentialPurpose::Renewal => &self.renewal,
		}
	}
}
impl Debug for TokenKeys {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenKeys")
			.field("algorithm", &Self::ALGORITHM)
			.field("access_ttl", &self.access_ttl)
			.field("renewal_ttl", &self.renewal_ttl)
			.field("leeway_secs", &self.leeway_secs)
			.finish_non_exhaustive()
	}
}

struct PurposeKeys {
	encoding: EncodingKey,
	decoding: DecodingKey,
}
impl PurposeKeys {
	fn from_secret(secret: &str) -> Self {
		Self {
			encoding: EncodingKey::from_secret(secret.as_bytes()),
			decoding: DecodingKey::from_secret(secret.as_bytes()),
		}
	}
}

fn validate_secret(purpose: CredentialPurpose, secret: &str) -> Result<(), ConfigError> {
	if secret.trim().is_empty() {
		return Err(ConfigError::EmptySecret { purpose: purpose.as_str() });
	}
	if secret.len() < MIN_SECRET_LEN {
		return Err(ConfigError::WeakSecret { purpose: purpose.as_str(), min: MIN_SECRET_LEN });
	}

	Ok(())
}

mod duration_secs {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub(super) fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(value.whole_seconds())
	}

	pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::seconds)
	}
}
