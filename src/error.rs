//! Crate-level error types shared by the issuer, verifier, coordinator, and request pipeline.

// self
use crate::{
	_prelude::*,
	auth::{AuthFailure, IdentifierError},
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// A presented credential failed verification.
	#[error(transparent)]
	Verify(#[from] VerifyError),
	/// Renewal failed; every caller waiting on the same renewal observes this value.
	#[error(transparent)]
	Renewal(#[from] Arc<RenewalError>),

	/// Signing a credential failed at call time.
	#[error("Credential signing failed.")]
	Signing {
		/// Underlying JWT encoder failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// Login endpoint rejected the supplied email/password pair.
	#[error("Login was rejected: {reason}.")]
	InvalidCredentials {
		/// Server-supplied reason string.
		reason: String,
	},
	/// Endpoint refused the request body as malformed.
	#[error("Request failed validation: {reason}.")]
	Validation {
		/// Server-supplied reason string.
		reason: String,
	},
}
impl From<RenewalError> for Error {
	fn from(e: RenewalError) -> Self {
		Self::Renewal(Arc::new(e))
	}
}

/// Configuration and validation failures; fatal at startup.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// An outbound request could not be assembled.
	#[error("Request could not be built.")]
	InvalidRequest {
		/// Underlying builder or encoder failure.
		#[source]
		source: BoxError,
	},
	/// A configured URL cannot be parsed or joined.
	#[error("Configured URL is invalid.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoints must use HTTPS unless explicitly allowed.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// A signing secret is empty.
	#[error("The {purpose} signing secret is empty.")]
	EmptySecret {
		/// Credential purpose label.
		purpose: &'static str,
	},
	/// A signing secret is shorter than the HS256 minimum.
	#[error("The {purpose} signing secret must be at least {min} bytes.")]
	WeakSecret {
		/// Credential purpose label.
		purpose: &'static str,
		/// Minimum accepted length in bytes.
		min: usize,
	},
	/// Access and renewal credentials would be signed with the same secret.
	#[error("Access and renewal credentials must use distinct signing secrets.")]
	SharedSecret,
	/// A credential lifetime is zero or negative.
	#[error("The {purpose} credential lifetime must be positive.")]
	NonPositiveTtl {
		/// Credential purpose label.
		purpose: &'static str,
	},
	/// Retry policy cannot be honored.
	#[error("Retry policy is invalid: {reason}.")]
	InvalidRetryPolicy {
		/// Human-readable reason.
		reason: &'static str,
	},
	/// Identifier supplied through configuration is invalid.
	#[error(transparent)]
	InvalidIdentifier(#[from] IdentifierError),
	/// A credential cannot be encoded as an HTTP header value.
	#[error("Credential cannot be encoded as an HTTP header value.")]
	InvalidHeaderValue,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Wraps a request builder or body encoder failure inside [`ConfigError`].
	pub fn invalid_request(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::InvalidRequest { source: Box::new(src) }
	}
}
impl From<url::ParseError> for ConfigError {
	fn from(source: url::ParseError) -> Self {
		Self::InvalidUrl { source }
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Endpoint returned an unexpected but non-fatal response.
	#[error("Endpoint returned an unexpected response: {message}.")]
	Endpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Endpoint responded with JSON that does not match the expected envelope.
	#[error("Endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Outcome of a failed credential verification.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum VerifyError {
	/// Signature is valid but the expiry instant has passed.
	#[error("Credential has expired.")]
	Expired,
	/// Credential is malformed, carries a bad signature, or was signed for another purpose.
	#[error("Credential is invalid: {reason}.")]
	Invalid {
		/// Short description of the rejection.
		reason: String,
	},
	/// No credential was presented.
	#[error("No credential was presented.")]
	Missing,
}
impl VerifyError {
	/// Builds an [`VerifyError::Invalid`] from any displayable reason.
	pub fn invalid(reason: impl Display) -> Self {
		Self::Invalid { reason: reason.to_string() }
	}

	/// Maps the error onto the failure kind advertised to clients.
	pub fn failure(&self) -> AuthFailure {
		match self {
			Self::Expired => AuthFailure::Expired,
			Self::Invalid { .. } => AuthFailure::Invalid,
			Self::Missing => AuthFailure::Missing,
		}
	}
}

/// Failure of a renewal attempt as observed by the driver and all of its waiters.
#[derive(Debug, ThisError)]
pub enum RenewalError {
	/// Renewal endpoint refused the renewal credential.
	#[error("Renewal endpoint rejected the session with status {status}.")]
	Rejected {
		/// HTTP status code returned by the renewal endpoint.
		status: u16,
		/// Failure kind advertised in the `WWW-Authenticate` challenge, if any.
		failure: Option<AuthFailure>,
	},
	/// Renewal call could not reach the server.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Renewal endpoint answered with a retryable failure.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Renewal could not be attempted because of local configuration.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The driver was dropped before the renewal settled.
	#[error("Renewal was abandoned before it settled.")]
	Abandoned,
	/// The session was ended while the renewal was in flight; its result was discarded.
	#[error("Session ended while the renewal was in flight.")]
	Invalidated,
}
impl RenewalError {
	/// Returns `true` when another attempt might succeed.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Transport(_) | Self::Transient(_))
	}

	/// Upstream `Retry-After` hint carried by a transient failure.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Transient(TransientError::Endpoint { retry_after, .. }) => *retry_after,
			_ => None,
		}
	}
}
