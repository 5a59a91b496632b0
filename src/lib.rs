//! Session continuity for short-lived access tokens: JWT issuing and verification on the server,
//! single-flight refresh and request replay on the client.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod error;
pub mod obs;
#[cfg(feature = "axum")] pub mod server;
pub mod token;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{Role, SubjectId},
		token::{TokenConfig, TokenIssuer, TokenKeys, TokenVerifier},
	};

	/// Access secret shared by integration tests.
	pub const TEST_ACCESS_SECRET: &str = "access-secret-for-tests-0123456789abcdef";
	/// Renewal secret shared by integration tests.
	pub const TEST_RENEWAL_SECRET: &str = "renewal-secret-for-tests-0123456789abcdef";

	/// Builds a token configuration seeded with the shared test secrets.
	pub fn test_token_config() -> TokenConfig {
		TokenConfig::new(TEST_ACCESS_SECRET, TEST_RENEWAL_SECRET)
	}

	/// Builds an issuer + verifier pair that share the same key material.
	pub fn test_token_pair() -> (TokenIssuer, TokenVerifier) {
		let keys = Arc::new(
			TokenKeys::from_config(&test_token_config())
				.expect("Test token configuration should produce valid keys."),
		);

		(TokenIssuer::new(keys.clone()), TokenVerifier::new(keys))
	}

	/// Parses a subject identifier fixture.
	pub fn subject(value: &str) -> SubjectId {
		SubjectId::new(value).expect("Subject fixture should be valid.")
	}

	/// Parses a role fixture.
	pub fn role(value: &str) -> Role {
		Role::new(value).expect("Role fixture should be valid.")
	}

	#[cfg(feature = "reqwest")]
	/// Builds a reqwest client with a cookie jar that also accepts the self-signed certificates
	/// produced by `httpmock` during tests.
	pub fn test_reqwest_client() -> ReqwestClient {
		ReqwestClient::builder()
			.cookie_store(true)
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.")
	}
}

mod _prelude {
	pub use std::{
		collections::{HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)]
use {http_body_util as _, httpmock as _, tower as _, tracing_test as _};
