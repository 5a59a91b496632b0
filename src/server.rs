//! Axum surface for issuing, renewing, and enforcing access credentials.
//!
//! [`router`] mounts the login, renewal, and logout endpoints. Business routes are protected
//! with [`require_access`] via `axum::middleware::from_fn_with_state`, after which handlers
//! extract an [`AuthContext`]:
//!
//! ```ignore
//! let api = Router::new()
//! 	.route("/api/profile", get(profile))
//! 	.route_layer(axum::middleware::from_fn_with_state(state.clone(), require_access));
//! let app = session_relay::server::router(state).merge(api);
//! ```

pub mod cookie;
pub mod directory;
pub mod error;
pub mod middleware;
pub mod routes;

pub use cookie::*;
pub use directory::*;
pub use error::*;
pub use middleware::*;
pub use routes::*;

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	token::{TokenConfig, TokenIssuer, TokenKeys, TokenVerifier},
};

/// Shared state handed to the auth routes and middleware.
#[derive(Clone)]
pub struct AuthState {
	issuer: TokenIssuer,
	verifier: TokenVerifier,
	directory: Arc<dyn SubjectDirectory>,
	cookies: Arc<CookieConfig>,
}
impl AuthState {
	/// Builds state around validated key material.
	pub fn new(
		keys: Arc<TokenKeys>,
		directory: Arc<dyn SubjectDirectory>,
		cookies: CookieConfig,
	) -> Self {
		Self {
			issuer: TokenIssuer::new(keys.clone()),
			verifier: TokenVerifier::new(keys),
			directory,
			cookies: Arc::new(cookies),
		}
	}

	/// Validates `config` and builds state from it; call once at startup.
	pub fn from_config(
		config: &TokenConfig,
		directory: Arc<dyn SubjectDirectory>,
		cookies: CookieConfig,
	) -> Result<Self, ConfigError> {
		let keys = Arc::new(TokenKeys::from_config(config)?);

		Ok(Self::new(keys, directory, cookies))
	}

	/// Credential issuer.
	pub fn issuer(&self) -> &TokenIssuer {
		&self.issuer
	}

	/// Credential verifier.
	pub fn verifier(&self) -> &TokenVerifier {
		&self.verifier
	}

	/// Subject lookup seam.
	pub fn directory(&self) -> &dyn SubjectDirectory {
		self.directory.as_ref()
	}

	/// Renewal cookie settings.
	pub fn cookies(&self) -> &CookieConfig {
		&self.cookies
	}
}
impl Debug for AuthState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthState")
			.field("issuer", &self.issuer)
			.field("cookies", &self.cookies)
			.finish_non_exhaustive()
	}
}
