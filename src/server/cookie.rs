//! Renewal cookie construction.

// crates.io
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
// self
use crate::{_prelude::*, auth::RenewalCredential};

/// Attributes applied to the renewal cookie.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
	/// Cookie name.
	pub name: String,
	/// Path the browser sends the cookie to; keep it scoped to the renewal endpoint.
	pub path: String,
	/// Root domain shared by sibling hosts, if any.
	pub domain: Option<String>,
	/// Emit the `Secure` attribute. Only disable for plain-HTTP local development.
	pub secure: bool,
}
impl CookieConfig {
	/// Default cookie name.
	pub const DEFAULT_NAME: &str = "refresh_token";
	/// Default cookie path.
	pub const DEFAULT_PATH: &str = "/auth/refresh";

	/// Builds the `HttpOnly; SameSite=Lax` cookie carrying a renewal credential.
	pub fn renewal_cookie(
		&self,
		credential: &RenewalCredential,
		max_age: Duration,
	) -> Cookie<'static> {
		self.build(credential.expose().to_owned(), max_age)
	}

	/// Builds an empty cookie with a negative `Max-Age` so the browser drops it.
	pub fn expired_cookie(&self) -> Cookie<'static> {
		self.build(String::new(), Duration::seconds(-1))
	}

	/// Reads the renewal credential presented with a request.
	pub fn read(&self, jar: &CookieJar) -> Option<String> {
		jar.get(&self.name).map(|cookie| cookie.value().to_owned())
	}

	fn build(&self, value: String, max_age: Duration) -> Cookie<'static> {
		let mut cookie = Cookie::build((self.name.clone(), value))
			.http_only(true)
			.secure(self.secure)
			.same_site(SameSite::Lax)
			.path(self.path.clone())
			.max_age(max_age)
			.build();

		if let Some(domain) = &self.domain {
			cookie.set_domain(domain.clone());
		}

		cookie
	}
}
impl Default for CookieConfig {
	fn default() -> Self {
		Self {
			name: Self::DEFAULT_NAME.into(),
			path: Self::DEFAULT_PATH.into(),
			domain: None,
			secure: true,
		}
	}
}
