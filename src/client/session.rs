//! Request pipeline that keeps a session alive across access-credential expiry.
//!
//! Every outbound request carries the current access credential. A 401 whose challenge is
//! renewable (expired, missing, or unrecognised) triggers one coordinated renewal and exactly one
//! replay of the original request; the replay's response is returned as-is even if it is another
//! 401. A 401 that names the credential as invalid is returned without renewing.

// crates.io
use reqwest::{
	Method, Request, RequestBuilder, Response, StatusCode,
	header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue},
	redirect::Policy,
};
// self
use crate::{
	_prelude::*,
	auth::{AccessCredential, DataEnvelope, LoginRequest, SessionPayload},
	client::{
		CredentialStore, LoginRedirect, RefreshCoordinator, RenewalClient, ReqwestRenewalClient,
		RetryPolicy, http,
	},
	error::{ConfigError, TransportError},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Resolved endpoints and policies for a [`Session`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
	/// Base URL business request paths are resolved against.
	pub base_url: Url,
	/// Password login endpoint.
	pub login_endpoint: Url,
	/// Renewal endpoint.
	pub refresh_endpoint: Url,
	/// Logout endpoint.
	pub logout_endpoint: Url,
	/// Retry budget for transient renewal failures.
	pub retry: RetryPolicy,
}
impl SessionConfig {
	/// Starts a builder rooted at `base_url`.
	pub fn builder(base_url: Url) -> SessionConfigBuilder {
		SessionConfigBuilder::new(base_url)
	}
}

/// Builder for [`SessionConfig`] values.
#[derive(Clone, Debug)]
pub struct SessionConfigBuilder {
	/// Base URL for every endpoint.
	pub base_url: Url,
	/// Login path relative to the base URL.
	pub login_path: String,
	/// Renewal path relative to the base URL.
	pub refresh_path: String,
	/// Logout path relative to the base URL.
	pub logout_path: String,
	/// Retry budget for transient renewal failures.
	pub retry: RetryPolicy,
	/// Permits plain HTTP endpoints (local development and tests only).
	pub allow_insecure_http: bool,
}
impl SessionConfigBuilder {
	/// Default login path.
	pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";
	/// Default renewal path.
	pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
	/// Default logout path.
	pub const DEFAULT_LOGOUT_PATH: &str = "/auth/logout";

	/// Creates a builder with the default auth paths.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			login_path: Self::DEFAULT_LOGIN_PATH.into(),
			refresh_path: Self::DEFAULT_REFRESH_PATH.into(),
			logout_path: Self::DEFAULT_LOGOUT_PATH.into(),
			retry: RetryPolicy::default(),
			allow_insecure_http: false,
		}
	}

	/// Overrides the login path.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.login_path = path.into();

		self
	}

	/// Overrides the renewal path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the logout path.
	pub fn logout_path(mut self, path: impl Into<String>) -> Self {
		self.logout_path = path.into();

		self
	}

	/// Overrides the renewal retry budget.
	pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Allows `http://` endpoints.
	pub fn allow_insecure_http(mut self, allow: bool) -> Self {
		self.allow_insecure_http = allow;

		self
	}

	/// Resolves endpoints and validates the configuration.
	pub fn build(self) -> Result<SessionConfig, ConfigError> {
		let login_endpoint = self.base_url.join(&self.login_path)?;
		let refresh_endpoint = self.base_url.join(&self.refresh_path)?;
		let logout_endpoint = self.base_url.join(&self.logout_path)?;

		if !self.allow_insecure_http {
			validate_endpoint("base", &self.base_url)?;
			validate_endpoint("login", &login_endpoint)?;
			validate_endpoint("refresh", &refresh_endpoint)?;
			validate_endpoint("logout", &logout_endpoint)?;
		}

		self.retry.validate()?;

		Ok(SessionConfig {
			base_url: self.base_url,
			login_endpoint,
			refresh_endpoint,
			logout_endpoint,
			retry: self.retry,
		})
	}
}

/// Client-side session: credential store, refresh coordinator, and request pipeline.
///
/// Share one `Session` (e.g. behind an `Arc`) across every task that talks to the same API so
/// all of them coalesce onto a single renewal.
pub struct Session<R = ReqwestRenewalClient>
where
	R: ?Sized + RenewalClient,
{
	http: ReqwestClient,
	config: SessionConfig,
	coordinator: RefreshCoordinator<R>,
}
impl Session {
	/// Builds a session with a fresh cookie-enabled reqwest client.
	pub fn new(config: SessionConfig) -> Result<Self> {
		let http = ReqwestClient::builder()
			.cookie_store(true)
			.redirect(Policy::none())
			.build()
			.map_err(ConfigError::http_client_build)?;

		Ok(Self::with_client(config, http))
	}

	/// Builds a session around an existing client, which must have a cookie store enabled.
	pub fn with_client(config: SessionConfig, http: ReqwestClient) -> Self {
		let renewal = ReqwestRenewalClient::new(http.clone(), config.refresh_endpoint.clone());

		Self::with_renewal_client(config, http, renewal)
	}
}
impl<R> Session<R>
where
	R: ?Sized + RenewalClient,
{
	/// Builds a session with a caller-supplied renewal transport.
	pub fn with_renewal_client(
		config: SessionConfig,
		http: ReqwestClient,
		renewal: impl Into<Arc<R>>,
	) -> Self {
		let coordinator = RefreshCoordinator::new(renewal, Arc::new(CredentialStore::new()))
			.with_retry_policy(config.retry);

		Self { http, config, coordinator }
	}

	/// Installs the hook invoked when renewal fails and the user must log in again.
	pub fn with_login_redirect(mut self, redirect: Arc<dyn LoginRedirect>) -> Self {
		self.coordinator = self.coordinator.with_login_redirect(redirect);

		self
	}

	/// Resolved configuration.
	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	/// Underlying HTTP client (shares the cookie jar with the renewal transport).
	pub fn http_client(&self) -> &ReqwestClient {
		&self.http
	}

	/// Refresh coordinator shared by every request on this session.
	pub fn coordinator(&self) -> &RefreshCoordinator<R> {
		&self.coordinator
	}

	/// In-memory credential store.
	pub fn credentials(&self) -> &CredentialStore {
		self.coordinator.store()
	}

	/// Starts a request to `path`, resolved against the base URL.
	pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
		let url = self.config.base_url.join(path).map_err(ConfigError::from)?;

		Ok(self.http.request(method, url))
	}

	/// Builds and sends a request through the pipeline.
	pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
		let request = builder.build().map_err(ConfigError::invalid_request)?;

		self.execute(request).await
	}

	/// Sends `request` with the current access credential, renewing and replaying once on a
	/// renewable 401.
	///
	/// Requests whose bodies cannot be cloned (streams) are sent once and never replayed.
	pub async fn execute(&self, request: Request) -> Result<Response> {
		let replay = request.try_clone();
		let credential = match self.credentials().get() {
			Some(credential) => credential,
			None => self.coordinator.acquire(None).await?,
		};
		let response = self.dispatch(request, &credential).await?;

		if response.status() != StatusCode::UNAUTHORIZED {
			return Ok(response);
		}

		let failure = http::auth_failure(response.headers());

		if failure.is_some_and(|failure| !failure.is_renewable()) {
			tracing::debug!(url = %response.url(), "credential rejected as invalid; not renewing");

			return Ok(response);
		}

		let Some(replay) = replay else {
			tracing::warn!(url = %response.url(), "request body cannot be replayed after renewal");

			return Ok(response);
		};

		self.replay(replay, &credential).await
	}

	/// Authenticates with email and password and stores the returned access credential.
	///
	/// The renewal credential arrives as an HTTP-only cookie and stays in the client's jar.
	pub async fn login(&self, email: &str, password: &str) -> Result<SessionPayload> {
		const KIND: FlowKind = FlowKind::Login;

		let span = FlowSpan::new(KIND, "login");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.login_inner(email, password)).await;

		match &result {
			Ok(payload) => {
				tracing::info!(subject = %payload.subject.id, "logged in");
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			Err(err) => {
				tracing::warn!(error = %err, "login failed");
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	/// Drops the local credential and asks the server to clear the renewal cookie.
	///
	/// A renewal already in flight is discarded and allowed to finish before the server call, so
	/// neither its credential nor its cookie outlives the logout. The local credential is cleared
	/// even if the server call fails.
	pub async fn logout(&self) -> Result<()> {
		const KIND: FlowKind = FlowKind::Logout;

		let span = FlowSpan::new(KIND, "logout");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		if let Some(previous) = self.coordinator.invalidate() {
			tracing::debug!(credential = %previous.fingerprint(), "dropped access credential");
		}

		let result = span
			.instrument(async {
				self.coordinator.settled().await;
				self.logout_inner().await
			})
			.await;

		match &result {
			Ok(()) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(err) => {
				tracing::warn!(error = %err, "logout call failed");
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	async fn replay(&self, request: Request, stale: &AccessCredential) -> Result<Response> {
		const KIND: FlowKind = FlowKind::Replay;

		let span = FlowSpan::new(KIND, "replay");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let fresh = self.coordinator.acquire(Some(stale)).await?;

				self.dispatch(request, &fresh).await
			})
			.await;

		match &result {
			Ok(response) => {
				tracing::debug!(url = %response.url(), status = %response.status(), "replayed request");
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn dispatch(&self, mut request: Request, credential: &AccessCredential) -> Result<Response> {
		let mut value = HeaderValue::from_str(&format!("Bearer {}", credential.expose()))
			.map_err(|_| ConfigError::InvalidHeaderValue)?;

		value.set_sensitive(true);
		request.headers_mut().insert(AUTHORIZATION, value);

		Ok(self.http.execute(request).await.map_err(TransportError::from)?)
	}

	async fn login_inner(&self, email: &str, password: &str) -> Result<SessionPayload> {
		let body = serde_json::to_vec(&LoginRequest { email: email.into(), password: password.into() })
			.map_err(ConfigError::invalid_request)?;
		let response = self
			.http
			.post(self.config.login_endpoint.clone())
			.header(CONTENT_TYPE, "application/json")
			.body(body)
			.send()
			.await
			.map_err(TransportError::from)?;
		let status = response.status();
		let headers = response.headers().to_owned();
		let body = response.bytes().await.map_err(TransportError::from)?;

		if status.is_success() {
			let envelope: DataEnvelope<SessionPayload> = http::decode_json(&body, status)?;

			self.credentials().replace(envelope.data.access_token.clone());

			return Ok(envelope.data);
		}
		if status == StatusCode::UNAUTHORIZED {
			return Err(Error::InvalidCredentials { reason: http::error_message(&body, status) });
		}
		if status == StatusCode::BAD_REQUEST {
			return Err(Error::Validation { reason: http::error_message(&body, status) });
		}

		Err(http::unexpected_status(status, &headers, &body).into())
	}

	async fn logout_inner(&self) -> Result<()> {
		let response = self
			.http
			.post(self.config.logout_endpoint.clone())
			.send()
			.await
			.map_err(TransportError::from)?;
		let status = response.status();

		if status.is_success() {
			return Ok(());
		}

		let headers = response.headers().to_owned();
		let body = response.bytes().await.map_err(TransportError::from)?;

		Err(http::unexpected_status(status, &headers, &body).into())
	}
}
impl<R> Debug for Session<R>
where
	R: ?Sized + RenewalClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("config", &self.config)
			.field("coordinator", &self.coordinator)
			.finish_non_exhaustive()
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	if url.scheme() != "https" {
		Err(ConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	} else {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("URL fixture should parse.")
	}

	#[test]
	fn builder_resolves_default_auth_paths() {
		let config = SessionConfig::builder(url("https://api.farm.example/v1/"))
			.build()
			.expect("HTTPS configuration should build.");

		assert_eq!(config.refresh_endpoint.as_str(), "https://api.farm.example/auth/refresh");
		assert_eq!(config.login_endpoint.as_str(), "https://api.farm.example/auth/login");
		assert_eq!(config.retry, RetryPolicy::default());
	}

	#[test]
	fn builder_rejects_plain_http_unless_allowed() {
		let err = SessionConfig::builder(url("http://localhost:8080"))
			.build()
			.expect_err("Plain HTTP should be rejected by default.");

		assert!(matches!(err, ConfigError::InsecureEndpoint { endpoint: "base", .. }));

		let config = SessionConfig::builder(url("http://localhost:8080"))
			.refresh_path("/session/renew")
			.allow_insecure_http(true)
			.build()
			.expect("Plain HTTP should be accepted when allowed.");

		assert_eq!(config.refresh_endpoint.as_str(), "http://localhost:8080/session/renew");
	}

	#[test]
	fn builder_validates_retry_policy() {
		let err = SessionConfig::builder(url("https://api.farm.example"))
			.retry_policy(RetryPolicy { max_attempts: 0, ..RetryPolicy::default() })
			.build()
			.expect_err("A zero retry budget should be rejected.");

		assert!(matches!(err, ConfigError::InvalidRetryPolicy { .. }));
	}
}
