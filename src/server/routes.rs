//! Login, renewal, and logout endpoints.

// crates.io
use axum::{
	Json, Router,
	extract::{State, rejection::JsonRejection},
	http::StatusCode,
	routing::post,
};
use axum_extra::extract::cookie::CookieJar;
// self
use crate::{
	_prelude::*,
	auth::{DataEnvelope, LoginRequest, SessionPayload, SubjectProfile},
	error::VerifyError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	server::{ApiError, AuthState},
};

/// Login route path.
pub const LOGIN_PATH: &str = "/auth/login";
/// Renewal route path; keep [`CookieConfig::path`](crate::server::CookieConfig::path) in sync.
pub const REFRESH_PATH: &str = "/auth/refresh";
/// Logout route path.
pub const LOGOUT_PATH: &str = "/auth/logout";

type SessionResponse = (CookieJar, Json<DataEnvelope<SessionPayload>>);

/// Mounts the auth endpoints. None of them require an access credential.
pub fn router(state: AuthState) -> Router {
	Router::new()
		.route(LOGIN_PATH, post(login))
		.route(REFRESH_PATH, post(refresh))
		.route(LOGOUT_PATH, post(logout))
		.with_state(state)
}

async fn login(
	State(state): State<AuthState>,
	jar: CookieJar,
	body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<SessionResponse, ApiError> {
	const KIND: FlowKind = FlowKind::Login;

	let span = FlowSpan::new(KIND, "handler");

	obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

	let result = span
		.instrument(async {
			let Json(request) = body?;

			if request.email.trim().is_empty() || request.password.is_empty() {
				return Err(ApiError::Validation {
					message: "email and password are required".into(),
				});
			}

			let subject = state
				.directory()
				.authenticate(&request.email, &request.password)
				.await?
				.ok_or(ApiError::InvalidCredentials)?;

			start_session(&state, jar, subject)
		})
		.await;

	match &result {
		Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
		Err(err) => {
			tracing::info!(cause = err.cause(), "login rejected");
			obs::record_flow_outcome(KIND, FlowOutcome::Failure);
		},
	}

	result
}

// Renewal never looks at the access credential; the role is re-read from the directory.
async fn refresh(
	State(state): State<AuthState>,
	jar: CookieJar,
) -> Result<SessionResponse, ApiError> {
	const KIND: FlowKind = FlowKind::Renew;

	let span = FlowSpan::new(KIND, "refresh");

	obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

	let result = span
		.instrument(async {
			let presented = state.cookies().read(&jar);
			let claims = state.verifier().verify_renewal(presented.as_deref())?;
			let subject = state
				.directory()
				.find(&claims.subject)
				.await?
				.ok_or_else(|| ApiError::from(VerifyError::invalid("subject no longer exists")))?;

			start_session(&state, jar, subject)
		})
		.await;

	match &result {
		Ok(_) => {
			tracing::info!("session renewed");
			obs::record_flow_outcome(KIND, FlowOutcome::Success);
		},
		Err(err) => {
			tracing::info!(cause = err.cause(), "renewal rejected");
			obs::record_flow_outcome(KIND, FlowOutcome::Failure);
		},
	}

	result
}

async fn logout(State(state): State<AuthState>, jar: CookieJar) -> (CookieJar, StatusCode) {
	obs::record_flow_outcome(FlowKind::Logout, FlowOutcome::Success);

	(jar.add(state.cookies().expired_cookie()), StatusCode::NO_CONTENT)
}

fn start_session(
	state: &AuthState,
	jar: CookieJar,
	subject: SubjectProfile,
) -> Result<SessionResponse, ApiError> {
	let issued = state.issuer().issue(&subject.id, &subject.role)?;
	let max_age = issued.renewal_claims.expires_at - issued.renewal_claims.issued_at;
	let cookie = state.cookies().renewal_cookie(&issued.renewal, max_age);

	tracing::info!(subject = %subject.id, role = %subject.role, "session issued");

	let payload = SessionPayload { subject, access_token: issued.access };

	Ok((jar.add(cookie), Json(DataEnvelope::new(payload))))
}
