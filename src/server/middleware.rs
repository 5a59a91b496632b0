//! Access-credential enforcement for business routes.

// crates.io
use axum::{
	extract::{FromRequestParts, Request, State},
	http::{HeaderMap, header::AUTHORIZATION, request::Parts},
	middleware::Next,
	response::{IntoResponse, Response},
};
// self
use crate::{
	_prelude::*,
	auth::{Role, SubjectId},
	server::{ApiError, AuthState},
};

/// Identity established by [`require_access`] for the current request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthContext {
	/// Authenticated subject.
	pub subject: SubjectId,
	/// Role carried by the access credential.
	pub role: Role,
}
impl AuthContext {
	/// Fails with 403 `forbidden` unless the caller holds `required`.
	pub fn require_role(&self, required: &str) -> Result<(), ApiError> {
		if self.role.as_ref() == required {
			return Ok(());
		}

		let required = Role::new(required).map_err(ApiError::internal)?;

		Err(ApiError::Forbidden { required })
	}
}
impl<S> FromRequestParts<S> for AuthContext
where
	S: Send + Sync,
{
	type Rejection = ApiError;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		parts
			.extensions
			.get::<AuthContext>()
			.cloned()
			.ok_or_else(|| ApiError::internal("AuthContext is missing; require_access is not layered"))
	}
}

/// Verifies the bearer access credential and stores an [`AuthContext`] in request extensions.
///
/// Install with `axum::middleware::from_fn_with_state(state, require_access)`. Failures are
/// rendered as 401 with a challenge telling the client whether renewal can help.
pub async fn require_access(
	State(state): State<AuthState>,
	mut request: Request,
	next: Next,
) -> Response {
	match state.verifier().verify_access(bearer_token(request.headers())) {
		Ok(claims) => {
			request
				.extensions_mut()
				.insert(AuthContext { subject: claims.subject, role: claims.role });

			next.run(request).await
		},
		Err(err) => ApiError::from(err).into_response(),
	}
}

/// Extracts the credential from `Authorization: Bearer <credential>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
	let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
	let (scheme, token) = value.split_once(' ')?;

	scheme.eq_ignore_ascii_case("bearer").then_some(token.trim())
}

#[cfg(test)]
mod tests {
	// crates.io
	use axum::http::HeaderValue;
	// self
	use super::*;
	use crate::_preludet::{role, subject};

	#[test]
	fn bearer_token_requires_the_bearer_scheme() {
		let mut headers = HeaderMap::new();

		assert_eq!(bearer_token(&headers), None);

		headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer  a.b.c "));

		assert_eq!(bearer_token(&headers), Some("a.b.c"));

		headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));

		assert_eq!(bearer_token(&headers), None);
	}

	#[test]
	fn require_role_distinguishes_roles() {
		let context = AuthContext { subject: subject("user-1"), role: role("viewer") };

		assert!(context.require_role("viewer").is_ok());
		assert!(matches!(context.require_role("manager"), Err(ApiError::Forbidden { .. })));
	}
}
