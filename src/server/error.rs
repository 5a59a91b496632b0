//! Cause-tagged HTTP failures returned by the auth routes and middleware.

// crates.io
use axum::{
	Json,
	extract::rejection::JsonRejection,
	http::{StatusCode, header::WWW_AUTHENTICATE},
	response::{IntoResponse, Response},
};
// self
use crate::{
	_prelude::*,
	auth::{ErrorBody, ErrorEnvelope, Role},
	error::VerifyError,
	server::DirectoryError,
};

/// Failure rendered as `{ "error": { "cause", "message" } }`.
#[derive(Debug, ThisError)]
pub enum ApiError {
	/// A presented credential was expired, invalid, or missing.
	#[error(transparent)]
	Unauthorized(#[from] VerifyError),
	/// Email/password pair did not match a subject.
	#[error("Email or password is incorrect.")]
	InvalidCredentials,
	/// Request body is structurally invalid.
	#[error("Request is invalid: {message}")]
	Validation {
		/// What was wrong with the request.
		message: String,
	},
	/// Caller is authenticated but lacks the required role.
	#[error("Role `{required}` is required.")]
	Forbidden {
		/// Role the route requires.
		required: Role,
	},
	/// Unexpected server-side failure; details are logged, never returned.
	#[error("Internal server error.")]
	Internal {
		/// Logged description of the failure.
		detail: String,
	},
}
impl ApiError {
	/// Wraps any displayable failure as [`ApiError::Internal`].
	pub fn internal(detail: impl Display) -> Self {
		Self::Internal { detail: detail.to_string() }
	}

	/// HTTP status for this failure.
	pub fn status(&self) -> StatusCode {
		match self {
			Self::Unauthorized(_) | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
			Self::Validation { .. } => StatusCode::BAD_REQUEST,
			Self::Forbidden { .. } => StatusCode::FORBIDDEN,
			Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Stable cause tag placed in the error body.
	pub fn cause(&self) -> &'static str {
		match self {
			Self::Unauthorized(err) => err.failure().cause(),
			Self::InvalidCredentials => "invalid_credentials",
			Self::Validation { .. } => "validation_error",
			Self::Forbidden { .. } => "forbidden",
			Self::Internal { .. } => "internal_error",
		}
	}
}
impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		Self::Validation { message: rejection.body_text() }
	}
}
impl From<DirectoryError> for ApiError {
	fn from(e: DirectoryError) -> Self {
		Self::internal(e)
	}
}
impl From<Error> for ApiError {
	fn from(e: Error) -> Self {
		match e {
			Error::Verify(err) => Self::Unauthorized(err),
			other => Self::internal(other),
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		if let Self::Internal { detail } = &self {
			tracing::error!(detail = %detail, "auth request failed");
		}

		let status = self.status();
		let body = Json(ErrorEnvelope {
			error: ErrorBody { cause: self.cause().into(), message: self.to_string() },
		});

		match &self {
			Self::Unauthorized(err) =>
				(status, [(WWW_AUTHENTICATE, err.failure().challenge())], body).into_response(),
			_ => (status, body).into_response(),
		}
	}
}
