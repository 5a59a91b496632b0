//! Response inspection shared by the renewal client and the session pipeline.

// crates.io
use reqwest::{
	StatusCode,
	header::{HeaderMap, RETRY_AFTER, WWW_AUTHENTICATE},
};
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	auth::{AuthFailure, ErrorEnvelope},
	error::TransientError,
};

/// Classifies the bearer challenge attached to a 401, if one was sent.
pub(crate) fn auth_failure(headers: &HeaderMap) -> Option<AuthFailure> {
	headers
		.get_all(WWW_AUTHENTICATE)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.find_map(AuthFailure::from_challenge)
}

pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<i64>() {
		return Some(Duration::seconds(secs.max(0)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		return Some(delta.max(Duration::ZERO));
	}

	None
}

/// Decodes a JSON body, keeping the failing path for diagnostics.
pub(crate) fn decode_json<T>(body: &[u8], status: StatusCode) -> Result<T, TransientError>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| TransientError::ResponseParse { source, status: Some(status.as_u16()) })
}

/// Extracts the human-readable message from an error body, falling back to the status line.
pub(crate) fn error_message(body: &[u8], status: StatusCode) -> String {
	serde_json::from_slice::<ErrorEnvelope>(body)
		.map(|envelope| envelope.error.message)
		.unwrap_or_else(|_| format!("endpoint responded with {status}"))
}

/// Builds a retryable failure from an unexpected status.
pub(crate) fn unexpected_status(
	status: StatusCode,
	headers: &HeaderMap,
	body: &[u8],
) -> TransientError {
	TransientError::Endpoint {
		message: error_message(body, status),
		status: Some(status.as_u16()),
		retry_after: parse_retry_after(headers),
	}
}
