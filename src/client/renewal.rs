//! Transport seam for the renewal call.
//!
//! [`RenewalClient`] is the coordinator's only dependency on an HTTP stack. The default
//! [`ReqwestRenewalClient`] posts to the renewal endpoint and relies on the client's cookie jar
//! to carry the HTTP-only renewal cookie; tests and embedders can supply their own.

// self
use crate::{_prelude::*, auth::AccessCredential, error::RenewalError};
#[cfg(feature = "reqwest")]
use crate::{
	auth::{DataEnvelope, SessionPayload},
	client::http,
	error::TransportError,
};

/// Boxed future returned by [`RenewalClient::renew`].
pub type RenewalFuture<'a> =
	Pin<Box<dyn Future<Output = Result<AccessCredential, RenewalError>> + 'a + Send>>;

/// Performs one renewal call and returns the fresh access credential.
///
/// Implementations must not retry internally; the coordinator owns the retry budget. Map a
/// definitive refusal to [`RenewalError::Rejected`] and anything worth retrying to
/// [`RenewalError::Transport`] or [`RenewalError::Transient`].
pub trait RenewalClient
where
	Self: 'static + Send + Sync,
{
	/// Exchanges the ambient renewal credential for a fresh access credential.
	fn renew(&self) -> RenewalFuture<'_>;
}

/// Reqwest-backed renewal client.
///
/// The wrapped [`ReqwestClient`] must have a cookie store enabled and share it with the client
/// that performed login, otherwise the renewal cookie is never sent.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestRenewalClient {
	client: ReqwestClient,
	endpoint: Url,
}
#[cfg(feature = "reqwest")]
impl ReqwestRenewalClient {
	/// Wraps an existing client and the absolute renewal endpoint URL.
	pub fn new(client: ReqwestClient, endpoint: Url) -> Self {
		Self { client, endpoint }
	}

	/// Renewal endpoint this client posts to.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	async fn call(&self) -> Result<AccessCredential, RenewalError> {
		let response = self
			.client
			.post(self.endpoint.clone())
			.send()
			.await
			.map_err(TransportError::from)?;
		let status = response.status();
		let headers = response.headers().to_owned();
		let body = response.bytes().await.map_err(TransportError::from)?;

		if status.is_success() {
			let envelope: DataEnvelope<SessionPayload> = http::decode_json(&body, status)?;

			return Ok(envelope.data.access_token);
		}
		if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
			return Err(RenewalError::Rejected {
				status: status.as_u16(),
				failure: http::auth_failure(&headers),
			});
		}

		Err(http::unexpected_status(status, &headers, &body).into())
	}
}
#[cfg(feature = "reqwest")]
impl RenewalClient for ReqwestRenewalClient {
	fn renew(&self) -> RenewalFuture<'_> {
		Box::pin(self.call())
	}
}
