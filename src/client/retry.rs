//! Bounded retry budget applied to transient renewal failures.

// crates.io
use rand::Rng;
// self
use crate::{_prelude::*, error::ConfigError};

/// Retry budget for a single renewal.
///
/// Only transport and transient failures consume the budget; a definitive rejection from the
/// renewal endpoint ends the renewal immediately.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
	/// Total renewal calls allowed, including the first.
	pub max_attempts: u32,
	/// Delay before the second call; doubles for each further call.
	#[serde(with = "duration_millis")]
	pub base_backoff: Duration,
	/// Upper bound of the uniform jitter added to each delay.
	#[serde(with = "duration_millis")]
	pub max_jitter: Duration,
}
impl RetryPolicy {
	/// Default number of calls per renewal.
	pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

	/// Policy that never retries.
	pub const fn no_retry() -> Self {
		Self { max_attempts: 1, base_backoff: Duration::ZERO, max_jitter: Duration::ZERO }
	}

	/// Rejects policies that could never make a call or would wait a negative time.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.max_attempts == 0 {
			return Err(ConfigError::InvalidRetryPolicy { reason: "max_attempts must be at least 1" });
		}
		if self.base_backoff.is_negative() || self.max_jitter.is_negative() {
			return Err(ConfigError::InvalidRetryPolicy { reason: "delays must not be negative" });
		}

		Ok(())
	}

	/// Returns `true` when a call numbered `attempt` (1-based) may be followed by another.
	pub fn allows_retry_after(&self, attempt: u32) -> bool {
		attempt < self.max_attempts
	}

	/// Delay to wait after call number `attempt` (1-based) failed.
	pub fn backoff(&self, attempt: u32) -> Duration {
		let exponent = attempt.saturating_sub(1).min(16);
		let base = self.base_backoff.saturating_mul(1_i32 << exponent);

		base.saturating_add(self.jitter())
	}

	fn jitter(&self) -> Duration {
		let max_ms = u64::try_from(self.max_jitter.whole_milliseconds()).unwrap_or(0);

		if max_ms == 0 {
			return Duration::ZERO;
		}

		let ms = rand::rng().random_range(0..=max_ms);

		Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
			base_backoff: Duration::milliseconds(250),
			max_jitter: Duration::milliseconds(50),
		}
	}
}

pub(crate) async fn sleep(delay: Duration) {
	let delay = std::time::Duration::try_from(delay).unwrap_or_default();

	if !delay.is_zero() {
		tokio::time::sleep(delay).await;
	}
}

mod duration_millis {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub(super) fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(i64::try_from(value.whole_milliseconds()).unwrap_or(i64::MAX))
	}

	pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::milliseconds)
	}
}
