//! Single-flight renewal shared by every request that observed the same expired credential.
//!
//! The first caller to find no renewal in flight becomes the driver and performs the renewal
//! call. Callers arriving while it runs are parked in a FIFO queue and settled with the driver's
//! outcome: on success the fresh credential is written to the [`CredentialStore`] before any
//! waiter is released, and on failure the store is cleared, every waiter receives the same
//! error, and the [`LoginRedirect`] hook fires once.
//!
//! The queue lock is never held across an `.await`; renewal runs outside it.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::AccessCredential,
	client::{CredentialStore, RenewalClient, RetryPolicy, retry},
	error::RenewalError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

type Settlement = Result<AccessCredential, Arc<RenewalError>>;

/// Hook invoked once when a renewal fails and the session has ended.
pub trait LoginRedirect
where
	Self: Send + Sync,
{
	/// Sends the user back to the login surface.
	fn redirect(&self, cause: &RenewalError);
}
impl<F> LoginRedirect for F
where
	F: Fn(&RenewalError) + Send + Sync,
{
	fn redirect(&self, cause: &RenewalError) {
		self(cause)
	}
}

/// Default hook that only logs the end of the session.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogRedirect;
impl LoginRedirect for LogRedirect {
	fn redirect(&self, cause: &RenewalError) {
		tracing::warn!(error = %cause, "session ended; login required");
	}
}

/// Whether a renewal is currently in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPhase {
	/// No renewal is running.
	Idle,
	/// A driver is performing a renewal and new callers will queue.
	Refreshing,
}

/// Coalesces concurrent renewal requests into a single renewal call.
pub struct RefreshCoordinator<R>
where
	R: ?Sized + RenewalClient,
{
	renewal: Arc<R>,
	store: Arc<CredentialStore>,
	policy: RetryPolicy,
	redirect: Arc<dyn LoginRedirect>,
	metrics: Arc<RefreshMetrics>,
	state: Mutex<CoordinatorState>,
}
impl<R> RefreshCoordinator<R>
where
	R: ?Sized + RenewalClient,
{
	/// Creates a coordinator with the default retry policy and a logging redirect hook.
	pub fn new(renewal: impl Into<Arc<R>>, store: Arc<CredentialStore>) -> Self {
		Self {
			renewal: renewal.into(),
			store,
			policy: RetryPolicy::default(),
			redirect: Arc::new(LogRedirect),
			metrics: Default::default(),
			state: Default::default(),
		}
	}

	/// Overrides the retry policy applied to transient renewal failures.
	pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Overrides the hook invoked when a renewal ends the session.
	pub fn with_login_redirect(mut self, redirect: Arc<dyn LoginRedirect>) -> Self {
		self.redirect = redirect;

		self
	}

	/// Shares an external metrics recorder.
	pub fn with_metrics(mut self, metrics: Arc<RefreshMetrics>) -> Self {
		self.metrics = metrics;

		self
	}

	/// Store the coordinator writes renewed credentials into.
	pub fn store(&self) -> &Arc<CredentialStore> {
		&self.store
	}

	/// Renewal counters.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.metrics
	}

	/// Retry policy in effect.
	pub fn retry_policy(&self) -> RetryPolicy {
		self.policy
	}

	/// Reports whether a renewal is in flight.
	pub fn phase(&self) -> RefreshPhase {
		if self.state.lock().is_refreshing { RefreshPhase::Refreshing } else { RefreshPhase::Idle }
	}

	/// Number of callers parked behind the in-flight renewal.
	pub fn pending_waiters(&self) -> usize {
		self.state.lock().waiters.len()
	}

	/// Returns a credential newer than `stale`, renewing at most once across concurrent callers.
	///
	/// `stale` is the credential the caller saw rejected, or `None` when it had none. If the
	/// store already holds a different credential (another caller renewed in the meantime) it is
	/// returned without a renewal call.
	pub async fn acquire(&self, stale: Option<&AccessCredential>) -> Result<AccessCredential> {
		match self.enter(stale) {
			Entry::Ready(credential) => Ok(credential),
			Entry::Wait(receiver) => {
				self.metrics.record_coalesced();

				match receiver.await {
					Ok(Ok(credential)) => Ok(credential),
					Ok(Err(err)) => Err(Error::Renewal(err)),
					Err(_) => Err(RenewalError::Abandoned.into()),
				}
			},
			Entry::Drive(generation) => self.drive(generation).await,
		}
	}

	/// Ends the current session: clears the store and marks any in-flight renewal as stale.
	///
	/// A renewal that settles after this call never writes to the store; it and its waiters
	/// resolve with [`RenewalError::Invalidated`]. Returns the credential that was dropped.
	pub fn invalidate(&self) -> Option<AccessCredential> {
		let mut state = self.state.lock();

		state.generation += 1;

		self.store.clear()
	}

	/// Waits until no renewal is in flight. The in-flight outcome is ignored.
	pub async fn settled(&self) {
		let receiver = {
			let mut state = self.state.lock();

			if !state.is_refreshing {
				return;
			}

			state.enqueue()
		};

		let _ = receiver.await;
	}

	fn enter(&self, stale: Option<&AccessCredential>) -> Entry {
		let mut state = self.state.lock();

		if let Some(current) = self.store.get().filter(|current| stale != Some(current)) {
			return Entry::Ready(current);
		}
		if state.is_refreshing {
			let receiver = state.enqueue();

			tracing::debug!(queued = state.waiters.len(), "waiting on in-flight renewal");

			return Entry::Wait(receiver);
		}

		state.is_refreshing = true;

		Entry::Drive(state.generation)
	}

	async fn drive(&self, generation: u64) -> Result<AccessCredential> {
		const KIND: FlowKind = FlowKind::Renew;

		let span = FlowSpan::new(KIND, "drive");
		let mut guard = DriverGuard { coordinator: self, armed: true };

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let outcome = span.instrument(self.renew_with_retry()).await;

		guard.armed = false;

		match outcome {
			Ok(credential) => {
				let Some(released) = self.settle_success(generation, &credential) else {
					return Err(self.settle_invalidated());
				};

				tracing::info!(
					credential = %credential.fingerprint(),
					waiters = released.len(),
					"renewal succeeded"
				);
				obs::record_flow_outcome(KIND, FlowOutcome::Success);

				Ok(credential)
			},
			Err(err) => {
				let err = Arc::new(err);
				let Some(released) = self.settle_failure(generation, err.clone()) else {
					return Err(self.settle_invalidated());
				};

				tracing::warn!(error = %err, waiters = released.len(), "renewal failed");
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				Err(Error::Renewal(err))
			},
		}
	}

	async fn renew_with_retry(&self) -> Result<AccessCredential, RenewalError> {
		let mut attempt = 1;

		loop {
			self.metrics.record_attempt();

			match self.renewal.renew().await {
				Ok(credential) => return Ok(credential),
				Err(err) if err.is_retryable() && self.policy.allows_retry_after(attempt) => {
					let backoff = self.policy.backoff(attempt);
					let delay = err.retry_after().map_or(backoff, |hint| hint.max(backoff));

					tracing::debug!(
						attempt,
						error = %err,
						delay = %delay,
						"renewal attempt failed; retrying"
					);
					retry::sleep(delay).await;

					attempt += 1;
				},
				Err(err) => return Err(err),
			}
		}
	}

	// Store first, then release, so no waiter can observe the stale credential.
	// `None` means the session was invalidated while the renewal ran.
	fn settle_success(&self, generation: u64, credential: &AccessCredential) -> Option<Vec<u64>> {
		let waiters = {
			let mut state = self.state.lock();

			if state.generation != generation {
				return None;
			}

			self.store.replace(credential.clone());

			state.drain()
		};

		self.metrics.record_success();

		Some(deliver(waiters, || Ok(credential.clone())))
	}

	fn settle_failure(&self, generation: u64, err: Arc<RenewalError>) -> Option<Vec<u64>> {
		let waiters = {
			let mut state = self.state.lock();

			if state.generation != generation {
				return None;
			}

			self.store.clear();

			state.drain()
		};

		self.metrics.record_failure();

		let released = deliver(waiters, || Err(err.clone()));

		self.redirect.redirect(&err);

		Some(released)
	}

	fn settle_invalidated(&self) -> Error {
		let err = Arc::new(RenewalError::Invalidated);
		let waiters = self.state.lock().drain();
		let released = deliver(waiters, || Err(err.clone()));

		tracing::info!(waiters = released.len(), "renewal outcome discarded after invalidation");
		self.metrics.record_failure();
		obs::record_flow_outcome(FlowKind::Renew, FlowOutcome::Failure);

		Error::Renewal(err)
	}

	fn settle_abandoned(&self) -> Vec<u64> {
		let err = Arc::new(RenewalError::Abandoned);
		let waiters = self.state.lock().drain();

		deliver(waiters, || Err(err.clone()))
	}
}
impl<R> Debug for RefreshCoordinator<R>
where
	R: ?Sized + RenewalClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RefreshCoordinator")
			.field("policy", &self.policy)
			.field("is_refreshing", &state.is_refreshing)
			.field("waiters", &state.waiters.len())
			.field("generation", &state.generation)
			.field("metrics", &self.metrics)
			.finish_non_exhaustive()
	}
}

#[derive(Debug, Default)]
struct CoordinatorState {
	is_refreshing: bool,
	waiters: VecDeque<PendingWaiter>,
	next_ticket: u64,
	generation: u64,
}
impl CoordinatorState {
	fn enqueue(&mut self) -> oneshot::Receiver<Settlement> {
		let (sender, receiver) = oneshot::channel();
		let ticket = self.next_ticket;

		self.next_ticket += 1;
		self.waiters.push_back(PendingWaiter { ticket, sender });

		receiver
	}

	// Ends the refreshing phase and hands back the waiters in arrival order.
	fn drain(&mut self) -> VecDeque<PendingWaiter> {
		self.is_refreshing = false;

		std::mem::take(&mut self.waiters)
	}
}

#[derive(Debug)]
struct PendingWaiter {
	ticket: u64,
	sender: oneshot::Sender<Settlement>,
}

enum Entry {
	Ready(AccessCredential),
	Wait(oneshot::Receiver<Settlement>),
	Drive(u64),
}

// Settles waiters as abandoned if the driving future is dropped mid-renewal.
struct DriverGuard<'a, R>
where
	R: ?Sized + RenewalClient,
{
	coordinator: &'a RefreshCoordinator<R>,
	armed: bool,
}
impl<R> Drop for DriverGuard<'_, R>
where
	R: ?Sized + RenewalClient,
{
	fn drop(&mut self) {
		if self.armed {
			let released = self.coordinator.settle_abandoned();

			tracing::warn!(waiters = released.len(), "renewal driver dropped before settling");
		}
	}
}

/// Settles every waiter in arrival order and returns their tickets in that order.
fn deliver(waiters: VecDeque<PendingWaiter>, settlement: impl Fn() -> Settlement) -> Vec<u64> {
	waiters
		.into_iter()
		.map(|waiter| {
			// A waiter whose request was cancelled has dropped its receiver.
			let _ = waiter.sender.send(settlement());

			waiter.ticket
		})
		.collect()
}

#[cfg(test)]
mod tests {
	// std
	use std::{
		sync::atomic::{AtomicUsize, Ordering},
		time::Instant,
	};
	// self
	use super::*;
	use crate::{client::RenewalFuture, error::TransientError};

	struct FixedRenewal(&'static str);
	impl RenewalClient for FixedRenewal {
		fn renew(&self) -> RenewalFuture<'_> {
			let token = self.0;

			Box::pin(async move { Ok(AccessCredential::new(token)) })
		}
	}

	struct PendingRenewal;
	impl RenewalClient for PendingRenewal {
		fn renew(&self) -> RenewalFuture<'_> {
			Box::pin(std::future::pending())
		}
	}

	struct SlowRenewal;
	impl RenewalClient for SlowRenewal {
		fn renew(&self) -> RenewalFuture<'_> {
			Box::pin(async {
				retry::sleep(Duration::milliseconds(50)).await;

				Ok(AccessCredential::new("late"))
			})
		}
	}

	#[derive(Default)]
	struct ThrottledOnce {
		calls: AtomicUsize,
	}
	impl RenewalClient for ThrottledOnce {
		fn renew(&self) -> RenewalFuture<'_> {
			let call = self.calls.fetch_add(1, Ordering::SeqCst);

			Box::pin(async move {
				if call == 0 {
					return Err(RenewalError::from(TransientError::Endpoint {
						message: "slow down".into(),
						status: Some(503),
						retry_after: Some(Duration::milliseconds(200)),
					}));
				}

				Ok(AccessCredential::new("after-throttle"))
			})
		}
	}

	fn coordinator<R>(renewal: R) -> RefreshCoordinator<R>
	where
		R: RenewalClient,
	{
		RefreshCoordinator::new(renewal, Arc::new(CredentialStore::new()))
	}

	fn start(
		coordinator: &RefreshCoordinator<impl RenewalClient>,
		stale: Option<&AccessCredential>,
	) -> u64 {
		match coordinator.enter(stale) {
			Entry::Drive(generation) => generation,
			_ => panic!("Caller should become the renewal driver."),
		}
	}

	fn park(
		coordinator: &RefreshCoordinator<impl RenewalClient>,
		stale: Option<&AccessCredential>,
	) -> oneshot::Receiver<Settlement> {
		match coordinator.enter(stale) {
			Entry::Wait(receiver) => receiver,
			_ => panic!("Caller should queue behind the in-flight renewal."),
		}
	}

	#[test]
	fn waiters_are_released_in_arrival_order_after_store_update() {
		let coordinator = coordinator(FixedRenewal("unused"));
		let generation = start(&coordinator, None);

		assert_eq!(coordinator.phase(), RefreshPhase::Refreshing);

		let mut receivers: Vec<_> = (0..3).map(|_| park(&coordinator, None)).collect();

		assert_eq!(coordinator.pending_waiters(), 3);

		let fresh = AccessCredential::new("fresh");
		let order = coordinator
			.settle_success(generation, &fresh)
			.expect("Renewal should settle in the same generation.");

		assert_eq!(order, vec![0, 1, 2]);
		assert_eq!(coordinator.phase(), RefreshPhase::Idle);
		assert_eq!(coordinator.store().get(), Some(fresh.clone()));

		for receiver in &mut receivers {
			let settled = receiver
				.try_recv()
				.expect("Waiter should be settled.")
				.expect("Waiter should receive the fresh credential.");

			assert_eq!(settled, fresh);
		}
	}

	#[test]
	fn failure_clears_store_rejects_waiters_and_redirects_once() {
		let redirects = Arc::new(AtomicUsize::new(0));
		let counter = redirects.clone();
		let coordinator = coordinator(FixedRenewal("unused")).with_login_redirect(Arc::new(
			move |_: &RenewalError| {
				counter.fetch_add(1, Ordering::SeqCst);
			},
		));
		let stale = AccessCredential::new("stale");

		coordinator.store().replace(stale.clone());

		let generation = start(&coordinator, Some(&stale));
		let mut first = park(&coordinator, Some(&stale));
		let mut second = park(&coordinator, Some(&stale));
		let order = coordinator
			.settle_failure(
				generation,
				Arc::new(RenewalError::Rejected { status: 401, failure: None }),
			)
			.expect("Renewal should settle in the same generation.");

		assert_eq!(order, vec![0, 1]);
		assert!(coordinator.store().is_empty());
		assert_eq!(redirects.load(Ordering::SeqCst), 1);

		for receiver in [&mut first, &mut second] {
			let err = receiver
				.try_recv()
				.expect("Waiter should be settled.")
				.expect_err("Waiter should observe the renewal failure.");

			assert!(matches!(*err, RenewalError::Rejected { status: 401, .. }));
		}
	}

	#[test]
	fn newer_credential_in_store_short_circuits_renewal() {
		let coordinator = coordinator(FixedRenewal("unused"));
		let stale = AccessCredential::new("stale");

		coordinator.store().replace(AccessCredential::new("already-renewed"));

		match coordinator.enter(Some(&stale)) {
			Entry::Ready(credential) => assert_eq!(credential.expose(), "already-renewed"),
			_ => panic!("A newer credential should be returned without renewing."),
		}

		assert_eq!(coordinator.phase(), RefreshPhase::Idle);
	}

	#[test]
	fn cancelled_waiter_does_not_block_the_rest() {
		let coordinator = coordinator(FixedRenewal("unused"));
		let generation = start(&coordinator, None);

		drop(park(&coordinator, None));

		let mut kept = park(&coordinator, None);
		let order = coordinator
			.settle_success(generation, &AccessCredential::new("fresh"))
			.expect("Renewal should settle in the same generation.");

		assert_eq!(order, vec![0, 1]);
		assert!(kept.try_recv().expect("Kept waiter should be settled.").is_ok());
	}

	#[test]
	fn settlement_after_invalidation_leaves_store_untouched() {
		let coordinator = coordinator(FixedRenewal("unused"));
		let generation = start(&coordinator, None);

		assert!(coordinator.invalidate().is_none());
		assert!(coordinator.settle_success(generation, &AccessCredential::new("late")).is_none());
		assert!(coordinator.store().is_empty());
		assert_eq!(coordinator.phase(), RefreshPhase::Refreshing);
	}

	#[tokio::test]
	async fn invalidation_discards_in_flight_renewal() {
		let redirects = Arc::new(AtomicUsize::new(0));
		let counter = redirects.clone();
		let coordinator = Arc::new(coordinator(SlowRenewal).with_login_redirect(Arc::new(
			move |_: &RenewalError| {
				counter.fetch_add(1, Ordering::SeqCst);
			},
		)));
		let driver = {
			let coordinator = coordinator.clone();

			tokio::spawn(async move { coordinator.acquire(None).await })
		};

		while coordinator.phase() != RefreshPhase::Refreshing {
			tokio::task::yield_now().await;
		}

		coordinator.invalidate();
		coordinator.settled().await;

		let err = driver
			.await
			.expect("Driver task should not panic.")
			.expect_err("A renewal that outlived the session should be discarded.");

		assert!(
			matches!(err, Error::Renewal(ref cause) if matches!(**cause, RenewalError::Invalidated))
		);
		assert!(coordinator.store().is_empty());
		assert_eq!(coordinator.phase(), RefreshPhase::Idle);
		assert_eq!(redirects.load(Ordering::SeqCst), 0);

		let renewed = coordinator.acquire(None).await.expect("A later renewal should succeed.");

		assert_eq!(coordinator.store().get(), Some(renewed));
	}

	#[tokio::test]
	async fn dropped_driver_abandons_waiters() {
		let coordinator = Arc::new(coordinator(PendingRenewal));
		let driver = {
			let coordinator = coordinator.clone();

			tokio::spawn(async move { coordinator.acquire(None).await })
		};

		while coordinator.phase() != RefreshPhase::Refreshing {
			tokio::task::yield_now().await;
		}

		let waiter = {
			let coordinator = coordinator.clone();

			tokio::spawn(async move { coordinator.acquire(None).await })
		};

		while coordinator.pending_waiters() == 0 {
			tokio::task::yield_now().await;
		}

		driver.abort();

		let err = waiter
			.await
			.expect("Waiter task should not panic.")
			.expect_err("Waiter should observe the abandoned renewal.");

		assert!(matches!(err, Error::Renewal(ref cause) if matches!(**cause, RenewalError::Abandoned)));
		assert_eq!(coordinator.phase(), RefreshPhase::Idle);
	}

	#[tokio::test]
	async fn successful_drive_updates_store_and_metrics() {
		let coordinator = coordinator(FixedRenewal("renewed"));
		let credential = coordinator.acquire(None).await.expect("Renewal should succeed.");

		assert_eq!(credential.expose(), "renewed");
		assert_eq!(coordinator.store().get(), Some(credential));
		assert_eq!(coordinator.metrics().attempts(), 1);
		assert_eq!(coordinator.metrics().successes(), 1);
	}

	#[tokio::test]
	async fn retry_waits_at_least_the_upstream_hint() {
		let coordinator = coordinator(ThrottledOnce::default()).with_retry_policy(RetryPolicy {
			max_attempts: 2,
			base_backoff: Duration::milliseconds(10),
			max_jitter: Duration::ZERO,
		});
		let started = Instant::now();
		let credential = coordinator.acquire(None).await.expect("Second attempt should succeed.");

		assert_eq!(credential.expose(), "after-throttle");
		assert!(started.elapsed() >= std::time::Duration::from_millis(200));
		assert_eq!(coordinator.metrics().attempts(), 2);
	}
}
