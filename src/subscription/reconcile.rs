//! Reconciliation pass: list remote subscriptions, delete broken ones, create missing ones.

// std
use std::collections::HashSet;
// self
use crate::{
	_prelude::*,
	api::ApiClient,
	bus::EventBus,
	error::{SubscriptionError, TransientError},
	http::HttpTransport,
	obs::{self, OpKind, OpOutcome, OpSpan},
	subscription::{
		DesiredSubscription, RemoteSubscription, SUBSCRIPTIONS_PATH, SubscriptionList,
		SubscriptionStatus, WebhookTransport,
	},
};

/// Lifecycle of the reconciler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReconcileState {
	/// No pass has completed, or the last list call failed.
	Uninitialized,
	/// Fetching the remote subscription list.
	Listing,
	/// Deleting broken and creating missing subscriptions.
	Reconciling,
	/// Last pass finished.
	Steady,
}

/// What one pass changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
	/// Remote ids deleted because their status could not recover.
	pub deleted: Vec<String>,
	/// Event types created during this pass.
	pub created: Vec<String>,
	/// Event types whose create call failed.
	pub failed: Vec<String>,
	/// Desired event types left alone because a broken subscription for them was removed
	/// during this pass; the next pass creates them.
	pub deferred: Vec<String>,
	/// Remote entries left alone (pending or unknown status).
	pub ignored: usize,
}
impl ReconcileReport {
	/// `true` when the pass issued no create or delete calls.
	pub fn is_noop(&self) -> bool {
		self.deleted.is_empty() && self.created.is_empty() && self.failed.is_empty()
	}
}

/// Drives the desired subscription table towards the platform's state.
pub struct Reconciler<C>
where
	C: ?Sized + HttpTransport,
{
	api: Arc<ApiClient<C>>,
	bus: Arc<EventBus>,
	transport: WebhookTransport,
	desired: Vec<DesiredSubscription>,
	state: Mutex<ReconcileState>,
	tracked: RwLock<BTreeMap<String, RemoteSubscription>>,
	pass_guard: AsyncMutex<()>,
}
impl<C> Reconciler<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a reconciler in [`ReconcileState::Uninitialized`].
	pub fn new(
		api: Arc<ApiClient<C>>,
		bus: Arc<EventBus>,
		transport: WebhookTransport,
		desired: Vec<DesiredSubscription>,
	) -> Self {
		Self {
			api,
			bus,
			transport,
			desired,
			state: Mutex::new(ReconcileState::Uninitialized),
			tracked: Default::default(),
			pass_guard: AsyncMutex::new(()),
		}
	}

	/// Current state.
	pub fn state(&self) -> ReconcileState {
		*self.state.lock()
	}

	/// Enabled subscriptions seen by the last list call, keyed by event type.
	pub fn tracked(&self) -> BTreeMap<String, RemoteSubscription> {
		self.tracked.read().clone()
	}

	/// Runs a full pass. Concurrent callers queue up and each gets its own pass.
	pub async fn reconcile(&self) -> Result<ReconcileReport> {
		const KIND: OpKind = OpKind::Reconcile;

		let span = OpSpan::new(KIND, "reconcile");

		obs::record_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.run_pass()).await;

		match &result {
			Ok(report) => {
				tracing::info!(
					deleted = report.deleted.len(),
					created = report.created.len(),
					failed = report.failed.len(),
					ignored = report.ignored,
					"subscriptions reconciled"
				);
				obs::record_outcome(KIND, OpOutcome::Success);
			},
			Err(e) => {
				tracing::error!(error = %e, "subscription reconciliation aborted");
				obs::record_outcome(KIND, OpOutcome::Failure);
			},
		}

		result
	}

	async fn run_pass(&self) -> Result<ReconcileReport> {
		let _pass = self.pass_guard.lock().await;

		self.set_state(ReconcileState::Listing);

		let remote = match self.list().await {
			Ok(remote) => remote,
			Err(e) => {
				self.set_state(ReconcileState::Uninitialized);

				return Err(SubscriptionError::List { source: Box::new(e) }.into());
			},
		};
		let mut report = ReconcileReport::default();
		let mut broken_types = HashSet::new();

		self.set_state(ReconcileState::Reconciling);
		self.tracked.write().clear();

		for subscription in remote {
			match subscription.status {
				status if status.is_broken() => {
					broken_types.insert(subscription.event_type);

					if self.delete(&subscription.id).await {
						report.deleted.push(subscription.id);
					}
				},
				SubscriptionStatus::Enabled => {
					self.bus.ensure_topic(&subscription.event_type);
					self.tracked.write().insert(subscription.event_type.clone(), subscription);
				},
				_ => report.ignored += 1,
			}
		}

		for desired in &self.desired {
			if self.tracked.read().contains_key(&desired.event_type) {
				continue;
			}
			if broken_types.contains(&desired.event_type) {
				tracing::info!(event_type = %desired.event_type, "recreation deferred to the next pass");
				report.deferred.push(desired.event_type.clone());

				continue;
			}

			if self.create(desired).await {
				report.created.push(desired.event_type.clone());
			} else {
				report.failed.push(desired.event_type.clone());
			}
		}

		self.set_state(ReconcileState::Steady);

		Ok(report)
	}

	async fn list(&self) -> Result<Vec<RemoteSubscription>> {
		let value = self.api.get(SUBSCRIPTIONS_PATH, &[]).await?;
		let list: SubscriptionList = serde_path_to_error::deserialize(value)
			.map_err(|source| TransientError::ResponseParse { source, status: None })?;

		Ok(list.data)
	}

	async fn delete(&self, id: &str) -> bool {
		match self.api.delete(SUBSCRIPTIONS_PATH, &[("id", id)]).await {
			Ok(_) => {
				tracing::info!(id, "deleted broken subscription");

				true
			},
			Err(e) => {
				let e = SubscriptionError::Delete { id: id.to_owned(), source: Box::new(e) };

				tracing::warn!(error = %e, "subscription delete failed");

				false
			},
		}
	}

	async fn create(&self, desired: &DesiredSubscription) -> bool {
		let body = self.transport.create_body(desired);

		match self.api.post(SUBSCRIPTIONS_PATH, &[], &body).await {
			Ok(_) => {
				self.bus.ensure_topic(&desired.event_type);

				tracing::info!(event_type = %desired.event_type, "created subscription");

				true
			},
			Err(e) => {
				let e = SubscriptionError::Create {
					event_type: desired.event_type.clone(),
					source: Box::new(e),
				};

				tracing::warn!(error = %e, "subscription create failed");

				false
			},
		}
	}

	fn set_state(&self, state: ReconcileState) {
		*self.state.lock() = state;
	}
}
impl<C> Debug for Reconciler<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Reconciler")
			.field("state", &self.state())
			.field("desired", &self.desired.len())
			.field("tracked", &self.tracked.read().len())
			.finish()
	}
}
