//! Desired and remote EventSub subscription models.

mod reconcile;

pub use reconcile::*;

// self
use crate::_prelude::*;

/// API path for listing, creating, and deleting subscriptions.
pub const SUBSCRIPTIONS_PATH: &str = "/eventsub/subscriptions";

/// Event types subscribed with a `broadcaster_user_id` condition.
pub const BROADCASTER_EVENT_TYPES: [&str; 9] = [
	"channel.update",
	"channel.follow",
	"channel.subscribe",
	"channel.subscription.gift",
	"channel.subscription.message",
	"channel.cheer",
	"channel.channel_points_custom_reward_redemption.add",
	"stream.online",
	"stream.offline",
];

/// Event type subscribed with a `to_broadcaster_user_id` condition.
pub const RAID_EVENT_TYPE: &str = "channel.raid";

/// One entry of the static subscription table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesiredSubscription {
	/// Event type, for example `stream.online`.
	pub event_type: String,
	/// Subscription version.
	pub version: String,
	/// Condition object sent verbatim.
	pub condition: Value,
}
impl DesiredSubscription {
	/// Version-`1` subscription with the given condition.
	pub fn new(event_type: impl Into<String>, condition: Value) -> Self {
		Self { event_type: event_type.into(), version: "1".into(), condition }
	}

	/// Default table for a broadcaster: every channel/stream event the relay forwards.
	pub fn defaults_for(broadcaster_id: &str) -> Vec<Self> {
		let mut desired = BROADCASTER_EVENT_TYPES
			.iter()
			.map(|event_type| {
				Self::new(*event_type, serde_json::json!({ "broadcaster_user_id": broadcaster_id }))
			})
			.collect::<Vec<_>>();

		desired.insert(
			6,
			Self::new(RAID_EVENT_TYPE, serde_json::json!({ "to_broadcaster_user_id": broadcaster_id })),
		);

		desired
	}
}

/// Status reported by the platform for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
	/// Delivering notifications.
	Enabled,
	/// The callback never answered the challenge correctly.
	WebhookCallbackVerificationFailed,
	/// Too many failed deliveries.
	NotificationFailuresExceeded,
	/// Challenge not answered yet.
	WebhookCallbackVerificationPending,
	/// Any status the relay does not act on.
	#[serde(other)]
	Other,
}
impl SubscriptionStatus {
	/// Statuses that can never recover and must be deleted.
	pub const fn is_broken(self) -> bool {
		matches!(
			self,
			SubscriptionStatus::WebhookCallbackVerificationFailed
				| SubscriptionStatus::NotificationFailuresExceeded
		)
	}
}

/// Subscription as listed by the platform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteSubscription {
	/// Platform-assigned identifier.
	pub id: String,
	/// Event type.
	#[serde(rename = "type")]
	pub event_type: String,
	/// Delivery status.
	pub status: SubscriptionStatus,
	/// Condition object.
	#[serde(default)]
	pub condition: Value,
	/// Subscription version.
	#[serde(default)]
	pub version: String,
	/// Cost counted against the client's subscription budget.
	#[serde(default)]
	pub cost: u64,
	/// Creation timestamp as reported.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub created_at: Option<String>,
	/// Transport object as reported.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transport: Option<Value>,
}

/// Page returned by the list endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct SubscriptionList {
	/// Subscriptions on this page.
	#[serde(default)]
	pub data: Vec<RemoteSubscription>,
}

/// Webhook transport sent with every create request.
#[derive(Clone, PartialEq, Eq)]
pub struct WebhookTransport {
	/// Public callback URL (`https://<host>/eventsub`).
	pub callback: Url,
	/// Shared HMAC secret.
	pub secret: String,
}
impl WebhookTransport {
	/// Create request body for `desired`.
	pub fn create_body(&self, desired: &DesiredSubscription) -> Value {
		serde_json::json!({
			"type": desired.event_type,
			"version": desired.version,
			"condition": desired.condition,
			"transport": {
				"method": "webhook",
				"callback": self.callback.as_str(),
				"secret": self.secret,
			},
		})
	}
}
impl Debug for WebhookTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("WebhookTransport")
			.field("callback", &self.callback.as_str())
			.field("secret", &"<redacted>")
			.finish()
	}
}
