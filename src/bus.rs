//! In-process fan-out of platform events.
//!
//! Topics are keyed by event type and created lazily; they are never removed. Delivery is
//! synchronous and follows subscription order. After local subscribers ran, every event is
//! forwarded as an [`Envelope`] to the optional [`BroadcastSink`].

pub mod sink;

pub use sink::{BroadcastSink, SocketHub};

// std
use std::sync::{
	Weak,
	atomic::{AtomicU64, Ordering},
};
// self
use crate::_prelude::*;

/// Reserved event type under which chat messages are published.
pub const CHAT_EVENT_TYPE: &str = "channel.chat";

/// Subscriber callback invoked with each event payload.
pub type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

type Topics = RwLock<HashMap<String, Vec<(u64, Callback)>>>;

/// `{key, payload}` frame forwarded to broadcast sinks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
	/// Event type.
	pub key: String,
	/// Event body as delivered by the platform.
	pub payload: Value,
}

/// Inbound chat message handed over by an external chat client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
	/// Channel the message was posted in.
	pub channel: String,
	/// Sender display name.
	pub display_name: String,
	/// Message text.
	pub message: String,
	/// Set when the relay's own chat identity sent the message.
	#[serde(default)]
	pub sender_is_self: bool,
}

/// Per-event-type subscriber registry.
pub struct EventBus {
	topics: Arc<Topics>,
	next_id: AtomicU64,
	sink: Option<Arc<dyn BroadcastSink>>,
}
impl EventBus {
	/// Creates a bus without a broadcast sink.
	pub fn new() -> Self {
		Self { topics: Default::default(), next_id: AtomicU64::new(1), sink: None }
	}

	/// Attaches the sink that receives every published envelope.
	pub fn with_sink(mut self, sink: Arc<dyn BroadcastSink>) -> Self {
		self.sink = Some(sink);

		self
	}

	/// Registers `callback` for `event_type`, creating the topic when needed.
	pub fn subscribe<F>(&self, event_type: &str, callback: F) -> SubscriptionHandle
	where
		F: 'static + Fn(&Value) + Send + Sync,
	{
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);

		self.topics
			.write()
			.entry(event_type.to_owned())
			.or_default()
			.push((id, Arc::new(callback)));

		SubscriptionHandle {
			topics: Arc::downgrade(&self.topics),
			event_type: event_type.to_owned(),
			id,
		}
	}

	/// Creates the topic for `event_type` if it does not exist yet.
	pub fn ensure_topic(&self, event_type: &str) {
		if self.topics.read().contains_key(event_type) {
			return;
		}

		self.topics.write().entry(event_type.to_owned()).or_default();
	}

	/// Returns `true` once a topic exists for `event_type`.
	pub fn has_topic(&self, event_type: &str) -> bool {
		self.topics.read().contains_key(event_type)
	}

	/// Number of live subscribers for `event_type`.
	pub fn subscriber_count(&self, event_type: &str) -> usize {
		self.topics.read().get(event_type).map_or(0, Vec::len)
	}

	/// Delivers `payload` to every subscriber of `event_type`, then to the sink.
	///
	/// Callbacks run without the registry lock held, so they may subscribe or unsubscribe.
	pub fn publish(&self, event_type: &str, payload: Value) {
		let callbacks = self
			.topics
			.read()
			.get(event_type)
			.map(|subscribers| subscribers.iter().map(|(_, cb)| cb.clone()).collect::<Vec<_>>())
			.unwrap_or_default();

		tracing::debug!(event_type, subscribers = callbacks.len(), "publishing event");

		for callback in callbacks {
			callback(&payload);
		}

		if let Some(sink) = &self.sink {
			sink.broadcast(&Envelope { key: event_type.to_owned(), payload });
		}
	}

	/// Publishes a chat message under [`CHAT_EVENT_TYPE`] unless the relay sent it itself.
	///
	/// Returns `false` when the message was dropped.
	pub fn publish_chat(&self, message: &ChatMessage) -> bool {
		if message.sender_is_self {
			return false;
		}

		self.publish(
			CHAT_EVENT_TYPE,
			serde_json::json!({ "user": message.display_name, "message": message.message }),
		);

		true
	}
}
impl Default for EventBus {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for EventBus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("EventBus")
			.field("topics", &self.topics.read().keys().collect::<Vec<_>>())
			.field("sink", &self.sink.is_some())
			.finish()
	}
}

/// Removes exactly one subscription when [`SubscriptionHandle::unsubscribe`] is called.
///
/// Dropping the handle keeps the subscription alive.
#[derive(Debug)]
pub struct SubscriptionHandle {
	topics: Weak<Topics>,
	event_type: String,
	id: u64,
}
impl SubscriptionHandle {
	/// Event type this handle is registered for.
	pub fn event_type(&self) -> &str {
		&self.event_type
	}

	/// Removes the callback; returns `false` if it was already gone.
	pub fn unsubscribe(self) -> bool {
		let Some(topics) = self.topics.upgrade() else {
			return false;
		};
		let mut topics = topics.write();
		let Some(subscribers) = topics.get_mut(&self.event_type) else {
			return false;
		};
		let before = subscribers.len();

		subscribers.retain(|(id, _)| *id != self.id);

		subscribers.len() != before
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn ensure_topic_is_lazy_and_idempotent() {
		let bus = EventBus::new();

		assert!(!bus.has_topic("stream.online"));

		bus.ensure_topic("stream.online");
		bus.ensure_topic("stream.online");

		assert!(bus.has_topic("stream.online"));
		assert_eq!(bus.subscriber_count("stream.online"), 0);
	}

	#[test]
	fn chat_message_reads_camel_case() {
		let message: ChatMessage = serde_json::from_value(serde_json::json!({
			"channel": "#c",
			"displayName": "Viewer",
			"message": "hi",
			"senderIsSelf": true
		}))
		.expect("Chat message should deserialize.");

		assert!(message.sender_is_self);
		assert_eq!(message.display_name, "Viewer");
	}
}
