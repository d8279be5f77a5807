//! Inbound EventSub deliveries: signature verification and dispatch by message type.
//!
//! Nothing in a delivery body is looked at before [`verify`] accepted it. Once verified, the
//! `Twitch-Eventsub-Message-Type` header decides what happens:
//!
//! - `notification`: the event is published on the [`EventBus`] under its subscription type.
//! - `webhook_callback_verification`: the `challenge` string is echoed back.
//! - `revocation`: logged only.
//! - anything else: logged as unknown and acknowledged.

pub mod signature;

// crates.io
use axum::http::{HeaderMap, StatusCode};
// self
use crate::{
	_prelude::*,
	bus::EventBus,
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Delivery id header.
pub const MESSAGE_ID_HEADER: &str = "twitch-eventsub-message-id";
/// Delivery timestamp header.
pub const MESSAGE_TIMESTAMP_HEADER: &str = "twitch-eventsub-message-timestamp";
/// `sha256=<hex>` signature header.
pub const MESSAGE_SIGNATURE_HEADER: &str = "twitch-eventsub-message-signature";
/// Message type header.
pub const MESSAGE_TYPE_HEADER: &str = "twitch-eventsub-message-type";

/// Message types carried by the type header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageType {
	/// Event notification.
	Notification,
	/// Callback ownership challenge.
	Verification,
	/// The platform revoked a subscription.
	Revocation,
	/// Anything else, kept verbatim for logging.
	Unknown(String),
}
impl MessageType {
	/// Maps a header value to a message type.
	pub fn parse(raw: &str) -> Self {
		match raw {
			"notification" => MessageType::Notification,
			"webhook_callback_verification" => MessageType::Verification,
			"revocation" => MessageType::Revocation,
			other => MessageType::Unknown(other.to_owned()),
		}
	}
}

/// Outcome of one delivery, mapped to an HTTP response by the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookReply {
	/// 204 with an empty body.
	NoContent,
	/// 200 with the challenge as a `text/plain` body.
	Challenge(String),
	/// 403: signature missing or wrong.
	Forbidden,
	/// 400: verified body that cannot be understood.
	BadRequest,
}
impl WebhookReply {
	/// HTTP status for this reply.
	pub fn status(&self) -> StatusCode {
		match self {
			WebhookReply::NoContent => StatusCode::NO_CONTENT,
			WebhookReply::Challenge(_) => StatusCode::OK,
			WebhookReply::Forbidden => StatusCode::FORBIDDEN,
			WebhookReply::BadRequest => StatusCode::BAD_REQUEST,
		}
	}
}

#[derive(Debug, Deserialize)]
struct SubscriptionInfo {
	#[serde(rename = "type")]
	event_type: String,
	#[serde(default)]
	status: Option<String>,
	#[serde(default)]
	condition: Value,
}

#[derive(Debug, Deserialize)]
struct NotificationBody {
	subscription: SubscriptionInfo,
	#[serde(default)]
	event: Value,
}

#[derive(Debug, Deserialize)]
struct RevocationBody {
	subscription: SubscriptionInfo,
}

#[derive(Debug, Deserialize)]
struct ChallengeBody {
	challenge: String,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers.get(name).and_then(|value| value.to_str().ok())
}

/// Checks the delivery signature against `secret`.
///
/// Missing headers reject; the comparison runs in constant time.
pub fn verify(headers: &HeaderMap, body: &[u8], secret: &str) -> bool {
	let (Some(id), Some(timestamp), Some(provided)) = (
		header(headers, MESSAGE_ID_HEADER),
		header(headers, MESSAGE_TIMESTAMP_HEADER),
		header(headers, MESSAGE_SIGNATURE_HEADER),
	) else {
		return false;
	};
	let Some(expected) = signature::sign(secret, id, timestamp, body) else {
		return false;
	};

	signature::constant_time_eq(&expected, provided)
}

/// Verifies and dispatches one delivery.
pub fn dispatch(headers: &HeaderMap, body: &[u8], secret: &str, bus: &EventBus) -> WebhookReply {
	const KIND: OpKind = OpKind::Webhook;

	let span = OpSpan::new(KIND, "dispatch");

	obs::record_outcome(KIND, OpOutcome::Attempt);

	let reply = span.in_scope(|| {
		if !verify(headers, body, secret) {
			tracing::warn!(error = %Error::SignatureMismatch, "rejected webhook delivery");

			return WebhookReply::Forbidden;
		}

		let message_type = MessageType::parse(header(headers, MESSAGE_TYPE_HEADER).unwrap_or_default());

		route(message_type, body, bus)
	});

	match reply {
		WebhookReply::NoContent | WebhookReply::Challenge(_) =>
			obs::record_outcome(KIND, OpOutcome::Success),
		WebhookReply::Forbidden | WebhookReply::BadRequest =>
			obs::record_outcome(KIND, OpOutcome::Failure),
	}

	reply
}

fn route(message_type: MessageType, body: &[u8], bus: &EventBus) -> WebhookReply {
	match message_type {
		MessageType::Notification => match parse::<NotificationBody>(body) {
			Some(notification) => {
				bus.publish(&notification.subscription.event_type, notification.event);

				WebhookReply::NoContent
			},
			None => WebhookReply::BadRequest,
		},
		MessageType::Verification => match parse::<ChallengeBody>(body) {
			Some(challenge) => {
				tracing::info!("answered webhook callback verification");

				WebhookReply::Challenge(challenge.challenge)
			},
			None => WebhookReply::BadRequest,
		},
		MessageType::Revocation => match parse::<RevocationBody>(body) {
			Some(revocation) => {
				let subscription = revocation.subscription;

				tracing::warn!(
					event_type = %subscription.event_type,
					status = subscription.status.as_deref().unwrap_or("unknown"),
					condition = %subscription.condition,
					"subscription revoked"
				);

				WebhookReply::NoContent
			},
			None => WebhookReply::BadRequest,
		},
		MessageType::Unknown(raw) => {
			tracing::warn!(message_type = %raw, "unknown message type");

			WebhookReply::NoContent
		},
	}
}

fn parse<T>(body: &[u8]) -> Option<T>
where
	T: for<'de> Deserialize<'de>,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	match serde_path_to_error::deserialize(&mut deserializer) {
		Ok(value) => Some(value),
		Err(e) => {
			tracing::warn!(path = %e.path(), error = %e.inner(), "malformed webhook body");

			None
		},
	}
}
