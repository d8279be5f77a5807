mod common;

// std
use std::sync::Arc;
// crates.io
use eventsub_relay::{
	api::ApiClient,
	auth::GrantType,
	bus::EventBus,
	error::{Error, SubscriptionError},
	subscription::{DesiredSubscription, ReconcileState, Reconciler, WebhookTransport},
	url::Url,
};
use serde_json::{Value, json};
use time::Duration;
// self
use common::*;

const BROADCASTER: &str = "1234";

fn remote(id: &str, event_type: &str, status: &str) -> Value {
	json!({
		"id": id,
		"type": event_type,
		"status": status,
		"version": "1",
		"cost": 1,
		"condition": { "broadcaster_user_id": BROADCASTER },
		"created_at": "2024-01-01T00:00:00Z",
		"transport": { "method": "webhook", "callback": "https://relay.example.com/eventsub" }
	})
}

fn all_enabled() -> Value {
	let data = DesiredSubscription::defaults_for(BROADCASTER)
		.iter()
		.enumerate()
		.map(|(i, desired)| remote(&format!("s{i}"), &desired.event_type, "enabled"))
		.collect::<Vec<_>>();

	json!({ "data": data })
}

async fn build(
	transport: Arc<FakeTransport>,
) -> (Reconciler<FakeTransport>, Arc<EventBus>) {
	let (manager, _) = manager(
		transport,
		vec![(
			GrantType::ClientCredentials,
			record(GrantType::ClientCredentials, "app-token", Duration::hours(1), None),
		)],
	)
	.await;
	let api = Arc::new(ApiClient::new(
		Arc::new(manager),
		Url::parse(API_URL).expect("API URL should parse."),
	));
	let bus = Arc::new(EventBus::new());
	let reconciler = Reconciler::new(
		api,
		bus.clone(),
		WebhookTransport {
			callback: Url::parse("https://relay.example.com/eventsub")
				.expect("Callback URL should parse."),
			secret: "hook-secret".into(),
		},
		DesiredSubscription::defaults_for(BROADCASTER),
	);

	(reconciler, bus)
}

#[tokio::test]
async fn matching_remote_state_is_idempotent() {
	let listing = all_enabled().to_string();
	let transport = Arc::new(FakeTransport::routed(move |request| {
		(request.method == "GET").then(|| (200, listing.clone()))
	}));
	let (reconciler, bus) = build(transport.clone()).await;

	assert_eq!(reconciler.state(), ReconcileState::Uninitialized);

	for _ in 0..2 {
		let report = reconciler.reconcile().await.expect("Reconciliation should succeed.");

		assert!(report.is_noop());
		assert_eq!(reconciler.state(), ReconcileState::Steady);
	}

	assert_eq!(reconciler.tracked().len(), 10);
	assert!(bus.has_topic("channel.raid"));
	assert!(transport.requests().iter().all(|request| request.method == "GET"));
	assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn empty_remote_state_creates_every_desired_subscription() {
	let transport = Arc::new(FakeTransport::routed(|request| match request.method.as_str() {
		"GET" => Some((200, r#"{"data":[]}"#.to_owned())),
		"POST" => Some((202, r#"{"data":[{"status":"webhook_callback_verification_pending"}]}"#.to_owned())),
		_ => None,
	}));
	let (reconciler, bus) = build(transport.clone()).await;
	let report = reconciler.reconcile().await.expect("Reconciliation should succeed.");

	assert_eq!(report.created.len(), 10);
	assert!(report.failed.is_empty());
	assert!(bus.has_topic("stream.online"));

	let creates =
		transport.requests().into_iter().filter(|r| r.method == "POST").collect::<Vec<_>>();
	let raid = creates
		.iter()
		.map(|r| r.json())
		.find(|body| body["type"] == "channel.raid")
		.expect("Raid subscription should be created.");

	assert_eq!(raid["version"], "1");
	assert_eq!(raid["condition"], json!({ "to_broadcaster_user_id": BROADCASTER }));
	assert_eq!(raid["transport"]["method"], "webhook");
	assert_eq!(raid["transport"]["callback"], "https://relay.example.com/eventsub");
	assert_eq!(raid["transport"]["secret"], "hook-secret");
	assert!(creates.iter().all(|r| r.client_id.as_deref() == Some(CLIENT_ID)));
	assert!(creates.iter().all(|r| r.authorization.as_deref() == Some("Bearer app-token")));
}

#[tokio::test]
async fn failures_exceeded_is_deleted_once_and_not_recreated() {
	let mut listing = all_enabled();
	let data = listing["data"].as_array_mut().expect("Listing should hold an array.");

	data.retain(|entry| entry["type"] != "stream.online");
	data.push(remote("broken-1", "stream.online", "notification_failures_exceeded"));
	data.push(remote("pending-1", "channel.ban", "webhook_callback_verification_pending"));

	let listing = listing.to_string();
	let transport = Arc::new(FakeTransport::routed(move |request| match request.method.as_str() {
		"GET" => Some((200, listing.clone())),
		"DELETE" => Some((204, String::new())),
		_ => None,
	}));
	let (reconciler, _) = build(transport.clone()).await;
	let report = reconciler.reconcile().await.expect("Reconciliation should succeed.");
	let requests = transport.requests();
	let deletes = requests.iter().filter(|r| r.method == "DELETE").collect::<Vec<_>>();

	assert_eq!(deletes.len(), 1);
	assert_eq!(deletes[0].query("id").as_deref(), Some("broken-1"));
	assert!(requests.iter().all(|r| r.method != "POST"));
	assert_eq!(report.deleted, vec!["broken-1".to_owned()]);
	assert_eq!(report.deferred, vec!["stream.online".to_owned()]);
	assert_eq!(report.ignored, 1);
	assert!(!reconciler.tracked().contains_key("stream.online"));
}

#[tokio::test]
async fn list_failure_returns_to_uninitialized_without_creates() {
	let transport = Arc::new(FakeTransport::routed(|request| {
		(request.method == "GET").then(|| (500, "upstream down".to_owned()))
	}));
	let (reconciler, _) = build(transport.clone()).await;
	let err = reconciler.reconcile().await.expect_err("List failure should abort the pass.");

	assert!(matches!(err, Error::Subscription(SubscriptionError::List { .. })));
	assert_eq!(reconciler.state(), ReconcileState::Uninitialized);
	assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn create_failures_are_reported_and_left_as_gaps() {
	let mut listing = all_enabled();

	listing["data"]
		.as_array_mut()
		.expect("Listing should hold an array.")
		.retain(|entry| entry["type"] != "channel.cheer");

	let listing = listing.to_string();
	let transport = Arc::new(FakeTransport::routed(move |request| match request.method.as_str() {
		"GET" => Some((200, listing.clone())),
		"POST" => Some((409, r#"{"message":"subscription already exists"}"#.to_owned())),
		_ => None,
	}));
	let (reconciler, _) = build(transport.clone()).await;
	let report = reconciler.reconcile().await.expect("Create failures should not abort the pass.");

	assert_eq!(report.failed, vec!["channel.cheer".to_owned()]);
	assert!(report.created.is_empty());
	assert_eq!(reconciler.state(), ReconcileState::Steady);
}
