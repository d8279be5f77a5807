mod common;

// std
use std::{net::SocketAddr, sync::Arc};
// crates.io
use eventsub_relay::{
	auth::{GrantType, TokenSecret},
	bus::{EventBus, SocketHub},
	server::{self, AppState},
	webhook::{self, signature},
};
use tokio::net::TcpListener;
// self
use common::*;

const SECRET: &str = "hook-secret";

async fn spawn(transport: Arc<FakeTransport>) -> (SocketAddr, AppState<FakeTransport>) {
	let (manager, _) = manager(transport, Vec::new()).await;
	let hub = Arc::new(SocketHub::new());
	let state = AppState {
		bus: Arc::new(EventBus::new().with_sink(hub.clone())),
		hub,
		credentials: Arc::new(manager),
		webhook_secret: TokenSecret::new(SECRET),
	};
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Loopback bind should succeed.");
	let addr = listener.local_addr().expect("Listener should expose its address.");
	let router = server::router(state.clone(), "twitch");

	tokio::spawn(server::serve(listener, router));

	(addr, state)
}

#[tokio::test]
async fn eventsub_answers_challenge_and_rejects_bad_signatures() {
	let (addr, _) = spawn(Arc::new(FakeTransport::scripted([]))).await;
	let client = reqwest::Client::new();
	let body = r#"{"challenge":"xyz123","subscription":{"type":"stream.online"}}"#;
	let signed = signature::sign(SECRET, "m-1", "2024-01-01T00:00:00Z", body.as_bytes())
		.expect("HMAC accepts any key.");
	let request = |signature: String| {
		client
			.post(format!("http://{addr}/eventsub"))
			.header(webhook::MESSAGE_ID_HEADER, "m-1")
			.header(webhook::MESSAGE_TIMESTAMP_HEADER, "2024-01-01T00:00:00Z")
			.header(webhook::MESSAGE_SIGNATURE_HEADER, signature)
			.header(webhook::MESSAGE_TYPE_HEADER, "webhook_callback_verification")
			.body(body)
	};
	let accepted = request(signed).send().await.expect("Webhook call should complete.");

	assert_eq!(accepted.status(), reqwest::StatusCode::OK);
	assert_eq!(
		accepted.headers().get(reqwest::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
		Some("text/plain")
	);
	assert_eq!(accepted.text().await.expect("Body should be readable."), "xyz123");

	let rejected =
		request("sha256=00".into()).send().await.expect("Webhook call should complete.");

	assert_eq!(rejected.status(), reqwest::StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn oauth_redirect_supplies_the_authorization_code() {
	let transport = Arc::new(FakeTransport::scripted([
		(400, r#"{"message":"Invalid authorization code"}"#),
		(200, r#"{"access_token":"user","refresh_token":"r","expires_in":3600}"#),
	]));
	let (addr, state) = spawn(transport.clone()).await;
	let client = reqwest::Client::new();
	let missing =
		client.get(format!("http://{addr}/twitch")).send().await.expect("Redirect should answer.");

	assert_eq!(missing.status(), reqwest::StatusCode::BAD_REQUEST);

	let rejected = client
		.get(format!("http://{addr}/twitch?code=bad"))
		.send()
		.await
		.expect("Redirect should answer.");

	assert_eq!(rejected.status(), reqwest::StatusCode::UNAUTHORIZED);

	let accepted = client
		.get(format!("http://{addr}/twitch?code=good&scope=channel%3Aread"))
		.send()
		.await
		.expect("Redirect should answer.");

	assert_eq!(accepted.status(), reqwest::StatusCode::OK);
	assert_eq!(transport.requests()[1].form("code").as_deref(), Some("good"));

	let cached = state
		.credentials
		.acquire(GrantType::AuthorizationCode)
		.await
		.expect("Authorized flow should now be cached.");

	assert_eq!(cached.expose(), "user");
	assert_eq!(transport.calls(), 2);
}
