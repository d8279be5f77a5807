#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use eventsub_relay::{
	auth::{CredentialRecord, GrantType},
	credentials::{CredentialManager, OAuthClient},
	http::{HttpTransport, TransportFuture},
	oauth2::{
		HttpClientError, HttpRequest, HttpResponse,
		http::{StatusCode, header::AUTHORIZATION},
	},
	store::{CredentialSnapshot, CredentialStore, MemoryStore},
	url::{Url, form_urlencoded},
};
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};

pub const CLIENT_ID: &str = "client";
pub const CLIENT_SECRET: &str = "secret";
pub const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
pub const API_URL: &str = "https://api.twitch.tv/helix";
pub const STORE_KEY: &str = "id.twitch.tv";

#[derive(Debug, thiserror::Error)]
#[error("Scripted transport has no response for {0}.")]
pub struct Unscripted(pub String);

/// Request as observed by [`FakeTransport`].
#[derive(Clone, Debug)]
pub struct Recorded {
	pub method: String,
	pub url: Url,
	pub authorization: Option<String>,
	pub client_id: Option<String>,
	pub body: String,
}
impl Recorded {
	pub fn form(&self, name: &str) -> Option<String> {
		form_urlencoded::parse(self.body.as_bytes())
			.find(|(key, _)| key == name)
			.map(|(_, value)| value.into_owned())
	}

	pub fn query(&self, name: &str) -> Option<String> {
		self.url.query_pairs().find(|(key, _)| key == name).map(|(_, value)| value.into_owned())
	}

	pub fn json(&self) -> serde_json::Value {
		serde_json::from_str(&self.body).expect("Recorded body should be JSON.")
	}
}

type Responder = dyn Fn(&Recorded) -> Option<(u16, String)> + Send + Sync;

/// Transport answering from a closure or a FIFO script and recording every request.
pub struct FakeTransport {
	responder: Box<Responder>,
	queue: Mutex<VecDeque<(u16, String)>>,
	requests: Mutex<Vec<Recorded>>,
	delay: Option<StdDuration>,
	calls: AtomicUsize,
}
impl FakeTransport {
	pub fn scripted<I>(responses: I) -> Self
	where
		I: IntoIterator<Item = (u16, &'static str)>,
	{
		Self {
			responder: Box::new(|_| None),
			queue: Mutex::new(
				responses.into_iter().map(|(status, body)| (status, body.to_owned())).collect(),
			),
			requests: Mutex::default(),
			delay: None,
			calls: AtomicUsize::new(0),
		}
	}

	pub fn routed<F>(responder: F) -> Self
	where
		F: 'static + Fn(&Recorded) -> Option<(u16, String)> + Send + Sync,
	{
		Self {
			responder: Box::new(responder),
			queue: Mutex::default(),
			requests: Mutex::default(),
			delay: None,
			calls: AtomicUsize::new(0),
		}
	}

	pub fn with_delay(mut self, delay: StdDuration) -> Self {
		self.delay = Some(delay);

		self
	}

	pub fn requests(&self) -> Vec<Recorded> {
		self.requests.lock().clone()
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl HttpTransport for FakeTransport {
	type TransportError = Unscripted;

	fn execute(&self, request: HttpRequest) -> TransportFuture<'_, Self::TransportError> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}

			let header = |name: &str| {
				request.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_owned)
			};
			let recorded = Recorded {
				method: request.method().to_string(),
				url: Url::parse(&request.uri().to_string()).expect("Request URI should be absolute."),
				authorization: header(AUTHORIZATION.as_str()),
				client_id: header("client-id"),
				body: String::from_utf8_lossy(request.body()).into_owned(),
			};
			let answer = (self.responder)(&recorded).or_else(|| self.queue.lock().pop_front());

			self.requests.lock().push(recorded.clone());

			let Some((status, body)) = answer else {
				return Err(HttpClientError::Reqwest(Box::new(Unscripted(format!(
					"{} {}",
					recorded.method, recorded.url
				)))));
			};
			let mut response = HttpResponse::new(body.into_bytes());

			*response.status_mut() =
				StatusCode::from_u16(status).expect("Scripted status should be valid.");

			Ok(response)
		})
	}
}

pub fn oauth_client() -> OAuthClient {
	OAuthClient::new(CLIENT_ID, CLIENT_SECRET, Url::parse(TOKEN_URL).expect("Token URL should parse."))
		.with_redirect_url(
			Url::parse("https://relay.example.com/twitch").expect("Redirect URL should parse."),
		)
}

pub fn record(grant: GrantType, token: &str, lifetime: Duration, refresh: Option<&str>) -> CredentialRecord {
	let now = OffsetDateTime::now_utc();
	let mut builder = CredentialRecord::builder(grant)
		.access_token(token)
		.issued_at(now - Duration::hours(2))
		.expires_at(now + lifetime);

	if let Some(refresh) = refresh {
		builder = builder.refresh_token(refresh);
	}

	builder.build().expect("Record fixture should build.")
}

pub async fn manager(
	transport: Arc<FakeTransport>,
	snapshot: CredentialSnapshot,
) -> (CredentialManager<FakeTransport>, Arc<MemoryStore>) {
	let store = Arc::new(MemoryStore::with_snapshot(STORE_KEY, snapshot));
	let manager = CredentialManager::load(
		transport,
		store.clone() as Arc<dyn CredentialStore>,
		oauth_client(),
	)
	.await;

	(manager, store)
}

/// Waits until the spawned snapshot writes reached `expected`.
pub async fn wait_for_saves(store: &MemoryStore, expected: usize) {
	for _ in 0..100 {
		if store.saves() >= expected {
			return;
		}

		tokio::time::sleep(StdDuration::from_millis(10)).await;
	}

	panic!("Store saw {} saves, expected {expected}.", store.saves());
}

/// Polls until the snapshot persisted under [`STORE_KEY`] satisfies `check`.
pub async fn wait_for_snapshot<F>(store: &MemoryStore, check: F) -> CredentialSnapshot
where
	F: Fn(&CredentialSnapshot) -> bool,
{
	for _ in 0..100 {
		if let Some(snapshot) = store.snapshot(STORE_KEY).filter(|s| check(s)) {
			return snapshot;
		}

		tokio::time::sleep(StdDuration::from_millis(10)).await;
	}

	panic!("Store never persisted the expected snapshot: {:?}.", store.snapshot(STORE_KEY));
}
