//! Credential lifecycle: cached OAuth tokens per grant type, refreshed on demand.
//!
//! [`CredentialManager`] owns the credential map for one remote host. Acquisitions are
//! serialized per grant type by a singleflight guard so concurrent callers piggy-back on the
//! same in-flight token request instead of stampeding the token endpoint. Every successful
//! acquisition schedules a fire-and-forget snapshot write to the [`CredentialStore`]; writes
//! carry a generation number so a stale snapshot never lands after a newer one.

mod acquire;
mod request;

pub use request::TokenForm;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use oauth2::{AuthorizationCode, ClientId, ClientSecret, RedirectUrl, TokenUrl};
// self
use crate::{
	_prelude::*,
	auth::{CredentialRecord, GrantType},
	http::{HttpTransport, ReqwestHttpClient},
	store::{CredentialSnapshot, CredentialStore},
};

/// Manager specialized for the crate's default reqwest transport.
pub type ReqwestCredentialManager = CredentialManager<ReqwestHttpClient>;

/// Client registration used against the token endpoint.
#[derive(Clone, Debug)]
pub struct OAuthClient {
	/// OAuth client identifier.
	pub client_id: ClientId,
	/// OAuth client secret.
	pub client_secret: ClientSecret,
	/// Token endpoint.
	pub token_url: TokenUrl,
	/// Redirect URI registered for the authorization code flow.
	pub redirect_url: Option<RedirectUrl>,
}
impl OAuthClient {
	/// Creates a client registration for the provided token endpoint.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		token_url: Url,
	) -> Self {
		Self {
			client_id: ClientId::new(client_id.into()),
			client_secret: ClientSecret::new(client_secret.into()),
			token_url: TokenUrl::from_url(token_url),
			redirect_url: None,
		}
	}

	/// Sets the redirect URI sent alongside authorization codes.
	pub fn with_redirect_url(mut self, redirect: Url) -> Self {
		self.redirect_url = Some(RedirectUrl::from_url(redirect));

		self
	}

	/// Key under which the credential map for this host is persisted.
	pub fn store_key(&self) -> String {
		self.token_url.url().host_str().unwrap_or("default").to_owned()
	}

	/// `Basic base64(client_id:client_secret)` header value.
	pub fn basic_authorization(&self) -> String {
		let pair = format!("{}:{}", self.client_id.as_str(), self.client_secret.secret());

		format!("Basic {}", STANDARD.encode(pair))
	}
}

/// Obtains and refreshes access tokens for one remote host.
pub struct CredentialManager<C>
where
	C: ?Sized + HttpTransport,
{
	/// Transport used for token requests.
	pub http_client: Arc<C>,
	/// Durable snapshot store.
	pub store: Arc<dyn CredentialStore>,
	/// Client registration.
	pub client: OAuthClient,
	store_key: String,
	records: RwLock<BTreeMap<GrantType, CredentialRecord>>,
	authorization_code: Mutex<Option<AuthorizationCode>>,
	flow_guards: Mutex<HashMap<GrantType, Arc<AsyncMutex<()>>>>,
	generation: AtomicU64,
	written: Arc<AsyncMutex<u64>>,
}
impl<C> CredentialManager<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a manager with an empty credential map.
	pub fn new(
		http_client: impl Into<Arc<C>>,
		store: Arc<dyn CredentialStore>,
		client: OAuthClient,
	) -> Self {
		let store_key = client.store_key();

		Self {
			http_client: http_client.into(),
			store,
			client,
			store_key,
			records: Default::default(),
			authorization_code: Default::default(),
			flow_guards: Default::default(),
			generation: AtomicU64::new(0),
			written: Arc::new(AsyncMutex::new(0)),
		}
	}

	/// Creates a manager and restores the persisted credential map for the client's host.
	///
	/// A store failure is logged and the manager starts from an empty map.
	pub async fn load(
		http_client: impl Into<Arc<C>>,
		store: Arc<dyn CredentialStore>,
		client: OAuthClient,
	) -> Self {
		let manager = Self::new(http_client, store, client);
		let snapshot = match manager.store.load(&manager.store_key).await {
			Ok(snapshot) => snapshot.unwrap_or_default(),
			Err(e) => {
				tracing::warn!(host = %manager.store_key, error = %e, "failed to load credentials, starting empty");

				Vec::new()
			},
		};

		{
			let mut records = manager.records.write();

			for (grant, record) in snapshot {
				if grant != GrantType::RefreshToken {
					records.insert(grant, record);
				}
			}

			tracing::info!(host = %manager.store_key, records = records.len(), "credentials loaded");
		}

		manager
	}

	/// Key under which this manager persists its snapshot.
	pub fn store_key(&self) -> &str {
		&self.store_key
	}

	/// Returns a copy of the cached record for `grant`, if any.
	pub fn cached(&self, grant: GrantType) -> Option<CredentialRecord> {
		self.records.read().get(&grant).cloned()
	}

	/// Full credential map in persisted form.
	pub fn snapshot(&self) -> CredentialSnapshot {
		Self::collect(&self.records.read())
	}

	fn collect(records: &BTreeMap<GrantType, CredentialRecord>) -> CredentialSnapshot {
		records.iter().map(|(grant, record)| (*grant, record.clone())).collect()
	}

	/// Reports whether `grant` can be acquired without further user interaction.
	///
	/// Client credentials are always available; the authorization code flow becomes
	/// available once a code was supplied or a token for it is cached.
	pub fn is_authorized(&self, grant: GrantType) -> bool {
		match grant {
			GrantType::ClientCredentials => true,
			GrantType::AuthorizationCode =>
				self.authorization_code.lock().is_some() || self.records.read().contains_key(&grant),
			GrantType::RefreshToken => false,
		}
	}

	fn authorization_code(&self) -> Option<AuthorizationCode> {
		self.authorization_code.lock().clone()
	}

	fn set_authorization_code(&self, code: AuthorizationCode) {
		*self.authorization_code.lock() = Some(code);
	}

	fn replace(&self, record: CredentialRecord) {
		self.records.write().insert(record.grant_type, record);
		self.persist();
	}

	fn evict(&self, grant: GrantType) {
		let removed = self.records.write().remove(&grant).is_some();

		if removed {
			tracing::debug!(%grant, "evicted expired credential without refresh token");
			self.persist();
		}
	}

	/// Schedules a full snapshot write without waiting for it.
	fn persist(&self) {
		// Numbered under the read guard so generation order matches snapshot order.
		let (generation, snapshot) = {
			let records = self.records.read();

			(self.generation.fetch_add(1, Ordering::SeqCst) + 1, Self::collect(&records))
		};
		let store = self.store.clone();
		let key = self.store_key.clone();
		let written = self.written.clone();
		let Ok(runtime) = tokio::runtime::Handle::try_current() else {
			tracing::warn!(host = %key, "no async runtime available, credential snapshot not saved");

			return;
		};

		runtime.spawn(write_snapshot(store, key, written, generation, snapshot));
	}

	/// Returns (and creates on demand) the singleflight guard for a grant type.
	fn flow_guard(&self, grant: GrantType) -> Arc<AsyncMutex<()>> {
		let mut guards = self.flow_guards.lock();

		guards.entry(grant).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}
impl CredentialManager<ReqwestHttpClient> {
	/// Creates a manager backed by a redirect-free reqwest transport.
	pub async fn with_reqwest(store: Arc<dyn CredentialStore>, client: OAuthClient) -> Result<Self> {
		Ok(Self::load(ReqwestHttpClient::without_redirects()?, store, client).await)
	}
}
impl<C> Debug for CredentialManager<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialManager")
			.field("store_key", &self.store_key)
			.field("client_id", &self.client.client_id.as_str())
			.field("records", &self.records.read().len())
			.field("authorization_code_set", &self.authorization_code.lock().is_some())
			.finish()
	}
}

/// Saves `snapshot` unless a write with a later generation already went through.
async fn write_snapshot(
	store: Arc<dyn CredentialStore>,
	key: String,
	written: Arc<AsyncMutex<u64>>,
	generation: u64,
	snapshot: CredentialSnapshot,
) {
	let mut last = written.lock().await;

	if generation <= *last {
		tracing::debug!(host = %key, generation, latest = *last, "skipping stale credential snapshot");

		return;
	}

	*last = generation;

	if let Err(e) = store.save(&key, snapshot).await {
		tracing::warn!(host = %key, error = %e, "failed to save credentials");
	}
}
