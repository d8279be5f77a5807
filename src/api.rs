//! Authenticated JSON client for the platform's REST API.
//!
//! Every call borrows an app token from the [`CredentialManager`] (`client_credentials`), so
//! token refreshes stay invisible to subscription management and user lookup.

// crates.io
use oauth2::{
	HttpRequest,
	http::{
		HeaderValue, Method,
		header::{AUTHORIZATION, CONTENT_TYPE},
	},
};
// self
use crate::{
	_prelude::*,
	auth::GrantType,
	credentials::CredentialManager,
	error::{ConfigError, TransientError},
	http::{self, HttpTransport},
};

/// Query parameters appended to an API path, in order.
pub type Query<'a> = &'a [(&'a str, &'a str)];

/// Thin GET/POST/DELETE wrapper rooted at the platform's API base URL.
pub struct ApiClient<C>
where
	C: ?Sized + HttpTransport,
{
	credentials: Arc<CredentialManager<C>>,
	base_url: Url,
}
impl<C> ApiClient<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a client that resolves paths against `base_url` (for example
	/// `https://api.twitch.tv/helix`).
	pub fn new(credentials: Arc<CredentialManager<C>>, base_url: Url) -> Self {
		Self { credentials, base_url }
	}

	/// Credential manager backing this client.
	pub fn credentials(&self) -> &Arc<CredentialManager<C>> {
		&self.credentials
	}

	/// Sends an authenticated `GET`.
	pub async fn get(&self, path: &str, query: Query<'_>) -> Result<Value> {
		self.send(Method::GET, path, query, None).await
	}

	/// Sends an authenticated `POST` with a JSON body.
	pub async fn post(&self, path: &str, query: Query<'_>, body: &Value) -> Result<Value> {
		self.send(Method::POST, path, query, Some(body)).await
	}

	/// Sends an authenticated `DELETE`.
	pub async fn delete(&self, path: &str, query: Query<'_>) -> Result<Value> {
		self.send(Method::DELETE, path, query, None).await
	}

	/// Looks up the numeric user id for a login name.
	pub async fn resolve_user_id(&self, login: &str) -> Result<String> {
		let response = self.get("/users", &[("login", login)]).await?;

		response["data"]
			.as_array()
			.and_then(|users| users.first())
			.and_then(|user| user["id"].as_str())
			.map(str::to_owned)
			.ok_or_else(|| Error::UserNotFound { login: login.to_owned() })
	}

	/// Builds the absolute URL for `path` plus `query`.
	pub fn endpoint(&self, path: &str, query: Query<'_>) -> Result<Url> {
		let base = self.base_url.as_str().trim_end_matches('/');
		let path = path.trim_start_matches('/');
		let mut url = Url::parse(&format!("{base}/{path}")).map_err(ConfigError::from)?;

		if !query.is_empty() {
			url.query_pairs_mut().extend_pairs(query.iter().copied());
		}

		Ok(url)
	}

	async fn send(
		&self,
		method: Method,
		path: &str,
		query: Query<'_>,
		body: Option<&Value>,
	) -> Result<Value> {
		let token = self.credentials.acquire(GrantType::ClientCredentials).await?;
		let url = self.endpoint(path, query)?;
		let payload = match body {
			Some(value) => serde_json::to_vec(value).map_err(|e| TransientError::UnexpectedResponse {
				message: format!("request body could not be encoded: {e}"),
				status: None,
			})?,
			None => Vec::new(),
		};
		let request: HttpRequest = oauth2::http::Request::builder()
			.method(method.clone())
			.uri(url.as_str())
			.header("Client-ID", self.credentials.client.client_id.as_str())
			.header(AUTHORIZATION, format!("Bearer {}", token.expose()))
			.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.body(payload)
			.map_err(ConfigError::from)?;
		let response =
			self.credentials.http_client.execute(request).await.map_err(http::map_transport_error)?;
		let status = response.status();

		if !status.is_success() {
			let body = String::from_utf8_lossy(response.body()).into_owned();

			tracing::warn!(%method, path, status = status.as_u16(), "platform API call failed");

			return Err(Error::Api { status: status.as_u16(), body });
		}
		if response.body().iter().all(u8::is_ascii_whitespace) {
			return Ok(Value::Null);
		}

		let mut deserializer = serde_json::Deserializer::from_slice(response.body());

		serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
			TransientError::ResponseParse { source, status: Some(status.as_u16()) }.into()
		})
	}
}
impl<C> Debug for ApiClient<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient").field("base_url", &self.base_url.as_str()).finish()
	}
}
