//! Token endpoint request encoding and response parsing.

// crates.io
use oauth2::{
	HttpRequest,
	http::{
		Method, StatusCode,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use serde::Deserializer;
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::{CredentialRecord, GrantType, TokenSecret},
	credentials::OAuthClient,
	error::{ConfigError, TransientError},
};

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub(crate) const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Ordered form fields for one token endpoint call.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenForm {
	fields: Vec<(&'static str, String)>,
}
impl TokenForm {
	fn base(client: &OAuthClient, wire_grant: GrantType) -> Self {
		Self {
			fields: vec![
				("grant_type", wire_grant.as_str().to_owned()),
				("client_id", client.client_id.as_str().to_owned()),
				("client_secret", client.client_secret.secret().to_owned()),
			],
		}
	}

	/// `grant_type=refresh_token` with the cached refresh secret.
	pub fn refresh(client: &OAuthClient, refresh_token: &str) -> Self {
		let mut form = Self::base(client, GrantType::RefreshToken);

		form.fields.push(("refresh_token", refresh_token.to_owned()));

		form
	}

	/// `grant_type=client_credentials` with nothing extra.
	pub fn client_credentials(client: &OAuthClient) -> Self {
		Self::base(client, GrantType::ClientCredentials)
	}

	/// `grant_type=authorization_code` with the code and the registered redirect URI.
	pub fn authorization_code(client: &OAuthClient, code: &str) -> Self {
		let mut form = Self::base(client, GrantType::AuthorizationCode);

		form.fields.push(("code", code.to_owned()));

		if let Some(redirect) = &client.redirect_url {
			form.fields.push(("redirect_uri", redirect.as_str().to_owned()));
		}

		form
	}

	/// Looks up a field by name.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.fields.iter().find(|(key, _)| *key == name).map(|(_, value)| value.as_str())
	}

	/// URL-encodes the fields in insertion order.
	pub fn encode(&self) -> String {
		form_urlencoded::Serializer::new(String::new())
			.extend_pairs(self.fields.iter().map(|(key, value)| (*key, value.as_str())))
			.finish()
	}

	pub(crate) fn into_request(self, client: &OAuthClient) -> Result<HttpRequest> {
		oauth2::http::Request::builder()
			.method(Method::POST)
			.uri(client.token_url.as_str())
			.header(AUTHORIZATION, client.basic_authorization())
			.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
			.header(ACCEPT, "application/json")
			.body(self.encode().into_bytes())
			.map_err(|e| ConfigError::from(e).into())
	}
}
impl Debug for TokenForm {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let mut map = f.debug_map();

		for (key, value) in &self.fields {
			match *key {
				"client_secret" | "refresh_token" | "code" => map.entry(key, &"<redacted>"),
				_ => map.entry(key, value),
			};
		}

		map.finish()
	}
}

/// Token endpoint payload.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default, deserialize_with = "lenient_seconds")]
	expires_in: Option<i64>,
	#[serde(default)]
	scope: Option<ScopeField>,
	#[serde(default)]
	token_type: Option<String>,
}
impl TokenResponse {
	pub(crate) fn parse(body: &[u8], status: StatusCode) -> Result<Self> {
		let mut deserializer = serde_json::Deserializer::from_slice(body);

		serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
			TransientError::ResponseParse { source, status: Some(status.as_u16()) }.into()
		})
	}

	/// Converts the payload into a record acquired at `issued_at`.
	///
	/// A lifetime that pushes the expiry past the representable range is rejected.
	pub(crate) fn into_record(
		self,
		grant: GrantType,
		issued_at: OffsetDateTime,
		status: StatusCode,
	) -> Result<CredentialRecord> {
		let lifetime = self.expires_in.filter(|secs| *secs > 0).unwrap_or(DEFAULT_EXPIRES_IN_SECS);
		let expires_at = issued_at.checked_add(Duration::seconds(lifetime)).ok_or_else(|| {
			TransientError::UnexpectedResponse {
				message: format!("expires_in of {lifetime} seconds is out of range"),
				status: Some(status.as_u16()),
			}
		})?;

		Ok(CredentialRecord {
			grant_type: grant,
			access_token: TokenSecret::new(self.access_token),
			refresh_token: self.refresh_token.map(TokenSecret::new),
			token_type: self.token_type,
			scope: self.scope.map(ScopeField::into_vec).unwrap_or_default(),
			issued_at,
			expires_at,
		})
	}
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScopeField {
	List(Vec<String>),
	Joined(String),
}
impl ScopeField {
	fn into_vec(self) -> Vec<String> {
		match self {
			ScopeField::List(list) => list,
			ScopeField::Joined(joined) => joined.split_whitespace().map(str::to_owned).collect(),
		}
	}
}

/// Accepts `expires_in` as a JSON number or a numeric string; anything else is absent.
fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Option::<Value>::deserialize(deserializer)?;

	Ok(match value {
		Some(Value::Number(number)) =>
			number.as_i64().or_else(|| number.as_f64().map(|secs| secs as i64)),
		Some(Value::String(raw)) => raw.trim().parse::<i64>().ok(),
		_ => None,
	})
}
