//! Environment-driven relay configuration.

// std
use std::{net::SocketAddr, path::PathBuf};
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Default token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://api.twitch.tv/helix";
/// Default listener address.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
/// Default OAuth redirect path segment.
pub const DEFAULT_REDIRECT_PATH: &str = "twitch";

/// Which broadcaster the relay watches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BroadcasterTarget {
	/// Numeric id known up front.
	Id(String),
	/// Login name resolved through the API at startup.
	Login(String),
}

/// Everything the binary needs to start.
#[derive(Clone, Debug)]
pub struct RelayConfig {
	/// OAuth client id.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
	/// Shared webhook HMAC secret.
	pub webhook_secret: TokenSecret,
	/// Public callback for webhook deliveries.
	pub callback_url: Url,
	/// Redirect URI registered for the authorization code flow.
	pub redirect_url: Url,
	/// Path segment of the redirect URI served by the relay.
	pub redirect_path: String,
	/// Broadcaster to subscribe for.
	pub broadcaster: BroadcasterTarget,
	/// Socket address the HTTP listener binds.
	pub listen_addr: SocketAddr,
	/// Directory for persisted credentials.
	pub data_dir: PathBuf,
	/// Token endpoint.
	pub token_url: Url,
	/// API base URL.
	pub api_url: Url,
}
impl RelayConfig {
	/// Reads the configuration from process environment variables.
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads the configuration through `lookup`; empty values count as unset.
	pub fn from_lookup<F>(lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |name: &'static str| lookup(name).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
		let require = |name: &'static str| get(name).ok_or(ConfigError::MissingVar { name });
		let url = |name: &'static str, raw: String| {
			Url::parse(&raw).map_err(|e| ConfigError::InvalidVar { name, reason: e.to_string() })
		};
		let client_id = require("TWITCH_CLIENT_ID")?;
		let client_secret = TokenSecret::new(require("TWITCH_CLIENT_SECRET")?);
		let webhook_secret = TokenSecret::new(require("TWITCH_WEBHOOK_SECRET")?);
		let public_host = require("PUBLIC_DOMAIN_OR_IP")?;
		let callback_url = url("PUBLIC_DOMAIN_OR_IP", format!("https://{public_host}/eventsub"))?;
		let external = get("EXTERNAL_DOMAIN").unwrap_or_else(|| format!("https://{public_host}"));
		let redirect_path = get("TWITCH_REDIRECT_PATH")
			.map(|path| path.trim_matches('/').to_owned())
			.unwrap_or_else(|| DEFAULT_REDIRECT_PATH.to_owned());
		let redirect_url =
			url("EXTERNAL_DOMAIN", format!("{}/{redirect_path}", external.trim_end_matches('/')))?;
		let broadcaster = match (get("TWITCH_BROADCASTER_ID"), get("TWITCH_CHANNEL")) {
			(Some(id), _) => BroadcasterTarget::Id(id),
			(None, Some(login)) =>
				BroadcasterTarget::Login(login.trim_start_matches('#').to_lowercase()),
			(None, None) => return Err(ConfigError::MissingVar { name: "TWITCH_CHANNEL" }.into()),
		};
		let listen_addr = get("LISTEN_ADDR")
			.unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_owned())
			.parse::<SocketAddr>()
			.map_err(|e| ConfigError::InvalidVar { name: "LISTEN_ADDR", reason: e.to_string() })?;
		let data_dir = PathBuf::from(get("DATA_DIR").unwrap_or_else(|| "data".to_owned()));
		let token_url =
			url("TWITCH_TOKEN_URL", get("TWITCH_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.into()))?;
		let api_url =
			url("TWITCH_API_URL", get("TWITCH_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()))?;

		if redirect_path.is_empty() {
			return Err(ConfigError::InvalidVar {
				name: "TWITCH_REDIRECT_PATH",
				reason: "must name a path segment".into(),
			}
			.into());
		}

		Ok(Self {
			client_id,
			client_secret,
			webhook_secret,
			callback_url,
			redirect_url,
			redirect_path,
			broadcaster,
			listen_addr,
			data_dir,
			token_url,
			api_url,
		})
	}
}
