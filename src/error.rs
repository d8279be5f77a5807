//! Relay-level error types shared across credentials, subscriptions, stores, and webhooks.

// self
use crate::_prelude::*;

/// Relay-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical relay error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Subscription management failure.
	#[error(transparent)]
	Subscription(#[from] SubscriptionError),

	/// No usable authorization code or token, or the token endpoint rejected the request.
	#[error("Authorization failed: {reason}.")]
	Auth {
		/// Human-readable reason string.
		reason: String,
	},
	/// Inbound webhook signature did not match the shared secret.
	#[error("Webhook signature mismatch.")]
	SignatureMismatch,
	/// Platform API answered with a non-success status.
	#[error("Platform API returned HTTP {status}: {body}.")]
	Api {
		/// HTTP status code.
		status: u16,
		/// Response body, lossily decoded.
		body: String,
	},
	/// The configured target user does not exist on the platform.
	#[error("User `{login}` was not found on the platform.")]
	UserNotFound {
		/// Login name that failed to resolve.
		login: String,
	},
}
impl Error {
	/// Builds an [`Error::Auth`] from any displayable reason.
	pub fn auth(reason: impl Into<String>) -> Self {
		Self::Auth { reason: reason.into() }
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A required environment variable is absent or empty.
	#[error("Environment variable `{name}` is required.")]
	MissingVar {
		/// Variable name.
		name: &'static str,
	},
	/// An environment variable holds a value that cannot be parsed.
	#[error("Environment variable `{name}` is invalid: {reason}.")]
	InvalidVar {
		/// Variable name.
		name: &'static str,
		/// Parser message.
		reason: String,
	},
	/// A configured URL cannot be parsed or joined.
	#[error("URL is invalid.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
impl From<url::ParseError> for ConfigError {
	fn from(source: url::ParseError) -> Self {
		Self::InvalidUrl { source }
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint or API answered with something the relay cannot use.
	#[error("Remote endpoint returned an unexpected response: {message}.")]
	UnexpectedResponse {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Response body could not be parsed.
	#[error("Remote endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the platform.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the platform.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Failures raised while listing, creating, or deleting remote subscriptions.
#[derive(Debug, ThisError)]
pub enum SubscriptionError {
	/// The subscription list could not be fetched.
	#[error("Failed to list subscriptions.")]
	List {
		/// Underlying failure.
		#[source]
		source: Box<Error>,
	},
	/// A subscription could not be created.
	#[error("Failed to create the `{event_type}` subscription: {source}")]
	Create {
		/// Event type that failed.
		event_type: String,
		/// Underlying failure.
		#[source]
		source: Box<Error>,
	},
	/// A subscription could not be deleted.
	#[error("Failed to delete subscription `{id}`: {source}")]
	Delete {
		/// Remote subscription identifier.
		id: String,
		/// Underlying failure.
		#[source]
		source: Box<Error>,
	},
}
