//! HTTP surface: webhook intake, OAuth redirect, and realtime WebSocket fan-out.

// crates.io
use axum::{
	Router,
	body::Bytes,
	extract::{
		Query, State, WebSocketUpgrade,
		ws::{Message, WebSocket},
	},
	http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	bus::{EventBus, SocketHub},
	credentials::CredentialManager,
	error::TransportError,
	http::HttpTransport,
	webhook::{self, WebhookReply},
};

/// Shared handler state.
pub struct AppState<C>
where
	C: ?Sized + HttpTransport,
{
	/// Event fan-out.
	pub bus: Arc<EventBus>,
	/// Realtime connection registry; also attached to `bus` as its sink.
	pub hub: Arc<SocketHub>,
	/// Credential manager receiving authorization codes.
	pub credentials: Arc<CredentialManager<C>>,
	/// Shared webhook HMAC secret.
	pub webhook_secret: TokenSecret,
}
impl<C> Clone for AppState<C>
where
	C: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			bus: self.bus.clone(),
			hub: self.hub.clone(),
			credentials: self.credentials.clone(),
			webhook_secret: self.webhook_secret.clone(),
		}
	}
}

/// Query string of the OAuth redirect.
#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
	/// Authorization code issued by the platform.
	#[serde(default)]
	pub code: Option<String>,
}

/// Builds the router; `redirect_path` is the single path segment of the OAuth redirect URI.
pub fn router<C>(state: AppState<C>, redirect_path: &str) -> Router
where
	C: ?Sized + HttpTransport,
{
	Router::new()
		.route("/eventsub", post(eventsub::<C>))
		.route(&format!("/{}", redirect_path.trim_matches('/')), get(oauth_redirect::<C>))
		.route("/ws", get(realtime::<C>))
		.with_state(state)
}

/// Accepts connections on `listener` until the process stops.
pub async fn serve(listener: TcpListener, router: Router) -> Result<()> {
	if let Ok(addr) = listener.local_addr() {
		tracing::info!(%addr, "listening");
	}

	axum::serve(listener, router).await.map_err(TransportError::Io)?;

	Ok(())
}

async fn eventsub<C>(State(state): State<AppState<C>>, headers: HeaderMap, body: Bytes) -> Response
where
	C: ?Sized + HttpTransport,
{
	let reply = webhook::dispatch(&headers, &body, state.webhook_secret.expose(), &state.bus);
	let status = reply.status();

	match reply {
		WebhookReply::Challenge(challenge) =>
			(status, [(CONTENT_TYPE, "text/plain")], challenge).into_response(),
		_ => status.into_response(),
	}
}

async fn oauth_redirect<C>(
	State(state): State<AppState<C>>,
	Query(query): Query<RedirectQuery>,
) -> Response
where
	C: ?Sized + HttpTransport,
{
	let Some(code) = query.code.filter(|code| !code.is_empty()) else {
		return (StatusCode::BAD_REQUEST, "Missing authorization code.").into_response();
	};

	match state.credentials.authorize(code).await {
		Ok(_) => {
			tracing::info!("authorization code accepted");

			(StatusCode::OK, "Authorization complete.").into_response()
		},
		Err(e @ Error::Auth { .. }) => {
			tracing::warn!(error = %e, "authorization code rejected");

			(StatusCode::UNAUTHORIZED, "Authorization rejected.").into_response()
		},
		Err(e) => {
			tracing::error!(error = %e, "authorization code exchange failed");

			(StatusCode::BAD_GATEWAY, "Authorization failed.").into_response()
		},
	}
}

async fn realtime<C>(State(state): State<AppState<C>>, upgrade: WebSocketUpgrade) -> Response
where
	C: ?Sized + HttpTransport,
{
	let hub = state.hub.clone();

	upgrade.on_upgrade(move |socket| relay_socket(socket, hub))
}

async fn relay_socket(socket: WebSocket, hub: Arc<SocketHub>) {
	let (id, mut frames) = hub.connect();
	let (mut sender, mut receiver) = socket.split();
	let mut forward = tokio::spawn(async move {
		while let Some(frame) = frames.recv().await {
			if sender.send(Message::Text(frame.into())).await.is_err() {
				break;
			}
		}
	});
	let mut drain = tokio::spawn(async move {
		while let Some(message) = receiver.next().await {
			match message {
				Ok(Message::Close(_)) | Err(_) => break,
				Ok(_) => {},
			}
		}
	});

	tokio::select! {
		_ = &mut forward => drain.abort(),
		_ = &mut drain => forward.abort(),
	}

	hub.disconnect(id);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn redirect_query_accepts_missing_code() {
		let query: RedirectQuery =
			serde_json::from_value(serde_json::json!({})).expect("Empty query should parse.");

		assert!(query.code.is_none());
	}
}
