//! Relay binary: loads configuration, restores credentials, reconciles subscriptions, serves.

// std
use std::sync::Arc;
// crates.io
use color_eyre::{Result, eyre::WrapErr};
use eventsub_relay::{
	api::ApiClient,
	bus::{EventBus, SocketHub},
	config::{BroadcasterTarget, RelayConfig},
	credentials::{CredentialManager, OAuthClient},
	obs,
	server::{self, AppState},
	store::{CredentialStore, FileStore},
	subscription::{DesiredSubscription, Reconciler, WebhookTransport},
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	obs::init_tracing();

	let config = RelayConfig::from_env().wrap_err("failed to load configuration")?;
	let store: Arc<dyn CredentialStore> =
		Arc::new(FileStore::open(&config.data_dir).wrap_err("failed to open credential store")?);
	let client = OAuthClient::new(
		config.client_id.clone(),
		config.client_secret.expose(),
		config.token_url.clone(),
	)
	.with_redirect_url(config.redirect_url.clone());
	let credentials = Arc::new(CredentialManager::with_reqwest(store, client).await?);
	let api = Arc::new(ApiClient::new(credentials.clone(), config.api_url.clone()));
	let broadcaster_id = match &config.broadcaster {
		BroadcasterTarget::Id(id) => id.clone(),
		BroadcasterTarget::Login(login) => match api.resolve_user_id(login).await {
			Ok(id) => id,
			Err(e) => {
				tracing::error!(login = %login, error = %e, "could not resolve broadcaster");

				std::process::exit(1);
			},
		},
	};

	tracing::info!(%broadcaster_id, redirect = %config.redirect_url, "broadcaster resolved");

	let hub = Arc::new(SocketHub::new());
	let bus = Arc::new(EventBus::new().with_sink(hub.clone()));
	let reconciler = Reconciler::new(
		api,
		bus.clone(),
		WebhookTransport {
			callback: config.callback_url.clone(),
			secret: config.webhook_secret.expose().to_owned(),
		},
		DesiredSubscription::defaults_for(&broadcaster_id),
	);

	let state =
		AppState { bus, hub, credentials, webhook_secret: config.webhook_secret.clone() };
	// Creates trigger a verification callback, so the listener must be up first.
	let listener = TcpListener::bind(config.listen_addr)
		.await
		.wrap_err_with(|| format!("failed to bind {}", config.listen_addr))?;

	tokio::spawn(async move {
		// Failures are already logged by the reconciler.
		let _ = reconciler.reconcile().await;
	});

	server::serve(listener, server::router(state, &config.redirect_path)).await?;

	Ok(())
}
