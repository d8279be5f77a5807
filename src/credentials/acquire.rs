//! Token acquisition behind the per-grant singleflight guard.

// crates.io
use oauth2::{AuthorizationCode, http::StatusCode};
// self
use crate::{
	_prelude::*,
	auth::{GrantType, TokenSecret},
	credentials::{CredentialManager, TokenForm, request::TokenResponse},
	http::{self, HttpTransport},
	obs::{self, OpKind, OpOutcome, OpSpan},
};

impl<C> CredentialManager<C>
where
	C: ?Sized + HttpTransport,
{
	/// Returns a valid access token for `grant`, contacting the token endpoint only when the
	/// cached record is missing or expired.
	///
	/// Concurrent callers for the same grant wait on a shared guard and then reuse the record
	/// minted by whichever caller went first.
	pub async fn acquire(&self, grant: GrantType) -> Result<TokenSecret> {
		self.observed("acquire", grant, false).await
	}

	/// Records an authorization code and exchanges it for an `authorization_code` token.
	///
	/// The exchange always hits the token endpoint, even when a still-valid token is cached.
	pub async fn authorize(&self, code: impl Into<String>) -> Result<TokenSecret> {
		self.set_authorization_code(AuthorizationCode::new(code.into()));

		self.observed("authorize", GrantType::AuthorizationCode, true).await
	}

	async fn observed(
		&self,
		stage: &'static str,
		grant: GrantType,
		force_code: bool,
	) -> Result<TokenSecret> {
		const KIND: OpKind = OpKind::TokenAcquire;

		let span = OpSpan::new(KIND, stage);

		obs::record_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.acquire_guarded(grant, force_code)).await;

		match &result {
			Ok(_) => obs::record_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	async fn acquire_guarded(&self, grant: GrantType, force_code: bool) -> Result<TokenSecret> {
		if grant == GrantType::RefreshToken {
			return Err(Error::auth("refresh_token is a wire grant and cannot be acquired"));
		}

		let guard = self.flow_guard(grant);
		let _singleflight = guard.lock().await;
		let now = OffsetDateTime::now_utc();
		let cached = if force_code { None } else { self.cached(grant) };
		let form = match cached {
			Some(record) if record.is_valid_at(now) => {
				tracing::debug!(%grant, "cached credential still valid");

				return Ok(record.access_token);
			},
			Some(record) if record.can_refresh() => {
				let refresh =
					record.refresh_token.as_ref().map(TokenSecret::expose).unwrap_or_default();

				tracing::info!(%grant, "credential expired, refreshing");

				TokenForm::refresh(&self.client, refresh)
			},
			Some(_) if grant == GrantType::ClientCredentials => {
				self.evict(grant);

				self.full_grant_form(grant)?
			},
			_ => self.full_grant_form(grant)?,
		};
		let request = form.into_request(&self.client)?;
		let response =
			self.http_client.execute(request).await.map_err(http::map_transport_error)?;
		let status = response.status();

		if status == StatusCode::BAD_REQUEST {
			tracing::warn!(%grant, status = status.as_u16(), "token request rejected");

			return Err(Error::auth(format!("token request rejected for {grant}")));
		}

		let record = TokenResponse::parse(response.body(), status)?.into_record(
			grant,
			OffsetDateTime::now_utc(),
			status,
		)?;
		let token = record.access_token.clone();

		tracing::info!(%grant, expires_at = %record.expires_at, "credential acquired");

		self.replace(record);

		Ok(token)
	}

	fn full_grant_form(&self, grant: GrantType) -> Result<TokenForm> {
		match grant {
			GrantType::ClientCredentials => Ok(TokenForm::client_credentials(&self.client)),
			GrantType::AuthorizationCode => {
				let code = self.authorization_code().ok_or_else(|| {
					Error::auth("no authorization code has been supplied for authorization_code")
				})?;

				Ok(TokenForm::authorization_code(&self.client, code.secret()))
			},
			GrantType::RefreshToken =>
				Err(Error::auth("refresh_token is a wire grant and cannot be acquired")),
		}
	}
}
