//! OAuth 2.0 grant types understood by the credential manager.

// self
use crate::_prelude::*;

/// OAuth 2.0 grant types used against the platform's token endpoint.
///
/// [`GrantType::ClientCredentials`] and [`GrantType::AuthorizationCode`] key cached
/// credential records; [`GrantType::RefreshToken`] only ever appears on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Authorization Code grant, unlocked once the user completes the redirect.
	AuthorizationCode,
	/// Refresh Token grant for rotating an expired record.
	RefreshToken,
	/// Client Credentials grant for app-only tokens.
	ClientCredentials,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
			GrantType::ClientCredentials => "client_credentials",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for GrantType {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"authorization_code" => Ok(GrantType::AuthorizationCode),
			"refresh_token" => Ok(GrantType::RefreshToken),
			"client_credentials" => Ok(GrantType::ClientCredentials),
			other => Err(Error::auth(format!("unsupported grant type `{other}`"))),
		}
	}
}
