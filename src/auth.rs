//! Credential-domain models: grant types, token records, and redacted secrets.

pub mod grant;
pub mod record;
pub mod secret;

pub use grant::*;
pub use record::*;
pub use secret::*;
