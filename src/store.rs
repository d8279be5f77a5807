//! Durable credential snapshots keyed by remote host.
//!
//! A store only persists and restores the full `[grant type, record]` list for one host;
//! ownership of individual records stays with [`crate::credentials::CredentialManager`].

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{CredentialRecord, GrantType},
};

/// Full credential map for one host, serialized as an array of `[grant type, record]` pairs.
pub type CredentialSnapshot = Vec<(GrantType, CredentialRecord)>;

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Load/save-by-key persistence contract for credential snapshots.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Loads the snapshot stored under `key`, or `None` when nothing was saved yet.
	fn load<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<CredentialSnapshot>>;

	/// Replaces the snapshot stored under `key`.
	fn save<'a>(&'a self, key: &'a str, snapshot: CredentialSnapshot) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
