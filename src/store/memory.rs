//! Thread-safe in-memory [`CredentialStore`] for tests and ephemeral deployments.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// self
use crate::{
	_prelude::*,
	store::{CredentialSnapshot, CredentialStore, StoreFuture},
};

/// Keeps snapshots in-process and counts every save.
#[derive(Debug, Default)]
pub struct MemoryStore {
	snapshots: RwLock<HashMap<String, CredentialSnapshot>>,
	saves: AtomicUsize,
}
impl MemoryStore {
	/// Builds a store pre-seeded with `snapshot` under `key`.
	pub fn with_snapshot(key: impl Into<String>, snapshot: CredentialSnapshot) -> Self {
		let store = Self::default();

		store.snapshots.write().insert(key.into(), snapshot);

		store
	}

	/// Returns the current snapshot under `key` without going through the async contract.
	pub fn snapshot(&self, key: &str) -> Option<CredentialSnapshot> {
		self.snapshots.read().get(key).cloned()
	}

	/// Number of completed saves.
	pub fn saves(&self) -> usize {
		self.saves.load(Ordering::SeqCst)
	}
}
impl CredentialStore for MemoryStore {
	fn load<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<CredentialSnapshot>> {
		Box::pin(async move { Ok(self.snapshot(key)) })
	}

	fn save<'a>(&'a self, key: &'a str, snapshot: CredentialSnapshot) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.snapshots.write().insert(key.to_owned(), snapshot);
			self.saves.fetch_add(1, Ordering::SeqCst);

			Ok(())
		})
	}
}
