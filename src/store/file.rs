//! JSON-file [`CredentialStore`]: one `<key>.json` file per remote host.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{CredentialSnapshot, CredentialStore, StoreError, StoreFuture},
};

/// Persists each snapshot to `<dir>/<key>.json`, rewriting the whole file on every save.
#[derive(Debug)]
pub struct FileStore {
	dir: PathBuf,
	write_guard: Mutex<()>,
}
impl FileStore {
	/// Opens (or creates) the data directory.
	pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let dir = dir.into();

		fs::create_dir_all(&dir).map_err(|e| StoreError::Backend {
			message: format!("Failed to create store directory {}: {e}", dir.display()),
		})?;

		Ok(Self { dir, write_guard: Mutex::new(()) })
	}

	/// Returns the file backing `key`.
	pub fn path_for(&self, key: &str) -> PathBuf {
		let file = if key.ends_with(".json") { key.to_owned() } else { format!("{key}.json") };

		self.dir.join(file)
	}

	fn read_snapshot(path: &Path) -> Result<Option<CredentialSnapshot>, StoreError> {
		if !path.exists() {
			return Ok(None);
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Ok(None);
		}

		serde_json::from_slice(&bytes).map(Some).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn write_snapshot(&self, path: &Path, snapshot: &CredentialSnapshot) -> Result<(), StoreError> {
		let serialized =
			serde_json::to_vec_pretty(snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize credential snapshot: {e}"),
			})?;
		let mut tmp_path = path.to_path_buf();

		tmp_path.set_extension("tmp");

		let _guard = self.write_guard.lock();

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", path.display()),
		})
	}
}
impl CredentialStore for FileStore {
	fn load<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<CredentialSnapshot>> {
		Box::pin(async move { Self::read_snapshot(&self.path_for(key)) })
	}

	fn save<'a>(&'a self, key: &'a str, snapshot: CredentialSnapshot) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.write_snapshot(&self.path_for(key), &snapshot) })
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;
	use crate::auth::{CredentialRecord, GrantType};

	fn temp_dir() -> PathBuf {
		let unique = format!(
			"eventsub_relay_file_store_{}_{}",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	fn snapshot() -> CredentialSnapshot {
		let record = CredentialRecord::builder(GrantType::AuthorizationCode)
			.access_token("user-access")
			.refresh_token("user-refresh")
			.scope(["channel:read:subscriptions"])
			.expires_in(Duration::hours(4))
			.build()
			.expect("Failed to build file-store fixture record.");

		vec![(GrantType::AuthorizationCode, record)]
	}

	#[tokio::test]
	async fn save_and_reload_round_trip() {
		let dir = temp_dir();
		let store = FileStore::open(&dir).expect("Failed to open file store directory.");
		let expected = snapshot();

		store
			.save("id.twitch.tv", expected.clone())
			.await
			.expect("Failed to save fixture snapshot.");
		drop(store);

		let reopened = FileStore::open(&dir).expect("Failed to reopen file store directory.");
		let loaded = reopened
			.load("id.twitch.tv")
			.await
			.expect("Failed to load fixture snapshot.")
			.expect("File store lost the snapshot after reopen.");

		assert_eq!(loaded, expected);
		assert!(dir.join("id.twitch.tv.json").exists());

		fs::remove_dir_all(&dir).unwrap_or_else(|e| {
			panic!("Failed to remove temporary store directory {}: {e}", dir.display())
		});
	}

	#[tokio::test]
	async fn missing_file_loads_nothing_and_corrupt_file_errors() {
		let dir = temp_dir();
		let store = FileStore::open(&dir).expect("Failed to open file store directory.");

		assert_eq!(store.load("absent").await.expect("Missing file should not error."), None);

		fs::write(store.path_for("broken"), b"{not json").expect("Failed to write corrupt file.");

		let err = store.load("broken").await.expect_err("Corrupt file should fail to parse.");

		assert!(matches!(err, StoreError::Serialization { .. }));

		fs::remove_dir_all(&dir).unwrap_or_else(|e| {
			panic!("Failed to remove temporary store directory {}: {e}", dir.display())
		});
	}
}
