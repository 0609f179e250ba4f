//! Credential persistence.
//!
//! The core treats persistence as an opaque key/value collaborator behind
//! [`CredentialStore`]. Two implementations ship with the crate:
//! [`MemoryCredentialStore`] for tests and embedding, and
//! [`FileCredentialStore`], a JSON file that survives process restarts.
//!
//! Each `save`/`load`/`clear` is a single atomic operation, so a reader
//! racing a writer observes either the old or the new token, never a mix.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

const CREDENTIALS_SCHEMA_VERSION: u32 = 1;

/// The persisted `{accessToken, username}` pair. Both are `None` once cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
	#[serde(default)]
	pub access_token: Option<String>,
	#[serde(default)]
	pub username: Option<String>,
}

impl Credentials {
	pub fn new(access_token: impl Into<String>, username: impl Into<String>) -> Self {
		Self {
			access_token: Some(access_token.into()),
			username: Some(username.into()),
		}
	}

	/// Returns the token when one is stored and non-empty.
	pub fn token(&self) -> Option<&str> {
		self.access_token.as_deref().filter(|t| !t.is_empty())
	}

	pub fn is_empty(&self) -> bool {
		self.token().is_none() && self.username.is_none()
	}

	/// `Authorization` header value for the stored token.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.token().unwrap_or_default())
	}
}

/// Persistence for the current credential.
pub trait CredentialStore: Send + Sync {
	fn save(&self, credentials: &Credentials) -> Result<()>;

	/// Returns the stored credential, or empty values when nothing is stored.
	fn load(&self) -> Credentials;

	fn clear(&self) -> Result<()>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
	slot: RwLock<Credentials>,
}

impl MemoryCredentialStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl CredentialStore for MemoryCredentialStore {
	fn save(&self, credentials: &Credentials) -> Result<()> {
		*self.slot.write() = credentials.clone();
		Ok(())
	}

	fn load(&self) -> Credentials {
		self.slot.read().clone()
	}

	fn clear(&self) -> Result<()> {
		*self.slot.write() = Credentials::default();
		Ok(())
	}
}

#[derive(Debug, Serialize, Deserialize)]
struct CredentialsFile {
	schema: u32,
	#[serde(flatten)]
	credentials: Credentials,
}

/// JSON file store, e.g. `~/.config/dwitter/credentials.json`.
///
/// Writes go to a sibling temp file that is renamed over the target.
#[derive(Debug)]
pub struct FileCredentialStore {
	path: PathBuf,
	lock: Mutex<()>,
}

impl FileCredentialStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			lock: Mutex::new(()),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn read(&self) -> Option<Credentials> {
		let content = fs::read_to_string(&self.path).ok()?;
		match serde_json::from_str::<CredentialsFile>(&content) {
			Ok(file) if file.schema == CREDENTIALS_SCHEMA_VERSION => Some(file.credentials),
			Ok(file) => {
				warn!(target = "dwitter.credentials", path = %self.path.display(), schema = file.schema, "ignoring credentials with unknown schema");
				None
			}
			Err(err) => {
				warn!(target = "dwitter.credentials", path = %self.path.display(), error = %err, "ignoring unreadable credentials file");
				None
			}
		}
	}

	fn write(&self, credentials: &Credentials) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			if !parent.as_os_str().is_empty() {
				fs::create_dir_all(parent)?;
			}
		}
		let json = serde_json::to_string_pretty(&CredentialsFile {
			schema: CREDENTIALS_SCHEMA_VERSION,
			credentials: credentials.clone(),
		})?;
		let tmp = self.path.with_extension("json.tmp");
		fs::write(&tmp, json)?;
		fs::rename(&tmp, &self.path)?;
		Ok(())
	}
}

impl CredentialStore for FileCredentialStore {
	fn save(&self, credentials: &Credentials) -> Result<()> {
		let _guard = self.lock.lock();
		self.write(credentials)?;
		debug!(target = "dwitter.credentials", path = %self.path.display(), "credentials saved");
		Ok(())
	}

	fn load(&self) -> Credentials {
		let _guard = self.lock.lock();
		self.read().unwrap_or_default()
	}

	fn clear(&self) -> Result<()> {
		let _guard = self.lock.lock();
		match fs::remove_file(&self.path) {
			Ok(()) => {
				debug!(target = "dwitter.credentials", path = %self.path.display(), "credentials removed");
				Ok(())
			}
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(err) => Err(err.into()),
		}
	}
}
