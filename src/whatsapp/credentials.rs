//! Credential Store
//!
//! Persists the transport's opaque authentication blob so a linked device
//! survives restarts without re-pairing.
//!
//! On-disk format is a small JSON envelope:
//! `{"version":1,"savedAt":"...","blob":"<base64>"}`.

use super::traits::Credentials;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Current envelope version
const FORMAT_VERSION: u32 = 1;

/// Result type for credential operations
pub type CredentialResult<T> = Result<T, CredentialError>;

/// Credential store errors
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid credential blob: {0}")]
    Encoding(String),

    #[error("Unsupported credential format version {0}")]
    UnsupportedVersion(u32),
}

/// Loads and persists the credential blob
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persisted credentials, or fresh ones if nothing usable is stored.
    ///
    /// Never fails: a missing file is a normal first run, and an unreadable
    /// one is logged and treated the same way.
    async fn load(&self) -> Credentials;

    /// Replace the persisted credentials.
    async fn save(&self, credentials: &Credentials) -> CredentialResult<()>;

    /// Forget the persisted credentials (next connect pairs from scratch).
    async fn clear(&self) -> CredentialResult<()>;
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialFile {
    version: u32,
    saved_at: DateTime<Utc>,
    blob: String,
}

/// File-backed credential store
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted credentials, surfacing every failure.
    ///
    /// Returns `Ok(None)` when nothing has been saved yet.
    pub async fn try_load(&self) -> CredentialResult<Option<Credentials>> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let file: CredentialFile = serde_json::from_slice(&contents)?;
        if file.version != FORMAT_VERSION {
            return Err(CredentialError::UnsupportedVersion(file.version));
        }

        let blob = BASE64
            .decode(file.blob.as_bytes())
            .map_err(|e| CredentialError::Encoding(e.to_string()))?;

        Ok(Some(Credentials::from_bytes(blob)))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "credentials".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Credentials {
        match self.try_load().await {
            Ok(Some(credentials)) => {
                debug!(path = %self.path.display(), "loaded stored credentials");
                credentials
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "no stored credentials, starting fresh");
                Credentials::fresh()
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "stored credentials unreadable, starting fresh"
                );
                Credentials::fresh()
            }
        }
    }

    async fn save(&self, credentials: &Credentials) -> CredentialResult<()> {
        let file = CredentialFile {
            version: FORMAT_VERSION,
            saved_at: Utc::now(),
            blob: BASE64.encode(credentials.as_bytes()),
        };
        let contents = serde_json::to_vec_pretty(&file)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Write-then-rename so a crash mid-write leaves the previous file intact
        let temp_path = self.temp_path();
        {
            use tokio::io::AsyncWriteExt;
            let mut temp = tokio::fs::File::create(&temp_path).await?;
            temp.write_all(&contents).await?;
            temp.sync_all().await?;
        }
        tokio::fs::rename(&temp_path, &self.path).await?;

        debug!(path = %self.path.display(), "credentials saved");
        Ok(())
    }

    async fn clear(&self) -> CredentialResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
