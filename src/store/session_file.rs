use crate::error::BridgeError;
use crate::types::SessionCredential;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File-backed store holding exactly one session credential.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored credential. A missing or unparsable file yields `None`.
    pub async fn load(&self) -> Result<Option<SessionCredential>, BridgeError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no session file; starting unauthenticated");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<SessionCredential>(&contents) {
            Ok(cred) => Ok(Some(cred)),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "session file is corrupt; starting unauthenticated"
                );
                Ok(None)
            }
        }
    }

    /// Replace the stored credential. Writes a sibling temp file, then renames it over the target.
    pub async fn save(&self, credential: &SessionCredential) -> Result<(), BridgeError> {
        let body = serde_json::to_vec(credential)?;
        let tmp = self.tmp_path();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&tmp, &body).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
