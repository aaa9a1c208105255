// service/session.rs
//! Persisted admin credential, the console's equivalent of the browser's
//! local storage entries.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConsoleError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredSession {
    #[serde(default)]
    admin_token: Option<String>,
    #[serde(default)]
    is_admin_authenticated: bool,
}

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

    /// The stored token, if any. A token without the authenticated flag is
    /// treated as absent.
    pub fn token(&self) -> Result<Option<String>, ConsoleError> {
        let stored = self.read()?;
        if !stored.is_admin_authenticated {
            return Ok(None);
        }
        Ok(stored.admin_token.filter(|t| !t.is_empty()))
    }

    pub fn save(&self, token: &str) -> Result<(), ConsoleError> {
        let stored = StoredSession {
            admin_token: Some(token.to_string()),
            is_admin_authenticated: true,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_vec_pretty(&stored)?)?;
        tracing::debug!("Saved admin session to {}", self.path.display());
        Ok(())
    }

    pub fn clear(&self) -> Result<(), ConsoleError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!("Cleared stored admin session");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn read(&self) -> Result<StoredSession, ConsoleError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredSession::default()),
            Err(e) => Err(e.into()),
        }
    }
}
