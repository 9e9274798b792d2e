//! Single-slot persistence of the active conversation id.
//!
//! The file holds one JSON object, `{"conversation_id": "<id>"}`, and is
//! overwritten by every save. There is no expiry and no locking; one operator
//! drives one session.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SessionFile {
    conversation_id: String,
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

    pub fn save(&self, conversation_id: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create session directory: {}", parent.display())
                })?;
            }
        }
        let body = serde_json::to_string(&SessionFile {
            conversation_id: conversation_id.to_string(),
        })?;
        std::fs::write(&self.path, body)
            .with_context(|| format!("Failed to write session file: {}", self.path.display()))?;
        tracing::debug!(conversation_id, path = %self.path.display(), "session saved");
        Ok(())
    }

    /// The saved conversation id, or `None` when no session file exists.
    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file: {}", self.path.display()))?;
        let session: SessionFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session file: {}", self.path.display()))?;
        Ok(Some(session.conversation_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path().join("session.json"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn save_overwrites_previous() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path().join("nested/session.json"));
        store.save("conv-1").unwrap();
        store.save("conv-2").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("conv-2"));

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, r#"{"conversation_id":"conv-2"}"#);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();
        let err = SessionStore::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("parse session file"));
    }
}
