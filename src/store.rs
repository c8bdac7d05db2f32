//! Session storage for the sitedesk console
//!
//! Holds the bearer token and the two flags derived from login. The file
//! layout mirrors the browser storage keys of the web dashboard so both
//! clients describe a session the same way.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use sitedesk_protocol::Role;

use crate::config::SessionStorageConfig;
use crate::error::{DeskError, Result};

/// Persisted session keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(rename = "userRole", skip_serializing_if = "Option::is_none")]
    pub user_role: Option<String>,
    /// `"true"` / `"false"`
    #[serde(rename = "firstTimeLogin", skip_serializing_if = "Option::is_none")]
    pub first_time_login: Option<String>,
}

/// Authoritative holder of the current session
///
/// Reads never fail. Writes update memory first and then the file; a failed
/// file write is logged and the in-memory value stays authoritative.
#[derive(Debug)]
pub struct TokenStore {
    path: Option<PathBuf>,
    session: Mutex<StoredSession>,
}

impl TokenStore {
    pub fn new(config: &SessionStorageConfig) -> Result<Self> {
        let path = if config.enabled {
            Some(config.storage_path.clone().ok_or_else(|| {
                DeskError::invalid_input("Session storage path not configured")
            })?)
        } else {
            None
        };

        let session = match &path {
            Some(path) => load_session(path),
            None => StoredSession::default(),
        };

        Ok(Self {
            path,
            session: Mutex::new(session),
        })
    }

    /// Store that never touches the filesystem
    pub fn in_memory() -> Self {
        Self {
            path: None,
            session: Mutex::new(StoredSession::default()),
        }
    }

    pub fn get(&self) -> Option<String> {
        self.lock().access_token.clone()
    }

    pub fn set(&self, token: impl Into<String>) {
        let mut session = self.lock();
        session.access_token = Some(token.into());
        self.persist(&session);
    }

    /// Record the flags returned by login
    pub fn set_profile(&self, role: &Role, first_time_login: bool) {
        let mut session = self.lock();
        session.user_role = Some(role.as_str().to_string());
        session.first_time_login = Some(first_time_login.to_string());
        self.persist(&session);
    }

    pub fn set_first_time_login(&self, first_time_login: bool) {
        let mut session = self.lock();
        session.first_time_login = Some(first_time_login.to_string());
        self.persist(&session);
    }

    pub fn role(&self) -> Option<Role> {
        self.lock().user_role.as_deref().map(Role::parse)
    }

    pub fn first_time_login(&self) -> bool {
        self.lock().first_time_login.as_deref() == Some("true")
    }

    /// Remove token, role and first-login flag
    pub fn clear(&self) {
        let mut session = self.lock();
        session.access_token = None;
        session.user_role = None;
        session.first_time_login = None;
        self.persist(&session);
    }

    pub fn snapshot(&self) -> StoredSession {
        self.lock().clone()
    }

    pub fn storage_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, StoredSession> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, session: &StoredSession) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = save_session(path, session) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to persist session");
        }
    }
}

fn load_session(path: &Path) -> StoredSession {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return StoredSession::default(),
    };

    if content.trim().is_empty() {
        return StoredSession::default();
    }

    serde_json::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Discarding unreadable session file");
        StoredSession::default()
    })
}

fn save_session(path: &Path, session: &StoredSession) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| DeskError::io_from_error("Failed to create session directory", e))?;
    }

    let content = serde_json::to_string_pretty(session)?;
    fs::write(path, content)
        .map_err(|e| DeskError::io_from_error("Failed to write session file", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::utils::test_helpers::create_temp_dir;

    fn file_store(path: PathBuf) -> TokenStore {
        TokenStore::new(&SessionStorageConfig {
            enabled: true,
            storage_path: Some(path),
        })
        .unwrap()
    }

    #[test]
    fn test_set_is_visible_to_next_get() {
        let store = TokenStore::in_memory();
        assert_eq!(store.get(), None);

        store.set("first");
        assert_eq!(store.get().as_deref(), Some("first"));

        store.set("second");
        assert_eq!(store.get().as_deref(), Some("second"));
    }

    #[test]
    fn test_clear_removes_all_keys() {
        let store = TokenStore::in_memory();
        store.set("token");
        store.set_profile(&Role::Admin, true);
        assert!(store.first_time_login());
        assert_eq!(store.role(), Some(Role::Admin));

        store.clear();
        assert_eq!(store.get(), None);
        assert_eq!(store.role(), None);
        assert!(!store.first_time_login());
        assert_eq!(store.snapshot(), StoredSession::default());
    }

    #[test]
    fn test_session_survives_reload() {
        let dir = create_temp_dir();
        let path = dir.path().join("session").join("session.json");

        let store = file_store(path.clone());
        store.set("persisted-token");
        store.set_profile(&Role::Admin, false);
        drop(store);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"accessToken\""));
        assert!(raw.contains("\"firstTimeLogin\": \"false\""));

        let reloaded = file_store(path);
        assert_eq!(reloaded.get().as_deref(), Some("persisted-token"));
        assert_eq!(reloaded.role(), Some(Role::Admin));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = create_temp_dir();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{{{").unwrap();

        let store = file_store(path);
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_enabled_without_path_is_rejected() {
        let result = TokenStore::new(&SessionStorageConfig {
            enabled: true,
            storage_path: None,
        });
        assert!(result.is_err());
    }
}
