//! Client session cache
//!
//! The current session token and the identity it was issued for live in a
//! [`SessionContext`], which persists through a [`SessionStore`]. The context
//! is owned by the caller and handed to the API client; there is no global
//! session state.
//!
//! # File Location
//!
//! [`FileSessionStore::default_path`] resolves to the platform config
//! directory, e.g. `~/.config/sitevault/session.json` on Linux.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sitevault_core::{UserRole, UserStatus};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Store key holding the bearer token
pub const TOKEN_KEY: &str = "token";

/// Store key holding the cached user record (JSON)
pub const USER_KEY: &str = "user";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Session file {path} is corrupted: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("Failed to encode session: {0}")]
    Encoding(String),
}

/// Identity as returned by the server, minus anything sensitive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
}

impl SessionUser {
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        match name.trim() {
            "" => self.email.clone(),
            trimmed => trimmed.to_string(),
        }
    }
}

/// Token plus the user it was issued for
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
}

/// Key-value persistence for the session cache
pub trait SessionStore {
    /// Read a value; `Ok(None)` when the key is absent
    fn load(&self, key: &str) -> Result<Option<String>, SessionError>;

    /// Write a value, replacing any previous one
    fn save(&mut self, key: &str, value: &str) -> Result<(), SessionError>;

    /// Delete a value. Removing an absent key is not an error.
    fn remove(&mut self, key: &str) -> Result<(), SessionError>;
}

/// Non-persistent store for tests and one-shot invocations
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    entries: BTreeMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), SessionError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk.
///
/// The file is rewritten on every change and restricted to the owner on Unix.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileSessionStore {
    /// Platform config directory, falling back to the working directory
    pub fn default_path() -> PathBuf {
        match ProjectDirs::from("com", "sitevault", "sitevault") {
            Some(dirs) => dirs.config_dir().join("session.json"),
            None => PathBuf::from(".sitevault").join("session.json"),
        }
    }

    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| SessionError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&contents).map_err(|e| SessionError::Corrupt {
                path: path.clone(),
                message: e.to_string(),
            })?
        } else {
            BTreeMap::new()
        };

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), SessionError> {
        let io_err = |source| SessionError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let contents = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| SessionError::Encoding(e.to_string()))?;
        fs::write(&self.path, contents).map_err(io_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600)).map_err(io_err)?;
        }

        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), SessionError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

/// The current session, mirrored into a store
#[derive(Debug)]
pub struct SessionContext<S: SessionStore> {
    store: S,
    current: Option<Session>,
}

impl<S: SessionStore> SessionContext<S> {
    /// Restore the session held by `store`.
    ///
    /// A half-written session (token without a readable user, or the reverse)
    /// is discarded.
    pub fn load(store: S) -> Result<Self, SessionError> {
        let token = store.load(TOKEN_KEY)?;
        let user = store
            .load(USER_KEY)?
            .and_then(|raw| serde_json::from_str::<SessionUser>(&raw).ok());

        let mut context = Self {
            store,
            current: None,
        };
        match (token, user) {
            (Some(token), Some(user)) if !token.is_empty() => {
                context.current = Some(Session { token, user });
            }
            (None, None) => {}
            _ => {
                tracing::debug!("Discarding incomplete cached session");
                context.clear()?;
            }
        }
        Ok(context)
    }

    /// Replace the current session
    pub fn set(&mut self, session: Session) -> Result<(), SessionError> {
        self.store.save(TOKEN_KEY, &session.token)?;
        self.store_user(&session.user)?;
        self.current = Some(session);
        Ok(())
    }

    /// Refresh the cached identity, keeping the token
    pub fn update_user(&mut self, user: SessionUser) -> Result<(), SessionError> {
        if self.current.is_none() {
            return Ok(());
        }
        self.store_user(&user)?;
        if let Some(session) = self.current.as_mut() {
            session.user = user;
        }
        Ok(())
    }

    /// Forget the session
    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.current = None;
        self.store.remove(TOKEN_KEY)?;
        self.store.remove(USER_KEY)
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.current.as_ref().map(|s| &s.user)
    }

    /// Token to attach as `Authorization: Bearer`
    pub fn bearer(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.token.as_str())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn store_user(&mut self, user: &SessionUser) -> Result<(), SessionError> {
        let raw = serde_json::to_string(user).map_err(|e| SessionError::Encoding(e.to_string()))?;
        self.store.save(USER_KEY, &raw)
    }
}
