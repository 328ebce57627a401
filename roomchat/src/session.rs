//! On-disk session state.
//!
//! Two files live in the data directory:
//! - `device_id`: generated once per installation, sent on every connect
//!   and room join so the server can tell devices of one user apart.
//! - `session.json`: the logged-in user, so the next start can resume
//!   without logging in again. Removed on logout.

use std::path::{Path, PathBuf};

use roomchat_proto::api::User;

const DEVICE_ID_FILE: &str = "device_id";
const SESSION_FILE: &str = "session.json";

/// Errors that can occur when reading or writing session state.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Could not determine the platform data directory.
    #[error("could not determine data directory (no HOME or XDG_DATA_HOME)")]
    NoDataDir,

    /// A session file could not be read or written.
    #[error("session file {path}: {source}")]
    Io {
        /// File that was accessed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The saved session could not be parsed.
    #[error("corrupt session file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Session files under one directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store in `<platform data dir>/roomchat`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoDataDir`] if the platform has no data
    /// directory.
    pub fn in_default_dir() -> Result<Self, SessionError> {
        let base = dirs::data_dir().ok_or(SessionError::NoDataDir)?;
        Ok(Self::new(base.join("roomchat")))
    }

    /// Directory holding the session files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persistent id of this device, generated on first use.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Io`] if the id cannot be read or saved.
    pub fn device_id(&self) -> Result<String, SessionError> {
        let path = self.dir.join(DEVICE_ID_FILE);
        match std::fs::read_to_string(&path) {
            Ok(contents) if !contents.trim().is_empty() => return Ok(contents.trim().to_string()),
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(SessionError::Io { path, source }),
        }

        let id = uuid::Uuid::now_v7().to_string();
        self.write(&path, &id)?;
        tracing::info!(device_id = %id, "generated device id");
        Ok(id)
    }

    /// The user saved by the last login, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Corrupt`] if the file exists but does not
    /// parse, or [`SessionError::Io`] if it cannot be read.
    pub fn load_user(&self) -> Result<Option<User>, SessionError> {
        let path = self.dir.join(SESSION_FILE);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SessionError::Io { path, source }),
        }
    }

    /// Remember `user` for the next start.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the file cannot be written.
    pub fn save_user(&self, user: &User) -> Result<(), SessionError> {
        let json = serde_json::to_string(user)?;
        self.write(&self.dir.join(SESSION_FILE), &json)
    }

    /// Forget the saved user. Succeeds if there was none.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Io`] if the file exists but cannot be removed.
    pub fn clear_user(&self) -> Result<(), SessionError> {
        let path = self.dir.join(SESSION_FILE);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionError::Io { path, source }),
        }
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), SessionError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| SessionError::Io {
            path: self.dir.clone(),
            source,
        })?;
        std::fs::write(path, contents).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
