/*
    moodmix-rs | Mood-driven Spotify recommendations from the terminal.
    Copyright (C) 2025  The moodmix-rs contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! Where session credentials live between requests.
//!
//! The backend's primary contract is an HTTP-only cookie pair, which the
//! transport's cookie jar carries on its own ([`CookieStore`]). Keeping the
//! two tokens on the client side ([`FileTokenStore`], [`MemoryTokenStore`])
//! is the alternate mode and nothing may assume tokens are present.

use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access token file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode tokens: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

// Tokens never reach logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Option<Credentials>;

    fn save(&self, credentials: &Credentials) -> Result<(), StoreError>;

    fn clear(&self);

    /// True when the backend's cookies hold the session and there are no tokens to manage.
    fn is_cookie_backed(&self) -> bool {
        false
    }
}

/// Cookie mode. Holds nothing; saving tokens is a no-op.
#[derive(Debug, Default)]
pub struct CookieStore;

impl CredentialStore for CookieStore {
    fn load(&self) -> Option<Credentials> {
        None
    }

    fn save(&self, _credentials: &Credentials) -> Result<(), StoreError> {
        Ok(())
    }

    fn clear(&self) {}

    fn is_cookie_backed(&self) -> bool {
        true
    }
}

/// Tokens that live as long as the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<Credentials>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            slot: Mutex::new(Some(credentials)),
        }
    }
}

impl CredentialStore for MemoryTokenStore {
    fn load(&self) -> Option<Credentials> {
        self.slot.lock().ok()?.clone()
    }

    fn save(&self, credentials: &Credentials) -> Result<(), StoreError> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(credentials.clone());
        }
        Ok(())
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

/// Tokens persisted as a small JSON cache file.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileTokenStore {
    fn load(&self) -> Option<Credentials> {
        let raw = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                warn!("Ignoring unreadable token cache {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn save(&self, credentials: &Credentials) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(credentials)?;
        let mut file = open_owner_only(&self.path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    fn clear(&self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove token cache {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Opens the cache for writing, readable by the owner only.
#[cfg(unix)]
fn open_owner_only(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation; tighten a file left by an older run.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_owner_only(path: &Path) -> std::io::Result<fs::File> {
    fs::File::create(path)
}
