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

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::buffer::DEFAULT_DISPLAY_CAPACITY;
use crate::inactivity::{ACTIVITY_THROTTLE, INACTIVITY_TIMEOUT};
use crate::recommendations::DEFAULT_FETCH_LIMIT;
use crate::store::{CookieStore, CredentialStore, FileTokenStore};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8888";
pub const DEFAULT_TOKEN_FILE: &str = ".moodmix_token_cache.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// How the session credential is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenMode {
    /// HTTP-only cookies set by the backend.
    Cookie,
    /// Bearer tokens kept in a local token file.
    Storage,
}

impl FromStr for TokenMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cookie" | "cookies" => Ok(TokenMode::Cookie),
            "storage" | "token" | "tokens" => Ok(TokenMode::Storage),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub token_mode: TokenMode,
    pub token_file: PathBuf,
    pub inactivity_timeout: Duration,
    pub activity_throttle: Duration,
    pub display_capacity: usize,
    pub fetch_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token_mode: TokenMode::Cookie,
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            inactivity_timeout: INACTIVITY_TIMEOUT,
            activity_throttle: ACTIVITY_THROTTLE,
            display_capacity: DEFAULT_DISPLAY_CAPACITY,
            fetch_limit: DEFAULT_FETCH_LIMIT,
        }
    }
}

impl ClientConfig {
    /// Reads `MOODMIX_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("MOODMIX_API_BASE_URL") {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(mode) = lookup("MOODMIX_TOKEN_MODE") {
            config.token_mode = mode.parse().map_err(|_| ConfigError::InvalidValue {
                key: "MOODMIX_TOKEN_MODE",
                value: mode.clone(),
            })?;
        }
        if let Some(path) = lookup("MOODMIX_TOKEN_FILE") {
            config.token_file = PathBuf::from(path);
        }
        if let Some(secs) = parse_number(&lookup, "MOODMIX_INACTIVITY_TIMEOUT_SECS")? {
            config.inactivity_timeout = Duration::from_secs(secs);
        }
        if let Some(millis) = parse_number(&lookup, "MOODMIX_ACTIVITY_THROTTLE_MS")? {
            config.activity_throttle = Duration::from_millis(millis);
        }
        if let Some(capacity) = parse_number(&lookup, "MOODMIX_DISPLAY_CAPACITY")? {
            config.display_capacity = capacity as usize;
        }
        if let Some(limit) = parse_number(&lookup, "MOODMIX_FETCH_LIMIT")? {
            config.fetch_limit = limit as usize;
        }

        Ok(config)
    }

    /// The credential store matching `token_mode`.
    pub fn credential_store(&self) -> Arc<dyn CredentialStore> {
        match self.token_mode {
            TokenMode::Cookie => Arc::new(CookieStore),
            TokenMode::Storage => Arc::new(FileTokenStore::new(&self.token_file)),
        }
    }
}

fn parse_number<F>(lookup: &F, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}
