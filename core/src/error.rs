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

use serde_json::Value;
use thiserror::Error;

use crate::store::StoreError;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum ApiError {
    /// A 401 that was not (or could not be) recovered by a silent refresh.
    #[error("Authentication expired")]
    AuthExpired,
    #[error("Session refresh failed: {0}")]
    AuthRefreshFailed(String),
    #[error("Request failed: {0}")]
    Network(#[from] TransportError),
    #[error("Backend rejected the request ({status}): {message}")]
    BackendRejected { status: u16, message: String },
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Failed to parse response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Failed to persist credentials: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    /// Builds a `BackendRejected` from a response body.
    ///
    /// Understands both `{"detail": ...}` and `{"error": ..., "details": ...}` payloads.
    pub fn rejected(status: u16, body: &Value) -> Self {
        let message = rejection_message(body).unwrap_or_else(|| match body {
            Value::String(text) if !text.is_empty() => text.clone(),
            _ => format!("HTTP {}", status),
        });
        ApiError::BackendRejected { status, message }
    }

    /// True for failures that mean "the user has to log in again".
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::AuthExpired | ApiError::AuthRefreshFailed(_))
    }
}

/// Extracts a human-readable rejection message, if the body carries one.
///
/// The backend reports some failures with a 200 status and an `error` field,
/// so callers check successful bodies with this too.
pub fn rejection_message(body: &Value) -> Option<String> {
    let obj = body.as_object()?;

    if let Some(error) = obj.get("error").and_then(Value::as_str) {
        return Some(match obj.get("details").and_then(Value::as_str) {
            Some(details) => format!("{} ({})", error, details),
            None => error.to_string(),
        });
    }

    match obj.get("detail")? {
        Value::String(detail) => Some(detail.clone()),
        other => Some(other.to_string()),
    }
}
