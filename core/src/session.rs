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

use std::sync::Arc;
use tokio::sync::watch;

use crate::models::AuthUser;

/// Observable authentication state.
///
/// `Unknown` only exists until the first status check settles. Transitions
/// replace the whole value, so observers never see a half-updated session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unknown,
    Authenticated(AuthUser),
    Unauthenticated,
}

impl SessionState {
    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

/// Shared handle to the session state. Cloning shares the same channel.
#[derive(Clone)]
pub struct SessionStatus {
    tx: Arc<watch::Sender<SessionState>>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStatus {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Unknown);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub(crate) fn set(&self, state: SessionState) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

/// Places the client can send the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// The local login screen.
    Login,
    /// Landing route once authenticated.
    Home,
    /// Off-site redirect, e.g. the identity provider's consent page.
    External(String),
}

/// Performs navigation on behalf of the session layer.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}
