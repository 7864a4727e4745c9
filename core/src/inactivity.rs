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

use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::auth::SessionManager;

/// Idle time after which an authenticated session is logged out.
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(60 * 60);
/// Minimum spacing between countdown resets caused by input.
pub const ACTIVITY_THROTTLE: Duration = Duration::from_secs(1);

/// Input that counts as the user being present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEvent {
    PointerDown,
    PointerMove,
    KeyDown,
    Scroll,
    TouchStart,
}

/// Handle for an input source feeding the monitor.
///
/// Recording after the monitor is gone is a no-op. The monitor owns the
/// channel, so the countdown stops only when the monitor itself is dropped.
#[derive(Debug, Clone)]
pub struct ActivitySource {
    tx: mpsc::UnboundedSender<ActivityEvent>,
}

impl ActivitySource {
    pub fn record(&self, event: ActivityEvent) {
        // The monitor is gone; nothing left to reset.
        let _ = self.tx.send(event);
    }
}

/// Logs the user out after a stretch without input.
///
/// The countdown only runs while someone is authenticated. Each reset
/// replaces the pending deadline. Dropping the monitor cancels everything.
pub struct InactivityMonitor {
    tx: mpsc::UnboundedSender<ActivityEvent>,
    task: JoinHandle<()>,
}

impl InactivityMonitor {
    pub fn spawn(session: Arc<SessionManager>) -> Self {
        Self::with_timing(session, INACTIVITY_TIMEOUT, ACTIVITY_THROTTLE)
    }

    pub fn with_timing(session: Arc<SessionManager>, timeout: Duration, throttle: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(session, rx, timeout, throttle));
        Self { tx, task }
    }

    pub fn register_source(&self) -> ActivitySource {
        ActivitySource {
            tx: self.tx.clone(),
        }
    }
}

impl Drop for InactivityMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn run(
    session: Arc<SessionManager>,
    mut events: mpsc::UnboundedReceiver<ActivityEvent>,
    timeout: Duration,
    throttle: Duration,
) {
    let mut state_rx = session.subscribe();
    let arm = |authenticated: bool| authenticated.then(|| Instant::now() + timeout);

    let mut deadline = arm(state_rx.borrow_and_update().is_authenticated());
    let mut pending_reset: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = sleep_until_opt(deadline) => {
                deadline = None;
                if session.state().is_authenticated() {
                    info!("Session expired due to inactivity. Logging out...");
                    session.logout().await;
                }
            }
            _ = sleep_until_opt(pending_reset) => {
                pending_reset = None;
                deadline = arm(session.state().is_authenticated());
            }
            event = events.recv() => match event {
                Some(event) => {
                    if pending_reset.is_none() {
                        debug!("Activity ({:?}); countdown resets shortly", event);
                        pending_reset = Some(Instant::now() + throttle);
                    }
                }
                None => break,
            },
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let authenticated = state_rx.borrow_and_update().is_authenticated();
                deadline = arm(authenticated);
            }
        }
    }
}
