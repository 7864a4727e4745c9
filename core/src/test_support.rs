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

//! In-process backend fakes shared by the unit tests.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::client::ApiClient;
use crate::models::Track;
use crate::session::{Navigator, Route, SessionStatus};
use crate::store::{CookieStore, CredentialStore};
use crate::transport::{ApiRequest, ApiResponse, Transport, TransportError};

pub const GET: Method = Method::GET;
pub const POST: Method = Method::POST;

/// What the fake backend answers to one request.
#[derive(Debug, Clone)]
pub struct Reply {
    status: u16,
    body: Value,
    delay: Option<Duration>,
    unreachable: bool,
}

impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            delay: None,
            unreachable: false,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::json(200, body)
    }

    pub fn unauthorized() -> Self {
        Self::json(401, json!({"detail": "Not authenticated"}))
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::json(0, Value::Null)
        }
    }

    pub fn after(mut self, millis: u64) -> Self {
        self.delay = Some(Duration::from_millis(millis));
        self
    }
}

type Handler = Box<dyn Fn(&ApiRequest) -> Reply + Send + Sync>;

/// Scripted transport: a closure decides each reply, every request is logged.
pub struct FakeTransport {
    handler: Handler,
    log: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&ApiRequest) -> Reply + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.log.lock().expect("log lock").clone()
    }

    pub fn count(&self, method: &Method, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == *method && r.path == path)
            .count()
    }

    pub fn last(&self, method: &Method, path: &str) -> Option<ApiRequest> {
        self.requests()
            .into_iter()
            .rev()
            .find(|r| r.method == *method && r.path == path)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.log.lock().expect("log lock").push(request.clone());
        let reply = (self.handler)(request);

        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        if reply.unreachable {
            return Err(TransportError::Connection("connection refused".to_string()));
        }
        Ok(ApiResponse {
            status: reply.status,
            body: reply.body,
        })
    }

    fn base_url(&self) -> &str {
        "http://backend.test"
    }
}

/// Navigator that remembers where it was sent.
#[derive(Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().expect("routes lock").clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.routes.lock().expect("routes lock").push(route);
    }
}

pub struct Harness {
    pub transport: Arc<FakeTransport>,
    pub navigator: Arc<RecordingNavigator>,
    pub status: SessionStatus,
    pub client: ApiClient,
}

pub fn harness_with_store(
    transport: Arc<FakeTransport>,
    store: Arc<dyn CredentialStore>,
) -> Harness {
    let navigator = Arc::new(RecordingNavigator::default());
    let status = SessionStatus::new();
    let client = ApiClient::new(
        transport.clone(),
        store,
        status.clone(),
        navigator.clone(),
    );
    Harness {
        transport,
        navigator,
        status,
        client,
    }
}

pub fn harness(transport: Arc<FakeTransport>) -> Harness {
    harness_with_store(transport, Arc::new(CookieStore))
}

pub fn track_json(id: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Song {}", id),
        "uri": format!("spotify:track:{}", id),
        "preview_url": null,
        "artists": [{"id": format!("artist{}", id), "name": "Someone"}],
        "album": {"images": [{"url": "https://i.scdn.co/image/cover"}]},
        "external_urls": {"spotify": format!("https://open.spotify.com/track/{}", id)},
        "duration_ms": 180000
    })
}

pub fn track(id: &str) -> Track {
    serde_json::from_value(track_json(id)).expect("track fixture")
}

pub fn tracks(prefix: &str, count: usize) -> Vec<Track> {
    (0..count).map(|i| track(&format!("{}{}", prefix, i))).collect()
}

pub fn recommendations_json(mood: &str, count: usize) -> Value {
    let tracks: Vec<Value> = (0..count).map(|i| track_json(&format!("t{}", i))).collect();
    json!({
        "mood": mood,
        "description": format!("Songs for a {} day", mood),
        "tracks": tracks
    })
}

pub fn user_json(id: &str) -> Value {
    json!({
        "id": id,
        "display_name": "Ana",
        "email": "ana@example.com",
        "images": [{"url": "https://i.scdn.co/avatar"}]
    })
}
