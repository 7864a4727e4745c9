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

//! Blend rooms: several users pool their taste and the host generates a
//! shared set. The mixing happens on the backend; this side only joins,
//! polls and buffers the result.

use log::info;
use serde_json::{json, Value};

use crate::client::{decode, ApiClient};
use crate::error::ApiError;
use crate::models::{BlendCreated, BlendRoom};
use crate::recommendations::{LoadOutcome, RecommendationBuffer};
use crate::transport::ApiRequest;

pub const BLEND_DISPLAY_CAPACITY: usize = 20;
pub const BLEND_FETCH_LIMIT: usize = 60;

pub struct BlendClient {
    client: ApiClient,
    buffer: RecommendationBuffer,
}

impl BlendClient {
    pub fn new(client: ApiClient) -> Self {
        let buffer = RecommendationBuffer::with_capacity(client.clone(), BLEND_DISPLAY_CAPACITY);
        Self { client, buffer }
    }

    /// The generated set, with its own reserve for replacements.
    pub fn buffer(&self) -> &RecommendationBuffer {
        &self.buffer
    }

    pub async fn create(&self) -> Result<BlendCreated, ApiError> {
        let created: BlendCreated = self
            .client
            .fetch(ApiRequest::post("/api/blend/create"))
            .await?;
        info!("Opened blend room {}", created.session_id);
        Ok(created)
    }

    /// Joins a room and returns its normalised code.
    pub async fn join(&self, code: &str) -> Result<String, ApiError> {
        let code = normalize_code(code)?;
        let response = self
            .client
            .execute(ApiRequest::post(format!("/api/blend/{}/join", code)))
            .await?;
        decode::<Value>(response)?;
        Ok(code)
    }

    pub async fn room(&self, code: &str) -> Result<BlendRoom, ApiError> {
        let code = normalize_code(code)?;
        self.client
            .fetch(ApiRequest::get(format!("/api/blend/{}", code)))
            .await
    }

    /// Asks the backend to mix the room for `mood` and loads the result.
    pub async fn generate(&self, code: &str, mood: &str) -> Result<LoadOutcome, ApiError> {
        let code = normalize_code(code)?;
        let mood = mood.trim();
        if mood.is_empty() {
            return Err(ApiError::Validation("Pick a mood to blend".to_string()));
        }

        let request = ApiRequest::post(format!("/api/blend/{}/generate", code))
            .json(json!({ "mood": mood, "limit": BLEND_FETCH_LIMIT }));
        self.buffer
            .load_from(request, None, "Failed to generate playlist")
            .await
    }

    pub async fn leave(&self, code: &str) -> Result<(), ApiError> {
        let code = normalize_code(code)?;
        let response = self
            .client
            .execute(ApiRequest::post(format!("/api/blend/{}/leave", code)))
            .await?;
        decode::<Value>(response)?;
        self.buffer.clear();
        Ok(())
    }
}

fn normalize_code(code: &str) -> Result<String, ApiError> {
    let code = code.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::Validation(format!("Invalid room code '{}'", code)));
    }
    Ok(code.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    fn blend_backend() -> std::sync::Arc<FakeTransport> {
        FakeTransport::new(|req| match (req.method.as_str(), req.path.as_str()) {
            ("POST", "/api/blend/create") => {
                Reply::ok(json!({"session_id": "AB12CD", "host_id": "u1"}))
            }
            ("POST", "/api/blend/AB12CD/join") => {
                Reply::ok(json!({"message": "Joined successfully", "session_id": "AB12CD"}))
            }
            ("GET", "/api/blend/AB12CD") => Reply::ok(json!({
                "id": "AB12CD",
                "host_id": "u1",
                "is_active": true,
                "created_at": "2025-03-01T10:00:00Z",
                "participants": [
                    {"id": "u1", "display_name": "Ana", "image_url": null, "is_host": true},
                    {"id": "u2", "display_name": "Ben", "image_url": null, "is_host": false}
                ]
            })),
            ("POST", "/api/blend/AB12CD/generate") => Reply::ok(recommendations_json("chill", 60)),
            ("POST", "/api/blend/AB12CD/leave") => {
                Reply::ok(json!({"message": "Left session successfully"}))
            }
            _ => Reply::json(404, json!({"detail": "Session not found"})),
        })
    }

    #[tokio::test]
    async fn test_create_returns_room_code() {
        let h = harness(blend_backend());
        let created = BlendClient::new(h.client.clone()).create().await.unwrap();
        assert_eq!(created.session_id, "AB12CD");
        assert_eq!(created.host_id, "u1");
    }

    #[tokio::test]
    async fn test_join_normalises_code() {
        let h = harness(blend_backend());
        let code = BlendClient::new(h.client.clone())
            .join(" ab12cd ")
            .await
            .unwrap();
        assert_eq!(code, "AB12CD");
        assert_eq!(h.transport.count(&POST, "/api/blend/AB12CD/join"), 1);
    }

    #[tokio::test]
    async fn test_join_unknown_room_is_rejected() {
        let h = harness(blend_backend());
        let err = BlendClient::new(h.client.clone())
            .join("ZZZZZZ")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Backend rejected the request (404): Session not found"
        );
    }

    #[tokio::test]
    async fn test_room_lists_participants() {
        let h = harness(blend_backend());
        let room = BlendClient::new(h.client.clone()).room("ab12cd").await.unwrap();
        assert!(room.is_host("u1"));
        assert_eq!(room.participants.len(), 2);
    }

    #[tokio::test]
    async fn test_generate_shows_twenty_and_reserves_the_rest() {
        let h = harness(blend_backend());
        let blend = BlendClient::new(h.client.clone());

        let outcome = blend.generate("AB12CD", "chill").await.unwrap();

        assert_eq!(
            outcome,
            LoadOutcome::Applied {
                displayed: 20,
                reserve: 40
            }
        );
        let sent = h.transport.last(&POST, "/api/blend/AB12CD/generate").unwrap();
        assert_eq!(sent.body, Some(json!({"mood": "chill", "limit": 60})));

        blend.buffer().replace("t0");
        assert_eq!(blend.buffer().displayed()[0].id, "t20");
    }

    #[tokio::test]
    async fn test_leave_clears_generated_tracks() {
        let h = harness(blend_backend());
        let blend = BlendClient::new(h.client.clone());
        blend.generate("AB12CD", "chill").await.unwrap();

        blend.leave("AB12CD").await.unwrap();

        assert!(blend.buffer().displayed().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_code_never_hits_backend() {
        let h = harness(blend_backend());
        let err = BlendClient::new(h.client.clone())
            .room("../admin")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(h.transport.requests().is_empty());
    }
}
