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

use log::{debug, info, warn};
use rspotify::model::{ArtistId, TrackId};
use serde_json::json;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::buffer::{MoodContext, RecommendationSet, Replacement, DEFAULT_DISPLAY_CAPACITY};
use crate::client::ApiClient;
use crate::error::ApiError;
use crate::library::Library;
use crate::models::{
    FeedbackRequest, FeedbackResponse, PlaylistCreateRequest, PlaylistCreated,
    RecommendationResponse, Track,
};
use crate::transport::ApiRequest;

pub const DEFAULT_FETCH_LIMIT: usize = 60;

pub const PRESET_MOODS: [&str; 9] = [
    "happy",
    "sad",
    "energetic",
    "chill",
    "angry",
    "nostalgic",
    "anxious",
    "cozy",
    "melancholic",
];

/// A user's mood request: a preset label or a free-text description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoodQuery {
    Preset(String),
    Text(String),
}

impl MoodQuery {
    fn validate(&self) -> Result<(), ApiError> {
        match self {
            MoodQuery::Preset(mood) if !PRESET_MOODS.contains(&mood.as_str()) => Err(
                ApiError::Validation(format!(
                    "Unknown mood '{}'. Choose from: {}",
                    mood,
                    PRESET_MOODS.join(", ")
                )),
            ),
            MoodQuery::Text(text) if text.trim().is_empty() => Err(ApiError::Validation(
                "Describe how you feel first".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn request(&self, limit: usize) -> ApiRequest {
        match self {
            MoodQuery::Preset(mood) => ApiRequest::get("/api/recommendations")
                .query("mood", mood)
                .query("limit", limit),
            MoodQuery::Text(text) => ApiRequest::post("/api/mood-recommendations")
                .json(json!({ "text": text.trim(), "limit": limit })),
        }
    }

    fn failure_message(&self) -> &'static str {
        match self {
            MoodQuery::Preset(_) => "Failed to load recommendations. Please try again.",
            MoodQuery::Text(_) => "Could not analyze your mood. Try selecting one manually.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied { displayed: usize, reserve: usize },
    /// A newer load (or a clear) started while this one was in flight; its result was dropped.
    Superseded,
}

/// Point-in-time copy of the buffer for rendering.
#[derive(Debug, Clone, Default)]
pub struct BufferSnapshot {
    pub set: Option<RecommendationSet>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Default)]
struct BufferState {
    set: Option<RecommendationSet>,
    loading: bool,
    error: Option<String>,
    latest_request: u64,
}

/// Working set of recommendations for the current mood query.
///
/// All mutation goes through [`load_for_mood`](Self::load_for_mood),
/// [`replace`](Self::replace) and [`clear`](Self::clear). The lock is never held
/// across a network call.
pub struct RecommendationBuffer {
    client: ApiClient,
    display_capacity: usize,
    state: Mutex<BufferState>,
}

impl RecommendationBuffer {
    pub fn new(client: ApiClient) -> Self {
        Self::with_capacity(client, DEFAULT_DISPLAY_CAPACITY)
    }

    pub fn with_capacity(client: ApiClient, display_capacity: usize) -> Self {
        Self {
            client,
            display_capacity,
            state: Mutex::new(BufferState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> BufferSnapshot {
        let state = self.state();
        BufferSnapshot {
            set: state.set.clone(),
            loading: state.loading,
            error: state.error.clone(),
        }
    }

    pub fn displayed(&self) -> Vec<Track> {
        self.state()
            .set
            .as_ref()
            .map(|set| set.displayed().to_vec())
            .unwrap_or_default()
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    pub fn dismiss_error(&self) {
        self.state().error = None;
    }

    /// Fetches `total_limit` tracks for the query and replaces the current set wholesale.
    pub async fn load_for_mood(
        &self,
        query: MoodQuery,
        total_limit: usize,
    ) -> Result<LoadOutcome, ApiError> {
        query.validate()?;
        let query_text = match &query {
            MoodQuery::Text(text) => Some(text.trim().to_string()),
            MoodQuery::Preset(_) => None,
        };
        self.load_from(
            query.request(total_limit),
            query_text,
            query.failure_message(),
        )
        .await
    }

    /// Runs any request that answers with a recommendation payload into this buffer.
    pub(crate) async fn load_from(
        &self,
        request: ApiRequest,
        query_text: Option<String>,
        failure_message: &str,
    ) -> Result<LoadOutcome, ApiError> {
        let token = {
            let mut state = self.state();
            state.latest_request += 1;
            state.loading = true;
            state.error = None;
            state.latest_request
        };

        let result = self.client.fetch::<RecommendationResponse>(request).await;

        let mut state = self.state();
        if state.latest_request != token {
            debug!("Discarding superseded recommendation result #{}", token);
            return Ok(LoadOutcome::Superseded);
        }
        state.loading = false;

        match result {
            Ok(response) => {
                let context = MoodContext {
                    mood: response.mood,
                    query_text,
                    description: response.description,
                };
                let set =
                    RecommendationSet::partition(context, response.tracks, self.display_capacity);
                let outcome = LoadOutcome::Applied {
                    displayed: set.displayed().len(),
                    reserve: set.reserve_len(),
                };
                info!(
                    "Loaded '{}' recommendations: {:?}",
                    set.context().mood,
                    outcome
                );
                state.set = Some(set);
                Ok(outcome)
            }
            Err(e) => {
                warn!("Failed to get recommendations: {}", e);
                state.set = None;
                // Auth failures already redirected to login; no inline banner for those.
                if !e.is_auth_failure() {
                    state.error = Some(failure_message.to_string());
                }
                Err(e)
            }
        }
    }

    /// Drops the current set and invalidates any load still in flight.
    pub fn clear(&self) {
        let mut state = self.state();
        state.latest_request += 1;
        state.set = None;
        state.loading = false;
        state.error = None;
    }

    /// Swaps or removes a displayed track without touching the network.
    pub fn replace(&self, track_id: &str) -> Replacement {
        match self.state().set.as_mut() {
            Some(set) => set.replace(track_id),
            None => Replacement::NotFound,
        }
    }

    /// Replaces the track and reports the dislike in the background.
    pub fn dislike(&self, track_id: &str) -> Replacement {
        let outcome = self.replace(track_id);

        if let Replacement::Swapped { removed, .. } | Replacement::Removed { removed, .. } = &outcome
        {
            match removed.primary_artist_id() {
                Some(artist_id) => {
                    let client = self.client.clone();
                    let track_id = removed.id.clone();
                    let artist_id = artist_id.to_string();
                    tokio::spawn(async move {
                        send_feedback(&client, &track_id, &artist_id, false).await;
                    });
                }
                None => debug!("Track {} has no artist; skipping feedback", removed.id),
            }
        }
        outcome
    }

    /// Reports a like for a displayed track. Does not change the buffer.
    pub async fn like(&self, track_id: &str) -> bool {
        let artist_id = {
            let state = self.state();
            state
                .set
                .as_ref()
                .and_then(|set| set.get(track_id))
                .and_then(|t| t.primary_artist_id().map(str::to_string))
        };

        match artist_id {
            Some(artist_id) => {
                self.submit_feedback(track_id, &artist_id, true).await;
                true
            }
            None => false,
        }
    }

    /// Best-effort feedback for the learning system. Failures are logged and never retried.
    pub async fn submit_feedback(&self, track_id: &str, artist_id: &str, liked: bool) {
        send_feedback(&self.client, track_id, artist_id, liked).await;
    }

    /// Saves the displayed tracks as a new playlist.
    pub async fn save_playlist(
        &self,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<PlaylistCreated, ApiError> {
        let track_uris = self
            .state()
            .set
            .as_ref()
            .map(RecommendationSet::track_uris)
            .unwrap_or_default();

        Library::new(self.client.clone())
            .create_playlist(PlaylistCreateRequest {
                name: name.trim().to_string(),
                track_uris,
                description: description.to_string(),
                public,
            })
            .await
    }
}

fn validate_feedback_ids(track_id: &str, artist_id: &str) -> Result<(), ApiError> {
    if track_id.is_empty() || TrackId::from_id(track_id).is_err() {
        return Err(ApiError::Validation(format!("Invalid track id '{}'", track_id)));
    }
    if artist_id.is_empty() || ArtistId::from_id(artist_id).is_err() {
        return Err(ApiError::Validation(format!("Invalid artist id '{}'", artist_id)));
    }
    Ok(())
}

async fn send_feedback(client: &ApiClient, track_id: &str, artist_id: &str, liked: bool) {
    if let Err(e) = validate_feedback_ids(track_id, artist_id) {
        warn!("Feedback not sent: {}", e);
        return;
    }

    let body = FeedbackRequest {
        track_id: track_id.to_string(),
        artist_id: artist_id.to_string(),
        is_liked: liked,
    };
    let request = match serde_json::to_value(&body) {
        Ok(value) => ApiRequest::post("/api/recommendations/feedback").json(value),
        Err(e) => {
            warn!("Feedback not sent: {}", e);
            return;
        }
    };

    match client.fetch::<FeedbackResponse>(request).await {
        Ok(response) => debug!(
            "Feedback for {} recorded (liked: {}) {}",
            track_id, response.is_liked, response.message
        ),
        Err(e) => warn!("Failed to submit feedback for {}: {}", track_id, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    fn mood_backend() -> Arc<FakeTransport> {
        FakeTransport::new(|req| match req.path.as_str() {
            "/api/recommendations" => {
                let mood = req
                    .query
                    .iter()
                    .find(|(k, _)| k == "mood")
                    .map(|(_, v)| v.clone())
                    .unwrap_or_default();
                Reply::ok(recommendations_json(&mood, 60))
            }
            "/api/mood-recommendations" => Reply::ok(recommendations_json("cozy", 8)),
            "/api/recommendations/feedback" => {
                Reply::ok(json!({"message": "Feedback recorded", "is_liked": false}))
            }
            "/api/playlists/create" => Reply::ok(json!({
                "id": "pl1",
                "name": "Monday",
                "external_urls": {"spotify": "https://open.spotify.com/playlist/pl1"},
                "tracks_added": 50
            })),
            _ => Reply::json(404, json!({"detail": "Not Found"})),
        })
    }

    fn displayed_ids(buffer: &RecommendationBuffer) -> Vec<String> {
        buffer.displayed().into_iter().map(|t| t.id).collect()
    }

    #[tokio::test]
    async fn test_load_preset_partitions_display_and_reserve() {
        let h = harness(mood_backend());
        let buffer = RecommendationBuffer::new(h.client.clone());

        let outcome = buffer
            .load_for_mood(MoodQuery::Preset("happy".to_string()), 60)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            LoadOutcome::Applied {
                displayed: 50,
                reserve: 10
            }
        );
        let sent = h.transport.last(&GET, "/api/recommendations").unwrap();
        assert_eq!(
            sent.query,
            vec![
                ("mood".to_string(), "happy".to_string()),
                ("limit".to_string(), "60".to_string())
            ]
        );

        let snapshot = buffer.snapshot();
        assert!(!snapshot.loading);
        let set = snapshot.set.unwrap();
        assert_eq!(set.context().mood, "happy");
        assert_eq!(set.context().description, "Songs for a happy day");
        assert_eq!(set.reserve().next().unwrap().id, "t50");
    }

    #[tokio::test]
    async fn test_load_text_posts_query_and_uses_inferred_mood() {
        let h = harness(mood_backend());
        let buffer = RecommendationBuffer::new(h.client.clone());

        buffer
            .load_for_mood(MoodQuery::Text("  rainy sunday  ".to_string()), 24)
            .await
            .unwrap();

        let sent = h.transport.last(&POST, "/api/mood-recommendations").unwrap();
        assert_eq!(sent.body, Some(json!({"text": "rainy sunday", "limit": 24})));

        let set = buffer.snapshot().set.unwrap();
        assert_eq!(set.context().mood, "cozy");
        assert_eq!(set.context().query_text.as_deref(), Some("rainy sunday"));
        assert_eq!(set.displayed().len(), 8);
    }

    #[tokio::test]
    async fn test_blank_text_and_unknown_mood_are_rejected_locally() {
        let h = harness(mood_backend());
        let buffer = RecommendationBuffer::new(h.client.clone());

        let err = buffer
            .load_for_mood(MoodQuery::Text("   ".to_string()), 24)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let err = buffer
            .load_for_mood(MoodQuery::Preset("hangry".to_string()), 24)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_failed_load_clears_previous_tracks() {
        let fail = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = fail.clone();
        let transport = FakeTransport::new(move |_| {
            if flag.load(std::sync::atomic::Ordering::SeqCst) {
                Reply::ok(json!({"error": "Failed to get recommendations", "details": "503"}))
            } else {
                Reply::ok(recommendations_json("sad", 10))
            }
        });
        let h = harness(transport);
        let buffer = RecommendationBuffer::new(h.client.clone());

        buffer
            .load_for_mood(MoodQuery::Preset("sad".to_string()), 10)
            .await
            .unwrap();
        assert_eq!(buffer.displayed().len(), 10);

        fail.store(true, std::sync::atomic::Ordering::SeqCst);
        let err = buffer
            .load_for_mood(MoodQuery::Preset("sad".to_string()), 10)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::BackendRejected { .. }));
        let snapshot = buffer.snapshot();
        assert!(snapshot.set.is_none());
        assert!(!snapshot.loading);
        assert_eq!(
            snapshot.error.as_deref(),
            Some("Failed to load recommendations. Please try again.")
        );

        buffer.dismiss_error();
        assert!(buffer.error().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_during_load_clears_without_banner() {
        let expired = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = expired.clone();
        let h = harness(FakeTransport::new(move |_| {
            if flag.load(std::sync::atomic::Ordering::SeqCst) {
                Reply::unauthorized()
            } else {
                Reply::ok(recommendations_json("sad", 10))
            }
        }));
        let buffer = RecommendationBuffer::new(h.client.clone());
        buffer
            .load_for_mood(MoodQuery::Preset("sad".to_string()), 10)
            .await
            .unwrap();

        expired.store(true, std::sync::atomic::Ordering::SeqCst);
        let err = buffer
            .load_for_mood(MoodQuery::Preset("sad".to_string()), 10)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::AuthRefreshFailed(_)));
        let snapshot = buffer.snapshot();
        assert!(snapshot.set.is_none());
        assert!(snapshot.error.is_none());
        assert!(!snapshot.loading);
        assert_eq!(h.navigator.routes(), vec![crate::session::Route::Login]);
        assert_eq!(h.status.current(), crate::session::SessionState::Unauthenticated);
        assert_eq!(h.transport.count(&POST, "/auth/refresh"), 1);
    }

    #[tokio::test]
    async fn test_network_failure_surfaces_inline_error() {
        let h = harness(FakeTransport::new(|_| Reply::unreachable()));
        let buffer = RecommendationBuffer::new(h.client.clone());

        let err = buffer
            .load_for_mood(MoodQuery::Text("tired".to_string()), 24)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(
            buffer.error().as_deref(),
            Some("Could not analyze your mood. Try selecting one manually.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_result_does_not_overwrite_newer_load() {
        let transport = FakeTransport::new(|req| {
            let mood = req
                .query
                .iter()
                .find(|(k, _)| k == "mood")
                .map(|(_, v)| v.clone())
                .unwrap_or_default();
            let reply = Reply::ok(recommendations_json(&mood, 5));
            if mood == "sad" {
                reply.after(200)
            } else {
                reply.after(10)
            }
        });
        let h = harness(transport);
        let buffer = RecommendationBuffer::new(h.client.clone());

        let (slow, fast) = tokio::join!(
            buffer.load_for_mood(MoodQuery::Preset("sad".to_string()), 5),
            async {
                tokio::time::sleep(Duration::from_millis(1)).await;
                buffer
                    .load_for_mood(MoodQuery::Preset("happy".to_string()), 5)
                    .await
            }
        );

        assert_eq!(slow.unwrap(), LoadOutcome::Superseded);
        assert!(matches!(fast.unwrap(), LoadOutcome::Applied { .. }));
        assert_eq!(buffer.snapshot().set.unwrap().context().mood, "happy");
        assert!(!buffer.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_discards_in_flight_result() {
        let transport =
            FakeTransport::new(|_| Reply::ok(recommendations_json("chill", 5)).after(100));
        let h = harness(transport);
        let buffer = RecommendationBuffer::new(h.client.clone());

        let (outcome, _) = tokio::join!(
            buffer.load_for_mood(MoodQuery::Preset("chill".to_string()), 5),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                assert!(buffer.is_loading());
                buffer.clear();
            }
        );

        assert_eq!(outcome.unwrap(), LoadOutcome::Superseded);
        assert!(buffer.snapshot().set.is_none());
    }

    #[tokio::test]
    async fn test_replace_consumes_reserve_in_order() {
        let h = harness(mood_backend());
        let buffer = RecommendationBuffer::new(h.client.clone());
        buffer
            .load_for_mood(MoodQuery::Preset("happy".to_string()), 60)
            .await
            .unwrap();

        buffer.replace("t3");
        buffer.replace("t7");

        let ids = displayed_ids(&buffer);
        assert_eq!(ids[3], "t50");
        assert_eq!(ids[7], "t51");
        assert_eq!(buffer.snapshot().set.unwrap().reserve_len(), 8);
        assert_eq!(buffer.replace("t3"), Replacement::NotFound);
        // Pure local operation.
        assert_eq!(h.transport.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dislike_replaces_and_sends_feedback() {
        let h = harness(mood_backend());
        let buffer = RecommendationBuffer::new(h.client.clone());
        buffer
            .load_for_mood(MoodQuery::Preset("happy".to_string()), 60)
            .await
            .unwrap();

        let outcome = buffer.dislike("t0");
        assert!(matches!(outcome, Replacement::Swapped { index: 0, .. }));

        tokio::time::sleep(Duration::from_millis(5)).await;

        let sent = h
            .transport
            .last(&POST, "/api/recommendations/feedback")
            .unwrap();
        assert_eq!(
            sent.body,
            Some(json!({"track_id": "t0", "artist_id": "artistt0", "is_liked": false}))
        );
    }

    #[tokio::test]
    async fn test_feedback_failures_are_swallowed_and_not_retried() {
        let h = harness(FakeTransport::new(|_| {
            Reply::json(500, json!({"detail": "database is down"}))
        }));
        let buffer = RecommendationBuffer::new(h.client.clone());

        buffer.submit_feedback("t1", "a1", true).await;

        assert_eq!(h.transport.count(&POST, "/api/recommendations/feedback"), 1);
    }

    #[tokio::test]
    async fn test_feedback_with_malformed_ids_is_not_sent() {
        let h = harness(mood_backend());
        let buffer = RecommendationBuffer::new(h.client.clone());

        buffer.submit_feedback("not a track!", "a1", false).await;
        buffer.submit_feedback("t1", "", false).await;

        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_like_unknown_track_sends_nothing() {
        let h = harness(mood_backend());
        let buffer = RecommendationBuffer::new(h.client.clone());

        assert!(!buffer.like("t1").await);
        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_save_playlist_posts_displayed_uris() {
        let h = harness(mood_backend());
        let buffer = RecommendationBuffer::with_capacity(h.client.clone(), 3);
        buffer
            .load_for_mood(MoodQuery::Preset("happy".to_string()), 60)
            .await
            .unwrap();

        let created = buffer.save_playlist(" Monday ", "", true).await.unwrap();

        assert_eq!(created.id, "pl1");
        let sent = h.transport.last(&POST, "/api/playlists/create").unwrap();
        let body: Value = sent.body.unwrap();
        assert_eq!(body["name"], "Monday");
        assert_eq!(
            body["track_uris"],
            json!(["spotify:track:t0", "spotify:track:t1", "spotify:track:t2"])
        );
        assert_eq!(body["public"], true);
    }

    #[tokio::test]
    async fn test_save_playlist_without_tracks_is_rejected() {
        let h = harness(mood_backend());
        let buffer = RecommendationBuffer::new(h.client.clone());

        let err = buffer.save_playlist("Empty", "", false).await.unwrap_err();

        assert!(matches!(err, ApiError::Validation(_)));
        assert!(h.transport.requests().is_empty());
    }
}
