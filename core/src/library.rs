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

use log::info;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::models::{MoodTimeline, PlaylistCreateRequest, PlaylistCreated};
use crate::transport::ApiRequest;

pub const DEFAULT_HISTORY_DAYS: u32 = 30;

/// Saved playlists and mood history.
pub struct Library {
    client: ApiClient,
}

impl Library {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn create_playlist(
        &self,
        request: PlaylistCreateRequest,
    ) -> Result<PlaylistCreated, ApiError> {
        if request.name.trim().is_empty() {
            return Err(ApiError::Validation("Playlist name is required".to_string()));
        }
        if request.track_uris.is_empty() {
            return Err(ApiError::Validation(
                "At least one track is required".to_string(),
            ));
        }

        let body = serde_json::to_value(&request)?;
        let created: PlaylistCreated = self
            .client
            .fetch(ApiRequest::post("/api/playlists/create").json(body))
            .await?;

        info!(
            "Created playlist '{}' with {} tracks",
            created.name, created.tracks_added
        );
        Ok(created)
    }

    /// Mood entries from the last `days` days, newest first.
    pub async fn mood_timeline(&self, days: u32) -> Result<MoodTimeline, ApiError> {
        self.client
            .fetch(ApiRequest::get("/api/history/timeline").query("days", days))
            .await
    }
}
