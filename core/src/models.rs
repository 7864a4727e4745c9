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

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalUrls {
    #[serde(default)]
    pub spotify: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Album {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// A recommended track as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub album: Album,
    #[serde(default)]
    pub external_urls: ExternalUrls,
    #[serde(default)]
    pub duration_ms: u64,
}

impl Track {
    /// The artist feedback is attributed to.
    pub fn primary_artist_id(&self) -> Option<&str> {
        self.artists.first().map(|a| a.id.as_str())
    }

    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<&str>>()
            .join(", ")
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_secs = self.duration_ms / 1000;
        let preview = if self.preview_url.is_some() {
            " [preview]"
        } else {
            ""
        };

        write!(
            f,
            "[{}] {} - {} ({}:{:02}){}",
            self.id,
            self.name,
            self.artist_names(),
            total_secs / 60,
            total_secs % 60,
            preview
        )
    }
}

/// Identity of the logged-in user, as reported by `/auth/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

impl AuthUser {
    pub fn avatar_urls(&self) -> Vec<&str> {
        self.images.iter().map(|i| i.url.as_str()).collect()
    }

    /// Display name when set, otherwise the account id.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthStatusResponse {
    pub authenticated: bool,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub mood: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub detected_from_text: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackRequest {
    pub track_id: String,
    pub artist_id: String,
    pub is_liked: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackResponse {
    #[serde(default)]
    pub message: String,
    pub is_liked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistCreateRequest {
    pub name: String,
    pub track_uris: Vec<String>,
    pub description: String,
    pub public: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistCreated {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
    pub tracks_added: u32,
}

/// Condensed track stored with a history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackPreview {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub album_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodEntry {
    pub id: i64,
    pub mood: String,
    pub timestamp: String,
    #[serde(default)]
    pub playlist_id: Option<String>,
    #[serde(default)]
    pub tracks: Vec<TrackPreview>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoodTimeline {
    #[serde(default)]
    pub mood_distribution: BTreeMap<String, u32>,
    #[serde(default)]
    pub recent_entries: Vec<MoodEntry>,
}

impl MoodTimeline {
    /// Most frequent mood; ties resolve to the alphabetically first name.
    pub fn dominant_mood(&self) -> Option<&str> {
        self.mood_distribution
            .iter()
            .max_by(|(a_name, a_count), (b_name, b_count)| {
                a_count.cmp(b_count).then_with(|| b_name.cmp(a_name))
            })
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlendCreated {
    pub session_id: String,
    pub host_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlendParticipant {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_host: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlendRoom {
    pub id: String,
    pub host_id: String,
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub participants: Vec<BlendParticipant>,
}

impl BlendRoom {
    pub fn is_host(&self, user_id: &str) -> bool {
        self.host_id == user_id
    }
}

/// Another listener as shown in search results and the friends feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialUser {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl SocialUser {
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// A followed user's mood entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    pub id: i64,
    /// Missing when the author's account no longer exists.
    #[serde(default)]
    pub user: Option<SocialUser>,
    pub mood: String,
    pub timestamp: String,
    #[serde(default)]
    pub tracks: Vec<TrackPreview>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SocialFeed {
    #[serde(default)]
    pub feed: Vec<FeedEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserSearchResponse {
    #[serde(default)]
    pub users: Vec<SocialUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FollowResponse {
    pub message: String,
}
