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
use crate::models::{FeedEntry, FollowResponse, SocialFeed, SocialUser, UserSearchResponse};
use crate::transport::ApiRequest;

/// Following other listeners and reading what they have been in the mood for.
pub struct Social {
    client: ApiClient,
}

impl Social {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Recent mood entries of followed users, newest first.
    pub async fn feed(&self) -> Result<Vec<FeedEntry>, ApiError> {
        let response: SocialFeed = self
            .client
            .fetch(ApiRequest::get("/api/social/feed"))
            .await?;
        Ok(response.feed)
    }

    pub async fn search_users(&self, query: &str) -> Result<Vec<SocialUser>, ApiError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ApiError::Validation("Type a name to search for".to_string()));
        }

        let response: UserSearchResponse = self
            .client
            .fetch(ApiRequest::get("/api/social/search-users").query("q", query))
            .await?;
        Ok(response.users)
    }

    /// Follows a user and returns the backend's confirmation.
    ///
    /// The backend reports "cannot follow yourself" and unknown users with a
    /// 200 carrying an `error` field; those come back as rejections.
    pub async fn follow(&self, user_id: &str) -> Result<String, ApiError> {
        let user_id = user_id.trim();
        if user_id.is_empty()
            || user_id.contains(['/', '?', '#'])
            || user_id.contains(char::is_whitespace)
        {
            return Err(ApiError::Validation(format!("Invalid user id '{}'", user_id)));
        }

        let response: FollowResponse = self
            .client
            .fetch(ApiRequest::post(format!("/api/social/follow/{}", user_id)))
            .await?;
        info!("Follow {}: {}", user_id, response.message);
        Ok(response.message)
    }
}
