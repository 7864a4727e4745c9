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

pub mod auth;
pub mod blend;
pub mod buffer;
pub mod client;
pub mod config;
pub mod error;
pub mod inactivity;
pub mod library;
pub mod models;
pub mod recommendations;
pub mod session;
pub mod social;
pub mod store;
pub mod transport;

#[cfg(test)]
mod test_support;

// Re-export key items for convenience
pub use auth::SessionManager;
pub use blend::BlendClient;
pub use buffer::{MoodContext, RecommendationSet, Replacement};
pub use client::ApiClient;
pub use config::{ClientConfig, TokenMode};
pub use error::ApiError;
pub use inactivity::{ActivityEvent, ActivitySource, InactivityMonitor};
pub use library::Library;
pub use recommendations::{LoadOutcome, MoodQuery, RecommendationBuffer, PRESET_MOODS};
pub use session::{Navigator, Route, SessionState};
pub use social::Social;
