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

use serde::Serialize;
use std::collections::{HashSet, VecDeque};

use crate::models::Track;

pub const DEFAULT_DISPLAY_CAPACITY: usize = 50;

/// What produced a recommendation set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodContext {
    /// Mood id, either the preset that was picked or the one inferred from text.
    pub mood: String,
    /// Free text the mood was inferred from, if any.
    pub query_text: Option<String>,
    pub description: String,
}

/// Result of [`RecommendationSet::replace`].
#[derive(Debug, Clone, PartialEq)]
pub enum Replacement {
    /// The track at `index` was swapped for the head of the reserve.
    Swapped { index: usize, removed: Track },
    /// The reserve was empty, so the track was dropped and the list shrank.
    Removed { index: usize, removed: Track },
    /// The track was not displayed.
    NotFound,
}

/// One mood query's tracks: the displayed list plus an unseen reserve.
///
/// Both lists keep the backend's ranking. Tracks only ever move from the
/// reserve into the displayed list, or out of the set altogether.
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationSet {
    context: MoodContext,
    displayed: Vec<Track>,
    reserve: VecDeque<Track>,
}

impl RecommendationSet {
    /// Splits ranked tracks into the first `capacity` displayed and the rest held back.
    ///
    /// Repeated ids are dropped (first occurrence wins), so the two lists never overlap.
    pub fn partition(context: MoodContext, tracks: Vec<Track>, capacity: usize) -> Self {
        let mut seen = HashSet::new();
        let mut unique: Vec<Track> = tracks
            .into_iter()
            .filter(|t| seen.insert(t.id.clone()))
            .collect();

        let reserve: VecDeque<Track> = if unique.len() > capacity {
            unique.split_off(capacity).into()
        } else {
            VecDeque::new()
        };

        Self {
            context,
            displayed: unique,
            reserve,
        }
    }

    pub fn context(&self) -> &MoodContext {
        &self.context
    }

    pub fn displayed(&self) -> &[Track] {
        &self.displayed
    }

    pub fn reserve(&self) -> impl ExactSizeIterator<Item = &Track> {
        self.reserve.iter()
    }

    pub fn reserve_len(&self) -> usize {
        self.reserve.len()
    }

    /// Displayed plus reserve.
    pub fn total(&self) -> usize {
        self.displayed.len() + self.reserve.len()
    }

    pub fn is_empty(&self) -> bool {
        self.displayed.is_empty()
    }

    pub fn get(&self, track_id: &str) -> Option<&Track> {
        self.displayed.iter().find(|t| t.id == track_id)
    }

    /// Swaps a displayed track for the best reserved one, or drops it if the reserve is empty.
    ///
    /// Never touches the network; other displayed tracks keep their positions.
    pub fn replace(&mut self, track_id: &str) -> Replacement {
        let Some(index) = self.displayed.iter().position(|t| t.id == track_id) else {
            return Replacement::NotFound;
        };

        match self.reserve.pop_front() {
            Some(next) => {
                let removed = std::mem::replace(&mut self.displayed[index], next);
                Replacement::Swapped { index, removed }
            }
            None => {
                let removed = self.displayed.remove(index);
                Replacement::Removed { index, removed }
            }
        }
    }

    /// URIs of the displayed tracks, in order.
    pub fn track_uris(&self) -> Vec<String> {
        self.displayed.iter().map(|t| t.uri.clone()).collect()
    }
}
