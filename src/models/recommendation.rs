//! Recommendation output types shared by the pipeline, persistence and UI

use serde::{Deserialize, Serialize};

/// One ranked recommendation from the LLM
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationEntry {
  pub rank: u8,
  #[serde(rename = "workoutName")]
  pub workout_name: String,
  pub reason: String,
}

/// A playlist found for one recommended workout.
/// All fields default to empty strings; the search API omits them freely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PlaylistSuggestion {
  pub title: String,
  pub owner: String,
  pub url: String,
}

/// Playlist suggestions paired with the workout they were found for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutPlaylists {
  pub workout_name: String,
  pub playlists: Vec<PlaylistSuggestion>,
}
