pub mod condition;
pub mod recommendation;

pub use condition::{average_arousal, DailyRecord, UserRecord};
pub use recommendation::{PlaylistSuggestion, RecommendationEntry, WorkoutPlaylists};
