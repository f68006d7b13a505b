//! The recommendation-request pipeline
//!
//! Candidate filtering and profile assembly feed one LLM ranking call; the
//! response is parsed and validated against the candidate set, then the three
//! results are persisted wholesale onto the matching daily row. Parsing is
//! strict: fewer than three entries, duplicate ranks or invented workout
//! names abort the request, never silently padded or truncated.

use crate::catalog::{FilterMode, Intensity, WorkoutCatalog, WorkoutEntry};
use crate::llm::{extract_json, LlmError, OpenAiClient};
use crate::models::{DailyRecord, RecommendationEntry, UserRecord};
use crate::sheets::{
  write_recommendation, DailyTable, SheetsClient, SheetsError, UsersTable, DAILY_SHEET,
  USERS_SHEET,
};
use crate::weather::{WeatherClient, WeatherReport};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use thiserror::Error;

/// Ranking instructions handed to the LLM (emotion-first policy)
const COACH_SYSTEM_PROMPT: &str = include_str!("prompts/coach_system.txt");

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug, Serialize)]
pub enum RecommendError {
  #[error("Unknown user '{0}'")]
  UserNotFound(String),

  #[error("No daily record for {user} on {date}")]
  NoDailyRecord { user: String, date: String },

  #[error("No stored recommendation for {user} on {date}")]
  NothingStored { user: String, date: String },

  #[error("LLM returned an empty response")]
  EmptyResponse,

  #[error("Could not parse LLM response as JSON")]
  Parse {
    /// The raw response text, surfaced for diagnostics
    raw: String,
  },

  #[error("LLM response violates the top3 schema: {0}")]
  Schema(String),

  #[error(transparent)]
  Llm(#[from] LlmError),

  #[error(transparent)]
  Sheets(#[from] SheetsError),
}

/// ---------------------------------------------------------------------------
/// Profile Assembly
/// ---------------------------------------------------------------------------

/// Merge the static profile, today's condition and the environment into the
/// payload the LLM sees. Pure data merge; cells stay untyped strings.
pub fn assemble_profile(
  user: &UserRecord,
  daily: &DailyRecord,
  weather: &WeatherReport,
) -> serde_json::Value {
  json!({
    "static_profile": user.fields(),
    "today_condition": daily.fields(),
    "environment": {
      "weather": weather.condition,
      "temp_c": weather.temp_c,
    },
  })
}

/// ---------------------------------------------------------------------------
/// Prompt Building
/// ---------------------------------------------------------------------------

/// Render the system instructions and the machine payload for the ranking
/// call. The system text is static policy; the payload carries the profile
/// and the candidate list.
pub fn build_prompt(
  profile: &serde_json::Value,
  candidates: &[WorkoutEntry],
) -> (&'static str, String) {
  let rule_candidates: Vec<serde_json::Value> = candidates
    .iter()
    .map(|entry| {
      json!({
        "workoutName": entry.name,
        "purposeTags": entry.purpose_tags,
        "intensity": entry.intensity.map(|i| i.label()),
      })
    })
    .collect();

  let payload = json!({
    "user_profile": profile,
    "rule_candidates": rule_candidates,
  });

  (COACH_SYSTEM_PROMPT, payload.to_string())
}

/// ---------------------------------------------------------------------------
/// Response Parsing
/// ---------------------------------------------------------------------------

/// Parse and validate the LLM response against the candidate set.
///
/// Returns the three entries ordered by rank. Hard-stops on anything other
/// than exactly ranks {1,2,3} over candidate workout names.
pub fn parse_top3(
  raw: &str,
  candidates: &[WorkoutEntry],
) -> Result<Vec<RecommendationEntry>, RecommendError> {
  if raw.trim().is_empty() {
    return Err(RecommendError::EmptyResponse);
  }

  let json_str = extract_json(raw).map_err(|_| RecommendError::Parse {
    raw: raw.to_string(),
  })?;

  let value: serde_json::Value =
    serde_json::from_str(&json_str).map_err(|_| RecommendError::Parse {
      raw: raw.to_string(),
    })?;

  let top3 = value
    .get("top3")
    .cloned()
    .ok_or_else(|| RecommendError::Schema("missing 'top3' key".to_string()))?;

  let mut entries: Vec<RecommendationEntry> = serde_json::from_value(top3)
    .map_err(|e| RecommendError::Schema(format!("invalid top3 entries: {}", e)))?;
  if entries.len() != 3 {
    return Err(RecommendError::Schema(format!(
      "expected 3 entries, got {}",
      entries.len()
    )));
  }

  let ranks: BTreeSet<u8> = entries.iter().map(|e| e.rank).collect();
  if ranks != BTreeSet::from([1, 2, 3]) {
    return Err(RecommendError::Schema(format!(
      "ranks must be exactly 1..3, got {:?}",
      entries.iter().map(|e| e.rank).collect::<Vec<_>>()
    )));
  }

  for entry in &entries {
    if !candidates.iter().any(|c| c.name == entry.workout_name) {
      return Err(RecommendError::Schema(format!(
        "'{}' is not in the candidate set",
        entry.workout_name
      )));
    }
  }

  entries.sort_by_key(|e| e.rank);
  Ok(entries)
}

/// ---------------------------------------------------------------------------
/// Pipeline
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
  pub user: String,
  pub date: NaiveDate,
  pub city: String,
}

/// Everything the UI needs after a successful run (playlist enrichment is
/// layered on top by the command, never inside the pipeline).
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
  pub entries: Vec<RecommendationEntry>,
  pub weather: WeatherReport,
  pub purpose: Option<String>,
  pub target_intensity: Option<Intensity>,
  pub primary_emotion: String,
}

/// Run the full recommendation pipeline for one (user, date) record.
///
/// The six slot cells are written as one grouped update; on failure the
/// whole request can be retried, the target row is re-derived each call.
pub async fn recommend(
  catalog: &WorkoutCatalog,
  mode: FilterMode,
  llm: &OpenAiClient,
  sheets: &SheetsClient,
  weather_client: &WeatherClient,
  request: &RecommendationRequest,
) -> Result<Recommendation, RecommendError> {
  // Both stores are re-read fully on each request; no incremental sync
  let users = UsersTable::from_values(sheets.read_table(USERS_SHEET).await?)?;
  let user = users
    .find(&request.user)
    .ok_or_else(|| RecommendError::UserNotFound(request.user.clone()))?;

  let daily = DailyTable::from_values(sheets.read_table(DAILY_SHEET).await?)?;
  let record = daily
    .find_record(&request.user, request.date)
    .ok_or_else(|| RecommendError::NoDailyRecord {
      user: request.user.clone(),
      date: request.date.to_string(),
    })?;

  let weather = weather_client.current(&request.city).await;

  let candidates = catalog.select_candidates(mode, record.purpose(), record.arousal_score());

  let profile = assemble_profile(&user, &record, &weather);
  let (system_prompt, payload) = build_prompt(&profile, &candidates);

  let raw = llm.rank_candidates(system_prompt, &payload).await?;
  let entries = parse_top3(&raw, &candidates)?;

  write_recommendation(sheets, &daily.headers, record.sheet_row, &entries).await?;

  Ok(Recommendation {
    purpose: record.purpose().map(str::to_string),
    target_intensity: Intensity::from_arousal(record.arousal_score()),
    primary_emotion: record.primary_emotion(),
    entries,
    weather,
  })
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
