//! Recommendation pipeline commands

use crate::context::AppContext;
use crate::llm::OpenAiClient;
use crate::playlist::{enrich_recommendations, SpotifyClient};
use crate::recommend::{recommend, Recommendation, RecommendError, RecommendationRequest};
use crate::sheets::{DailyTable, SheetsClient, DAILY_SHEET};
use crate::weather::WeatherClient;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tauri::State;

/// ---------------------------------------------------------------------------
/// Get Recommendation (full pipeline)
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct RecommendationOutcome {
  #[serde(flatten)]
  pub recommendation: Recommendation,
  pub playlists: Vec<crate::models::WorkoutPlaylists>,
}

/// Run the pipeline for one (user, date) and enrich the persisted result
/// with playlists. Enrichment is best-effort: it runs only after the six
/// slots are written and cannot fail the command.
#[tauri::command]
pub async fn get_recommendation(
  state: State<'_, Arc<AppContext>>,
  user: String,
  date: NaiveDate,
  city: String,
) -> Result<RecommendationOutcome, RecommendError> {
  let llm = OpenAiClient::from_env()?;
  let sheets = SheetsClient::from_env()?;
  let weather = WeatherClient::from_env();

  let request = RecommendationRequest { user, date, city };
  let recommendation = recommend(
    &state.catalog,
    state.filter_mode,
    &llm,
    &sheets,
    &weather,
    &request,
  )
  .await?;

  // Missing Spotify credentials only disable enrichment
  let spotify = SpotifyClient::from_env().ok();
  let playlists = enrich_recommendations(
    spotify.as_ref(),
    Some(&llm),
    &recommendation.entries,
    &recommendation.primary_emotion,
    recommendation.purpose.as_deref().unwrap_or(""),
    recommendation
      .target_intensity
      .map(|i| i.label())
      .unwrap_or(""),
    &state.playlist_cache,
  )
  .await;

  Ok(RecommendationOutcome {
    recommendation,
    playlists,
  })
}

/// ---------------------------------------------------------------------------
/// Read Back Stored Slots
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct StoredSlot {
  pub workout_name: String,
  pub reason: String,
}

/// The persisted recommendation of a daily record, resolved by header name
/// (used by the evaluation page).
#[tauri::command]
pub async fn get_recommendation_slots(
  user: String,
  date: NaiveDate,
) -> Result<Vec<StoredSlot>, RecommendError> {
  let sheets = SheetsClient::from_env()?;
  let table = DailyTable::from_values(sheets.read_table(DAILY_SHEET).await?)?;

  let record = table
    .find_record(&user, date)
    .ok_or_else(|| RecommendError::NoDailyRecord {
      user: user.clone(),
      date: date.to_string(),
    })?;

  let slots = table
    .read_slots(&record)
    .ok_or_else(|| RecommendError::NothingStored {
      user,
      date: date.to_string(),
    })?;

  Ok(
    slots
      .into_iter()
      .map(|(workout_name, reason)| StoredSlot {
        workout_name,
        reason,
      })
      .collect(),
  )
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::{FilterMode, WorkoutCatalog};
  use serial_test::serial;
  use tauri::Manager;

  fn test_context() -> Arc<AppContext> {
    let catalog = WorkoutCatalog::from_csv_str(
      "운동명,운동목적\nYoga Flow,스트레스 해소\n",
    )
    .unwrap();
    Arc::new(AppContext::new(catalog, FilterMode::Purpose))
  }

  #[tokio::test]
  #[serial]
  async fn test_get_recommendation_without_api_key_fails() {
    temp_env::async_with_vars(
      [
        ("OPENAI_API_KEY", None::<&str>),
        ("SHEETS_SPREADSHEET_ID", None),
        ("SHEETS_ACCESS_TOKEN", None),
      ],
      async {
        let app = tauri::test::mock_app();
        app.manage(test_context());

        let result = get_recommendation(
          app.state(),
          "지민".to_string(),
          NaiveDate::from_ymd_opt(2025, 11, 3).unwrap(),
          "Seoul".to_string(),
        )
        .await;
        assert!(result.is_err());
      },
    )
    .await;
  }

  #[tokio::test]
  #[serial]
  async fn test_get_recommendation_slots_without_sheets_config_fails() {
    temp_env::async_with_vars(
      [
        ("SHEETS_SPREADSHEET_ID", None::<&str>),
        ("SHEETS_ACCESS_TOKEN", None),
      ],
      async {
        let result = get_recommendation_slots(
          "지민".to_string(),
          NaiveDate::from_ymd_opt(2025, 11, 3).unwrap(),
        )
        .await;
        assert!(result.is_err());
      },
    )
    .await;
  }
}
