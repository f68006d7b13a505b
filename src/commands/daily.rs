//! Daily condition entry command (the `daily` sheet)

use crate::models::average_arousal;
use crate::sheets::{SheetsClient, SheetsError, DAILY_SHEET};
use chrono::NaiveDate;
use serde::Deserialize;

/// Number of recommendation slot cells reserved on every new daily row
/// (3 workout names + 3 reasons)
const SLOT_CELL_COUNT: usize = 6;

/// ---------------------------------------------------------------------------
/// Daily Entry
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct DailyEntryInput {
  pub date: NaiveDate,
  pub user: String,
  pub emotions: Vec<String>,
  pub sleep_hours: u32,
  pub available_minutes: u32,
  pub stress_level: String,
  pub purpose: String,
  pub place: String,
  pub equipment: Vec<String>,
}

/// Serialize an entry into the canonical 16-column daily row: ten condition
/// cells followed by six empty recommendation slots.
pub fn build_daily_row(input: &DailyEntryInput) -> Vec<String> {
  let arousal = average_arousal(&input.emotions)
    .map(|s| format!("{:.2}", s))
    .unwrap_or_default();

  let equipment = if input.equipment.is_empty() {
    "없음".to_string()
  } else {
    input.equipment.join(", ")
  };

  let mut row = vec![
    input.date.to_string(),
    input.user.clone(),
    input.emotions.join(", "),
    arousal,
    input.sleep_hours.to_string(),
    input.available_minutes.to_string(),
    input.stress_level.clone(),
    input.purpose.clone(),
    input.place.clone(),
    equipment,
  ];
  row.extend(std::iter::repeat(String::new()).take(SLOT_CELL_COUNT));
  row
}

/// Append today's condition. The recommendation page later locates this row
/// by (user, date) and overwrites the six reserved slots.
#[tauri::command]
pub async fn save_daily_entry(entry: DailyEntryInput) -> Result<(), SheetsError> {
  let sheets = SheetsClient::from_env()?;
  sheets.append_row(DAILY_SHEET, build_daily_row(&entry)).await
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
