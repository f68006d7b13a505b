//! Recommendation feedback command (the `evaluation` sheet)
//!
//! Feedback is append-only: one row per submitted evaluation, never
//! coordinate updates into existing rows.

use crate::sheets::{SheetsClient, SheetsError, EVALUATION_SHEET};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SURVEY_QUESTION_COUNT: usize = 8;
const RATED_WORKOUT_COUNT: usize = 3;

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug, Serialize)]
pub enum EvaluationError {
  #[error("Invalid evaluation: {0}")]
  Invalid(String),

  #[error(transparent)]
  Sheets(#[from] SheetsError),
}

/// ---------------------------------------------------------------------------
/// Evaluation Input
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct WorkoutRating {
  pub workout_name: String,
  /// Fitness-for-me score, 1..=5
  pub rating: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationInput {
  pub date: NaiveDate,
  pub user: String,
  pub ratings: Vec<WorkoutRating>,
  /// Eight survey answers, each 1..=5
  pub survey: Vec<u8>,
  pub improvement: String,
  pub highlight: String,
}

/// Serialize an evaluation into one append row:
/// date, user, (workout, rating) x3, survey x8, two free-text answers.
pub fn build_evaluation_row(input: &EvaluationInput) -> Result<Vec<String>, EvaluationError> {
  if input.ratings.len() != RATED_WORKOUT_COUNT {
    return Err(EvaluationError::Invalid(format!(
      "expected {} workout ratings, got {}",
      RATED_WORKOUT_COUNT,
      input.ratings.len()
    )));
  }
  if input.survey.len() != SURVEY_QUESTION_COUNT {
    return Err(EvaluationError::Invalid(format!(
      "expected {} survey answers, got {}",
      SURVEY_QUESTION_COUNT,
      input.survey.len()
    )));
  }
  for rating in input.ratings.iter().map(|r| r.rating).chain(input.survey.iter().copied()) {
    if !(1..=5).contains(&rating) {
      return Err(EvaluationError::Invalid(format!(
        "scores must be within 1..=5, got {}",
        rating
      )));
    }
  }

  let mut row = vec![input.date.to_string(), input.user.clone()];
  for rating in &input.ratings {
    row.push(rating.workout_name.clone());
    row.push(rating.rating.to_string());
  }
  row.extend(input.survey.iter().map(u8::to_string));
  row.push(input.improvement.clone());
  row.push(input.highlight.clone());
  Ok(row)
}

#[tauri::command]
pub async fn submit_evaluation(evaluation: EvaluationInput) -> Result<(), EvaluationError> {
  let row = build_evaluation_row(&evaluation)?;
  let sheets = SheetsClient::from_env().map_err(EvaluationError::Sheets)?;
  sheets.append_row(EVALUATION_SHEET, row).await?;
  Ok(())
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
