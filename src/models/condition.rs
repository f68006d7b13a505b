//! User and daily-condition records read from the spreadsheet
//!
//! Sheet cells are untyped strings, so both record types are header-keyed
//! maps with typed accessors. Nothing here validates; downstream stages treat
//! every field as potentially missing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ---------------------------------------------------------------------------
/// Emotion Arousal Constants
/// ---------------------------------------------------------------------------

/// Per-emotion arousal level (1 = calm/depleted, 5 = highly activated).
/// The average over today's selected emotions proxies physiological
/// activation and drives the intensity bucket.
pub const EMOTION_AROUSAL: [(&str, f64); 20] = [
  ("행복", 3.0),
  ("기쁨", 4.0),
  ("설렘", 4.0),
  ("자신감", 3.0),
  ("활력", 5.0),
  ("만족", 2.0),
  ("슬픔", 1.0),
  ("분노", 5.0),
  ("불안", 4.0),
  ("두려움", 4.0),
  ("피로", 1.0),
  ("스트레스", 4.0),
  ("무기력", 1.0),
  ("지루함", 2.0),
  ("외로움", 2.0),
  ("차분함", 2.0),
  ("집중", 3.0),
  ("긴장", 4.0),
  ("놀람", 4.0),
  ("혼란", 3.0),
];

/// Average arousal over the selected emotions.
/// Emotions outside the table are ignored; no known emotion yields None.
pub fn average_arousal<S: AsRef<str>>(emotions: &[S]) -> Option<f64> {
  let scores: Vec<f64> = emotions
    .iter()
    .filter_map(|e| {
      EMOTION_AROUSAL
        .iter()
        .find(|(name, _)| *name == e.as_ref())
        .map(|(_, score)| *score)
    })
    .collect();

  if scores.is_empty() {
    None
  } else {
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
  }
}

/// ---------------------------------------------------------------------------
/// Sheet Records
/// ---------------------------------------------------------------------------

/// Static profile row from the `users` sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
  fields: BTreeMap<String, String>,
}

impl UserRecord {
  pub fn from_row(headers: &[String], row: &[String]) -> Self {
    Self {
      fields: zip_fields(headers, row),
    }
  }

  pub fn get(&self, column: &str) -> Option<&str> {
    self.fields.get(column).map(String::as_str)
  }

  pub fn name(&self) -> &str {
    self.get("이름").unwrap_or("")
  }

  /// All cells, keyed by header, for the prompt payload
  pub fn fields(&self) -> &BTreeMap<String, String> {
    &self.fields
  }
}

/// One submission row from the `daily` sheet, tagged with its 1-based sheet
/// row so recommendation slots can be written back to the same record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRecord {
  /// 1-based row number in the sheet (header row is 1)
  pub sheet_row: usize,
  fields: BTreeMap<String, String>,
}

impl DailyRecord {
  pub fn from_row(headers: &[String], row: &[String], sheet_row: usize) -> Self {
    Self {
      sheet_row,
      fields: zip_fields(headers, row),
    }
  }

  pub fn get(&self, column: &str) -> Option<&str> {
    self
      .fields
      .get(column)
      .map(String::as_str)
      .filter(|v| !v.trim().is_empty())
  }

  pub fn fields(&self) -> &BTreeMap<String, String> {
    &self.fields
  }

  pub fn user_name(&self) -> &str {
    self.get("이름").unwrap_or("")
  }

  pub fn date(&self) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(self.get("날짜")?, "%Y-%m-%d").ok()
  }

  pub fn emotions(&self) -> Vec<String> {
    self
      .get("감정")
      .map(|cell| {
        cell
          .split(',')
          .map(|s| s.trim().to_string())
          .filter(|s| !s.is_empty())
          .collect()
      })
      .unwrap_or_default()
  }

  /// Representative emotion: the first one recorded, checked across the
  /// column names the sheet has used over time.
  pub fn primary_emotion(&self) -> String {
    for column in ["감정", "대표감정", "주요감정", "감정_리스트"] {
      if let Some(cell) = self.get(column) {
        if let Some(first) = cell.split(',').next() {
          let first = first.trim();
          if !first.is_empty() {
            return first.to_string();
          }
        }
      }
    }
    String::new()
  }

  /// The stored average arousal score; the cell may be empty or non-numeric
  pub fn arousal_score(&self) -> Option<f64> {
    self.get("감정_평균각성점수")?.trim().parse().ok()
  }

  pub fn purpose(&self) -> Option<&str> {
    self.get("운동목적")
  }

  pub fn place(&self) -> &str {
    self.get("운동장소").unwrap_or("상관없음")
  }

  pub fn equipment(&self) -> Vec<String> {
    self
      .get("보유장비")
      .map(|cell| {
        cell
          .split(',')
          .map(|s| s.trim().to_string())
          .filter(|s| !s.is_empty() && s != "없음")
          .collect()
      })
      .unwrap_or_default()
  }
}

fn zip_fields(headers: &[String], row: &[String]) -> BTreeMap<String, String> {
  headers
    .iter()
    .enumerate()
    .map(|(i, h)| (h.clone(), row.get(i).cloned().unwrap_or_default()))
    .collect()
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  fn daily_headers() -> Vec<String> {
    [
      "날짜", "이름", "감정", "감정_평균각성점수", "수면 시간", "운동 가능 시간(분)",
      "스트레스", "운동목적", "운동장소", "보유장비",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
  }

  fn daily_row() -> Vec<String> {
    [
      "2025-11-03", "지민", "활력, 긴장", "4.5", "7", "30", "높음", "스트레스 해소",
      "실내(집)", "요가매트, 덤벨",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
  }

  #[test]
  fn test_average_arousal_known_emotions() {
    // 활력(5) + 피로(1) = 3.0
    assert_eq!(average_arousal(&["활력", "피로"]), Some(3.0));
  }

  #[test]
  fn test_average_arousal_ignores_unknown() {
    assert_eq!(average_arousal(&["활력", "멍때림"]), Some(5.0));
    assert_eq!(average_arousal(&["멍때림"]), None);
    assert_eq!(average_arousal::<&str>(&[]), None);
  }

  #[test]
  fn test_daily_record_typed_accessors() {
    let record = DailyRecord::from_row(&daily_headers(), &daily_row(), 5);
    assert_eq!(record.sheet_row, 5);
    assert_eq!(record.user_name(), "지민");
    assert_eq!(record.date(), NaiveDate::from_ymd_opt(2025, 11, 3));
    assert_eq!(record.emotions(), vec!["활력", "긴장"]);
    assert_eq!(record.primary_emotion(), "활력");
    assert_eq!(record.arousal_score(), Some(4.5));
    assert_eq!(record.purpose(), Some("스트레스 해소"));
    assert_eq!(record.place(), "실내(집)");
    assert_eq!(record.equipment(), vec!["요가매트", "덤벨"]);
  }

  #[test]
  fn test_daily_record_short_row_pads_empty() {
    let row: Vec<String> = vec!["2025-11-03".into(), "지민".into()];
    let record = DailyRecord::from_row(&daily_headers(), &row, 2);
    assert_eq!(record.arousal_score(), None);
    assert_eq!(record.purpose(), None);
    assert_eq!(record.place(), "상관없음");
    assert!(record.equipment().is_empty());
  }

  #[test]
  fn test_daily_record_non_numeric_arousal() {
    let mut row = daily_row();
    row[3] = "높음".into();
    let record = DailyRecord::from_row(&daily_headers(), &row, 2);
    assert_eq!(record.arousal_score(), None);
  }

  #[test]
  fn test_equipment_drops_none_marker() {
    let mut row = daily_row();
    row[9] = "없음".into();
    let record = DailyRecord::from_row(&daily_headers(), &row, 2);
    assert!(record.equipment().is_empty());
  }

  #[test]
  fn test_user_record_name() {
    let headers: Vec<String> = vec!["이름".into(), "나이 (만나이)".into()];
    let row: Vec<String> = vec!["지민".into(), "25".into()];
    let record = UserRecord::from_row(&headers, &row);
    assert_eq!(record.name(), "지민");
    assert_eq!(record.get("나이 (만나이)"), Some("25"));
  }
}
