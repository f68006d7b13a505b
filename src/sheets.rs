//! Spreadsheet store integration (Google Sheets values API)
//!
//! The spreadsheet is the external system of record: `users` holds static
//! profiles, `daily` one row per condition submission, `evaluation`
//! append-only feedback rows. The recommendation slots on a daily row are
//! always addressed by header name, never by fixed offset, so header drift
//! in the sheet surfaces as an explicit error instead of corrupting columns.

use crate::models::{DailyRecord, RecommendationEntry, UserRecord};
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";
const REQUEST_TIMEOUT_SECS: u64 = 20;

pub const USERS_SHEET: &str = "users";
pub const DAILY_SHEET: &str = "daily";
pub const EVALUATION_SHEET: &str = "evaluation";

/// The six recommendation slot columns, resolved by name on every write
pub const SLOT_NAME_COLUMNS: [&str; 3] = ["추천운동1", "추천운동2", "추천운동3"];
pub const SLOT_REASON_COLUMNS: [&str; 3] = ["추천이유1", "추천이유2", "추천이유3"];

#[derive(Debug, Clone)]
pub struct SheetsConfig {
  pub spreadsheet_id: String,
  pub access_token: String,
}

impl SheetsConfig {
  pub fn from_env() -> Result<Self, SheetsError> {
    Ok(Self {
      spreadsheet_id: env::var("SHEETS_SPREADSHEET_ID")
        .map_err(|_| SheetsError::MissingConfig("SHEETS_SPREADSHEET_ID".into()))?,
      access_token: env::var("SHEETS_ACCESS_TOKEN")
        .map_err(|_| SheetsError::MissingConfig("SHEETS_ACCESS_TOKEN".into()))?,
    })
  }
}

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum SheetsError {
  #[error("Missing configuration: {0}")]
  MissingConfig(String),

  #[error("HTTP request failed: {0}")]
  Request(String),

  #[error("Sheets API error: {0}")]
  Api(String),

  #[error("Sheet '{0}' has no data rows")]
  EmptySheet(String),

  #[error("Column '{0}' not found in sheet header")]
  ColumnNotFound(String),

  #[error("No daily record for {0}")]
  RowNotFound(String),
}

/// ---------------------------------------------------------------------------
/// Sheets Client
/// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ValueRange {
  #[serde(default)]
  values: Vec<Vec<String>>,
}

pub struct SheetsClient {
  client: Client,
  config: SheetsConfig,
  api_base: String,
}

impl SheetsClient {
  pub fn from_env() -> Result<Self, SheetsError> {
    Ok(Self::new(SheetsConfig::from_env()?, SHEETS_API_BASE.to_string()))
  }

  pub fn new(config: SheetsConfig, api_base: String) -> Self {
    let client = Client::builder()
      .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
      .build()
      .unwrap_or_else(|_| Client::new());

    Self {
      client,
      config,
      api_base,
    }
  }

  fn values_url(&self, suffix: &str) -> String {
    format!(
      "{}/spreadsheets/{}/values{}",
      self.api_base, self.config.spreadsheet_id, suffix
    )
  }

  /// Fetch all cells of one sheet. Reads are idempotent, so a transport
  /// failure is retried once before giving up.
  pub async fn read_table(&self, sheet: &str) -> Result<Vec<Vec<String>>, SheetsError> {
    let url = self.values_url(&format!("/{}", sheet));

    let mut last_err = None;
    for _ in 0..2 {
      match self.try_read(&url).await {
        Ok(values) => return Ok(values),
        Err(e @ SheetsError::Request(_)) => last_err = Some(e),
        Err(e) => return Err(e),
      }
    }
    Err(last_err.unwrap_or_else(|| SheetsError::Request("read failed".into())))
  }

  async fn try_read(&self, url: &str) -> Result<Vec<Vec<String>>, SheetsError> {
    let response = self
      .client
      .get(url)
      .bearer_auth(&self.config.access_token)
      .send()
      .await
      .map_err(|e| SheetsError::Request(e.to_string()))?;

    if !response.status().is_success() {
      let status = response.status();
      let body = response.text().await.unwrap_or_default();
      return Err(SheetsError::Api(format!("HTTP {}: {}", status, body)));
    }

    let range: ValueRange = response
      .json()
      .await
      .map_err(|e| SheetsError::Api(e.to_string()))?;
    Ok(range.values)
  }

  /// Append one row to the bottom of a sheet
  pub async fn append_row(&self, sheet: &str, row: Vec<String>) -> Result<(), SheetsError> {
    let url = self.values_url(&format!("/{}:append?valueInputOption=USER_ENTERED", sheet));

    let response = self
      .client
      .post(&url)
      .bearer_auth(&self.config.access_token)
      .json(&json!({ "values": [row] }))
      .send()
      .await
      .map_err(|e| SheetsError::Request(e.to_string()))?;

    if !response.status().is_success() {
      let status = response.status();
      let body = response.text().await.unwrap_or_default();
      return Err(SheetsError::Api(format!("HTTP {}: {}", status, body)));
    }

    Ok(())
  }

  /// Write a group of single cells in one batchUpdate request. The group
  /// succeeds or fails as a unit; callers retry the whole group, never
  /// individual cells.
  pub async fn write_cells(&self, updates: &[CellUpdate]) -> Result<(), SheetsError> {
    let url = self.values_url(":batchUpdate");

    let data: Vec<serde_json::Value> = updates
      .iter()
      .map(|u| json!({ "range": u.range, "values": [[u.value]] }))
      .collect();

    let response = self
      .client
      .post(&url)
      .bearer_auth(&self.config.access_token)
      .json(&json!({ "valueInputOption": "USER_ENTERED", "data": data }))
      .send()
      .await
      .map_err(|e| SheetsError::Request(e.to_string()))?;

    if !response.status().is_success() {
      let status = response.status();
      let body = response.text().await.unwrap_or_default();
      return Err(SheetsError::Api(format!("HTTP {}: {}", status, body)));
    }

    Ok(())
  }
}

/// One cell write, already resolved to an A1 range
#[derive(Debug, Clone, PartialEq)]
pub struct CellUpdate {
  pub range: String,
  pub value: String,
}

/// ---------------------------------------------------------------------------
/// Header Resolution
/// ---------------------------------------------------------------------------

/// Resolve a column name against the live header row, 1-based
pub fn column_index(headers: &[String], name: &str) -> Result<usize, SheetsError> {
  headers
    .iter()
    .position(|h| h == name)
    .map(|i| i + 1)
    .ok_or_else(|| SheetsError::ColumnNotFound(name.to_string()))
}

/// A1 column letters for a 1-based column index (1 -> A, 27 -> AA)
pub fn a1_column(mut index: usize) -> String {
  let mut letters = String::new();
  while index > 0 {
    let rem = (index - 1) % 26;
    letters.insert(0, (b'A' + rem as u8) as char);
    index = (index - 1) / 26;
  }
  letters
}

/// ---------------------------------------------------------------------------
/// Users Table
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct UsersTable {
  pub headers: Vec<String>,
  rows: Vec<Vec<String>>,
}

impl UsersTable {
  pub fn from_values(values: Vec<Vec<String>>) -> Result<Self, SheetsError> {
    let mut iter = values.into_iter();
    let headers = iter.next().ok_or(SheetsError::EmptySheet(USERS_SHEET.into()))?;
    Ok(Self {
      headers,
      rows: iter.collect(),
    })
  }

  /// Registered user names, deduped and sorted
  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<String> = self
      .rows
      .iter()
      .filter_map(|r| r.first())
      .map(|n| n.trim().to_string())
      .filter(|n| !n.is_empty())
      .collect();
    names.sort();
    names.dedup();
    names
  }

  pub fn find(&self, name: &str) -> Option<UserRecord> {
    self
      .rows
      .iter()
      .find(|r| r.first().map(|n| n.trim()) == Some(name))
      .map(|r| UserRecord::from_row(&self.headers, r))
  }
}

/// ---------------------------------------------------------------------------
/// Daily Table
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DailyTable {
  pub headers: Vec<String>,
  rows: Vec<Vec<String>>,
}

impl DailyTable {
  pub fn from_values(values: Vec<Vec<String>>) -> Result<Self, SheetsError> {
    let mut iter = values.into_iter();
    let headers = iter.next().ok_or(SheetsError::EmptySheet(DAILY_SHEET.into()))?;
    Ok(Self {
      headers,
      rows: iter.collect(),
    })
  }

  /// Locate the submission for (user, date). The sheet enforces no
  /// uniqueness, so duplicates are possible; the most recently appended row
  /// wins (last-write-wins, matching the write side).
  pub fn find_record(&self, user: &str, date: NaiveDate) -> Option<DailyRecord> {
    let date_idx = self.headers.iter().position(|h| h == "날짜")?;
    let name_idx = self.headers.iter().position(|h| h == "이름")?;

    self
      .rows
      .iter()
      .enumerate()
      .filter(|(_, row)| {
        row.get(name_idx).map(|n| n.trim()) == Some(user)
          && row
            .get(date_idx)
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
            == Some(date)
      })
      .last()
      // +2: header row plus 1-based indexing
      .map(|(i, row)| DailyRecord::from_row(&self.headers, row, i + 2))
  }

  /// Read back the persisted recommendation slots of one record, resolved by
  /// header name. Returns None when any name slot is still empty.
  pub fn read_slots(&self, record: &DailyRecord) -> Option<Vec<(String, String)>> {
    let mut slots = Vec::with_capacity(3);
    for (name_col, reason_col) in SLOT_NAME_COLUMNS.iter().zip(SLOT_REASON_COLUMNS.iter()) {
      let name = record.get(name_col)?.to_string();
      let reason = record.get(reason_col).unwrap_or("").to_string();
      slots.push((name, reason));
    }
    Some(slots)
  }
}

/// ---------------------------------------------------------------------------
/// Recommendation Slot Writes
/// ---------------------------------------------------------------------------

/// Build the six cell updates for a recommendation result. Columns are
/// resolved by name against the live header row; a missing column aborts the
/// whole write before any cell is touched.
pub fn build_slot_updates(
  headers: &[String],
  sheet_row: usize,
  entries: &[RecommendationEntry],
) -> Result<Vec<CellUpdate>, SheetsError> {
  let mut updates = Vec::with_capacity(6);

  for (i, entry) in entries.iter().enumerate() {
    let name_idx = column_index(headers, SLOT_NAME_COLUMNS[i])?;
    updates.push(CellUpdate {
      range: format!("{}!{}{}", DAILY_SHEET, a1_column(name_idx), sheet_row),
      value: entry.workout_name.clone(),
    });
  }
  for (i, entry) in entries.iter().enumerate() {
    let reason_idx = column_index(headers, SLOT_REASON_COLUMNS[i])?;
    updates.push(CellUpdate {
      range: format!("{}!{}{}", DAILY_SHEET, a1_column(reason_idx), sheet_row),
      value: entry.reason.clone(),
    });
  }

  Ok(updates)
}

/// Persist the three recommendations onto their daily row.
/// All six slots are overwritten wholesale; there is no partial update path.
pub async fn write_recommendation(
  client: &SheetsClient,
  headers: &[String],
  sheet_row: usize,
  entries: &[RecommendationEntry],
) -> Result<(), SheetsError> {
  let updates = build_slot_updates(headers, sheet_row, entries)?;
  client.write_cells(&updates).await
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
      "스트레스", "운동목적", "운동장소", "보유장비", "추천운동1", "추천운동2", "추천운동3",
      "추천이유1", "추천이유2", "추천이유3",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
  }

  fn entries() -> Vec<RecommendationEntry> {
    vec![
      RecommendationEntry {
        rank: 1,
        workout_name: "Yoga Flow".into(),
        reason: "수면이 짧아 저강도 위주".into(),
      },
      RecommendationEntry {
        rank: 2,
        workout_name: "플랭크".into(),
        reason: "코어 보강".into(),
      },
      RecommendationEntry {
        rank: 3,
        workout_name: "빠르게 걷기".into(),
        reason: "기분 전환".into(),
      },
    ]
  }

  #[test]
  fn test_a1_column_letters() {
    assert_eq!(a1_column(1), "A");
    assert_eq!(a1_column(11), "K");
    assert_eq!(a1_column(16), "P");
    assert_eq!(a1_column(26), "Z");
    assert_eq!(a1_column(27), "AA");
  }

  #[test]
  fn test_column_index_resolves_by_name() {
    let headers = daily_headers();
    assert_eq!(column_index(&headers, "추천운동1").unwrap(), 11);
    assert_eq!(column_index(&headers, "추천이유3").unwrap(), 16);
    assert!(matches!(
      column_index(&headers, "추천운동4"),
      Err(SheetsError::ColumnNotFound(c)) if c == "추천운동4"
    ));
  }

  #[test]
  fn test_build_slot_updates_canonical_layout() {
    let updates = build_slot_updates(&daily_headers(), 5, &entries()).unwrap();
    assert_eq!(updates.len(), 6);
    assert_eq!(updates[0].range, "daily!K5");
    assert_eq!(updates[0].value, "Yoga Flow");
    assert_eq!(updates[2].range, "daily!M5");
    assert_eq!(updates[3].range, "daily!N5");
    assert_eq!(updates[5].range, "daily!P5");
  }

  #[test]
  fn test_build_slot_updates_follows_header_order_not_position() {
    // Reorder the header: reasons come before workout names
    let mut headers = daily_headers();
    headers.swap(10, 13); // 추천운동1 <-> 추천이유1
    let updates = build_slot_updates(&headers, 3, &entries()).unwrap();
    // 추천운동1 now lives at column N (14)
    assert_eq!(updates[0].range, "daily!N3");
    assert_eq!(updates[3].range, "daily!K3");
  }

  #[test]
  fn test_build_slot_updates_missing_column_aborts() {
    let headers: Vec<String> = daily_headers().into_iter().take(12).collect();
    let result = build_slot_updates(&headers, 5, &entries());
    assert!(matches!(result, Err(SheetsError::ColumnNotFound(_))));
  }

  #[test]
  fn test_slot_round_trip_via_header_names() {
    // persist followed by a header-indexed read returns the same values,
    // independent of physical column ordering
    let headers = daily_headers();
    let updates = build_slot_updates(&headers, 2, &entries()).unwrap();

    let mut row = vec![String::new(); headers.len()];
    row[0] = "2025-11-03".into();
    row[1] = "지민".into();
    for update in &updates {
      let letters: String = update
        .range
        .chars()
        .skip(DAILY_SHEET.len() + 1)
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
      let col = letters
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c as usize - 'A' as usize + 1));
      row[col - 1] = update.value.clone();
    }

    let table = DailyTable::from_values(vec![headers.clone(), row]);
    let table = table.unwrap();
    let record = table
      .find_record("지민", NaiveDate::from_ymd_opt(2025, 11, 3).unwrap())
      .unwrap();
    let slots = table.read_slots(&record).unwrap();
    assert_eq!(slots[0], ("Yoga Flow".to_string(), "수면이 짧아 저강도 위주".to_string()));
    assert_eq!(slots[2].0, "빠르게 걷기");
  }

  #[test]
  fn test_find_record_last_duplicate_wins() {
    let headers = daily_headers();
    let mut row_a = vec![String::new(); headers.len()];
    row_a[0] = "2025-11-03".into();
    row_a[1] = "지민".into();
    row_a[7] = "체중 감량".into();
    let mut row_b = row_a.clone();
    row_b[7] = "스트레스 해소".into();

    let table = DailyTable::from_values(vec![headers, row_a, row_b]).unwrap();
    let record = table
      .find_record("지민", NaiveDate::from_ymd_opt(2025, 11, 3).unwrap())
      .unwrap();
    assert_eq!(record.purpose(), Some("스트레스 해소"));
    assert_eq!(record.sheet_row, 3);
  }

  #[test]
  fn test_read_slots_requires_all_names() {
    let headers = daily_headers();
    let mut row = vec![String::new(); headers.len()];
    row[0] = "2025-11-03".into();
    row[1] = "지민".into();
    row[10] = "Yoga Flow".into(); // only slot 1 written

    let table = DailyTable::from_values(vec![headers, row]).unwrap();
    let record = table
      .find_record("지민", NaiveDate::from_ymd_opt(2025, 11, 3).unwrap())
      .unwrap();
    assert!(table.read_slots(&record).is_none());
  }

  #[test]
  fn test_users_table_names_deduped_sorted() {
    let values = vec![
      vec!["이름".to_string(), "나이 (만나이)".to_string()],
      vec!["지민".to_string(), "25".to_string()],
      vec!["민수".to_string(), "31".to_string()],
      vec!["지민".to_string(), "25".to_string()],
      vec!["".to_string(), "".to_string()],
    ];
    let table = UsersTable::from_values(values).unwrap();
    assert_eq!(table.names(), vec!["민수", "지민"]);
    assert!(table.find("민수").is_some());
    assert!(table.find("없는사람").is_none());
  }

  #[tokio::test]
  async fn test_read_table_parses_values() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", "/spreadsheets/sheet-id/values/daily")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"range": "daily!A1:P3", "values": [["날짜", "이름"], ["2025-11-03", "지민"]]}"#)
      .create_async()
      .await;

    let client = SheetsClient::new(
      SheetsConfig {
        spreadsheet_id: "sheet-id".into(),
        access_token: "token".into(),
      },
      server.url(),
    );
    let values = client.read_table(DAILY_SHEET).await.unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(values[1][1], "지민");
  }

  #[tokio::test]
  async fn test_write_cells_single_batch_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/spreadsheets/sheet-id/values:batchUpdate")
      .with_status(200)
      .with_body(r#"{"totalUpdatedCells": 6}"#)
      .expect(1)
      .create_async()
      .await;

    let client = SheetsClient::new(
      SheetsConfig {
        spreadsheet_id: "sheet-id".into(),
        access_token: "token".into(),
      },
      server.url(),
    );
    let updates = build_slot_updates(&daily_headers(), 5, &entries()).unwrap();
    client.write_cells(&updates).await.unwrap();
    mock.assert_async().await;
  }
}
