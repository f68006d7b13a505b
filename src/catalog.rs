//! Workout catalog loading and rule-based candidate filtering
//!
//! The catalog is a small CSV shipped next to the app (`workout.csv`). It is
//! loaded once at startup and immutable afterwards. Candidate selection is a
//! coarse pre-filter before the LLM ranking call; it never fails and never
//! returns an empty set (an empty filter result falls back to the full
//! catalog).

use encoding_rs::{Encoding, EUC_KR, UTF_8};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

const DEFAULT_CATALOG_PATH: &str = "workout.csv";

/// Catalog column headers (the CSV is authored in Korean)
const COL_NAME: &str = "운동명";
const COL_PURPOSE: &str = "운동목적";
const COL_INTENSITY: &str = "운동강도";

/// Arousal score thresholds for the intensity bucket
const AROUSAL_LOW_MAX: f64 = 2.5;
const AROUSAL_HIGH_MIN: f64 = 3.5;

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug, Serialize)]
pub enum CatalogError {
  #[error("Failed to read catalog file: {0}")]
  Io(String),

  #[error("Catalog could not be decoded as UTF-8 or EUC-KR")]
  Encoding,

  #[error("Catalog CSV is malformed: {0}")]
  Csv(String),

  #[error("Catalog is missing required column '{0}'")]
  MissingColumn(String),

  #[error("Catalog has no workout rows")]
  Empty,
}

/// ---------------------------------------------------------------------------
/// Workout Entries
/// ---------------------------------------------------------------------------

/// Exercise intensity bucket, as labeled in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intensity {
  Low,
  Medium,
  High,
}

impl Intensity {
  /// Parse a catalog cell. Accepts the Korean labels used by the CSV and
  /// English synonyms; anything else is treated as unlabeled.
  pub fn parse(label: &str) -> Option<Self> {
    match label.trim() {
      "저강도" | "low" | "Low" => Some(Intensity::Low),
      "중강도" | "medium" | "Medium" => Some(Intensity::Medium),
      "고강도" | "high" | "High" => Some(Intensity::High),
      _ => None,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      Intensity::Low => "저강도",
      Intensity::Medium => "중강도",
      Intensity::High => "고강도",
    }
  }

  /// Bucket an average arousal score into a target intensity.
  /// Returns None for a missing/non-numeric score (no filtering applies).
  pub fn from_arousal(score: Option<f64>) -> Option<Self> {
    let score = score?;
    if score <= AROUSAL_LOW_MAX {
      Some(Intensity::Low)
    } else if score < AROUSAL_HIGH_MIN {
      Some(Intensity::Medium)
    } else {
      Some(Intensity::High)
    }
  }
}

/// One row of the workout catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutEntry {
  pub name: String,
  pub purpose_tags: Vec<String>,
  pub intensity: Option<Intensity>,
}

impl WorkoutEntry {
  pub fn matches_purpose(&self, purpose: &str) -> bool {
    self.purpose_tags.iter().any(|t| t == purpose)
  }
}

/// Split a comma-delimited tag cell into trimmed, non-empty tags
pub fn split_tags(cell: &str) -> Vec<String> {
  cell
    .split(',')
    .map(|s| s.trim())
    .filter(|s| !s.is_empty())
    .map(|s| s.to_string())
    .collect()
}

/// ---------------------------------------------------------------------------
/// Candidate Filtering
/// ---------------------------------------------------------------------------

/// Which rule pre-filters candidates before the LLM call.
/// Exactly one mode is active per deployment; purpose is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterMode {
  /// Keep workouts whose purpose tags contain today's stated purpose
  Purpose,
  /// Keep workouts whose intensity matches the arousal-derived bucket
  Arousal,
}

impl FilterMode {
  /// Read the deployment's filter mode from MOODFIT_FILTER_MODE
  pub fn from_env() -> Self {
    match env::var("MOODFIT_FILTER_MODE").as_deref() {
      Ok("arousal") => FilterMode::Arousal,
      _ => FilterMode::Purpose,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Catalog
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WorkoutCatalog {
  entries: Vec<WorkoutEntry>,
}

impl WorkoutCatalog {
  /// Load the catalog from MOODFIT_WORKOUT_CSV, or `workout.csv` next to the app
  pub fn load_default() -> Result<Self, CatalogError> {
    let path = env::var("MOODFIT_WORKOUT_CSV").unwrap_or_else(|_| DEFAULT_CATALOG_PATH.to_string());
    Self::load(path)
  }

  pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
    let bytes = fs::read(path.as_ref()).map_err(|e| CatalogError::Io(e.to_string()))?;
    Self::from_bytes(&bytes)
  }

  /// Decode and parse raw CSV bytes. Sheets exported on Windows often arrive
  /// as CP949/EUC-KR, so decoding is tried as UTF-8 (BOM-aware) first and
  /// EUC-KR second.
  pub fn from_bytes(bytes: &[u8]) -> Result<Self, CatalogError> {
    let text = decode_catalog(bytes)?;
    Self::from_csv_str(&text)
  }

  pub fn from_csv_str(text: &str) -> Result<Self, CatalogError> {
    let mut reader = csv::ReaderBuilder::new()
      .trim(csv::Trim::All)
      .from_reader(text.as_bytes());

    let headers = reader
      .headers()
      .map_err(|e| CatalogError::Csv(e.to_string()))?
      .clone();

    let name_idx = header_index(&headers, COL_NAME)?;
    let purpose_idx = header_index(&headers, COL_PURPOSE)?;
    // Intensity is optional; older catalog revisions lack the column
    let intensity_idx = headers.iter().position(|h| h == COL_INTENSITY);

    let mut entries = Vec::new();
    for record in reader.records() {
      let record = record.map_err(|e| CatalogError::Csv(e.to_string()))?;
      let name = record.get(name_idx).unwrap_or("").trim();
      if name.is_empty() {
        continue;
      }
      entries.push(WorkoutEntry {
        name: name.to_string(),
        purpose_tags: split_tags(record.get(purpose_idx).unwrap_or("")),
        intensity: intensity_idx
          .and_then(|i| record.get(i))
          .and_then(Intensity::parse),
      });
    }

    if entries.is_empty() {
      return Err(CatalogError::Empty);
    }

    Ok(Self { entries })
  }

  pub fn entries(&self) -> &[WorkoutEntry] {
    &self.entries
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn contains(&self, workout_name: &str) -> bool {
    self.entries.iter().any(|e| e.name == workout_name)
  }

  /// Whether any catalog row carries an intensity label
  pub fn has_intensity_labels(&self) -> bool {
    self.entries.iter().any(|e| e.intensity.is_some())
  }

  /// Select candidate workouts for today's condition.
  ///
  /// Total by construction: an empty filter result (or missing filter input)
  /// always falls back to the full catalog.
  pub fn select_candidates(
    &self,
    mode: FilterMode,
    purpose: Option<&str>,
    arousal_score: Option<f64>,
  ) -> Vec<WorkoutEntry> {
    let filtered: Vec<WorkoutEntry> = match mode {
      FilterMode::Purpose => match purpose.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => self
          .entries
          .iter()
          .filter(|e| e.matches_purpose(p))
          .cloned()
          .collect(),
        None => Vec::new(),
      },
      FilterMode::Arousal => {
        if !self.has_intensity_labels() {
          Vec::new()
        } else {
          match Intensity::from_arousal(arousal_score) {
            Some(target) => self
              .entries
              .iter()
              .filter(|e| e.intensity == Some(target))
              .cloned()
              .collect(),
            None => Vec::new(),
          }
        }
      }
    };

    if filtered.is_empty() {
      self.entries.clone()
    } else {
      filtered
    }
  }
}

fn header_index(headers: &csv::StringRecord, name: &str) -> Result<usize, CatalogError> {
  headers
    .iter()
    .position(|h| h == name)
    .ok_or_else(|| CatalogError::MissingColumn(name.to_string()))
}

fn decode_catalog(bytes: &[u8]) -> Result<String, CatalogError> {
  // UTF-8 with BOM, then plain UTF-8, then EUC-KR (CP949 exports)
  let encodings: [&'static Encoding; 2] = [UTF_8, EUC_KR];
  for encoding in encodings {
    let (text, _, had_errors) = encoding.decode(bytes);
    if !had_errors {
      return Ok(text.into_owned());
    }
  }
  Err(CatalogError::Encoding)
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  const SAMPLE_CSV: &str = "\
운동명,운동목적,운동강도
Jumping Jacks,체중 감량,고강도
Yoga Flow,스트레스 해소,저강도
플랭크,\"체형 교정, 체력 향상\",중강도
빠르게 걷기,\"체중 감량, 스트레스 해소\",저강도
";

  fn sample_catalog() -> WorkoutCatalog {
    WorkoutCatalog::from_csv_str(SAMPLE_CSV).unwrap()
  }

  #[test]
  fn test_split_tags_trims_and_drops_empty() {
    assert_eq!(split_tags("체중 감량, 체력 향상"), vec!["체중 감량", "체력 향상"]);
    assert_eq!(split_tags(" , ,"), Vec::<String>::new());
    assert_eq!(split_tags(""), Vec::<String>::new());
  }

  #[test]
  fn test_catalog_parses_rows_and_tags() {
    let catalog = sample_catalog();
    assert_eq!(catalog.len(), 4);
    assert!(catalog.contains("플랭크"));

    let plank = catalog
      .entries()
      .iter()
      .find(|e| e.name == "플랭크")
      .unwrap();
    assert_eq!(plank.purpose_tags, vec!["체형 교정", "체력 향상"]);
    assert_eq!(plank.intensity, Some(Intensity::Medium));
  }

  #[test]
  fn test_catalog_missing_purpose_column() {
    let result = WorkoutCatalog::from_csv_str("운동명\nYoga Flow\n");
    assert!(matches!(result, Err(CatalogError::MissingColumn(c)) if c == "운동목적"));
  }

  #[test]
  fn test_catalog_decodes_utf8_bom() {
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(SAMPLE_CSV.as_bytes());
    let catalog = WorkoutCatalog::from_bytes(&bytes).unwrap();
    assert_eq!(catalog.len(), 4);
    // BOM must not leak into the first header
    assert!(catalog.contains("Jumping Jacks"));
  }

  #[test]
  fn test_catalog_decodes_euc_kr() {
    let (encoded, _, _) = EUC_KR.encode(SAMPLE_CSV);
    let catalog = WorkoutCatalog::from_bytes(&encoded).unwrap();
    assert!(catalog.contains("빠르게 걷기"));
  }

  #[test]
  fn test_purpose_filter_exact_match() {
    // Scenario: purpose "스트레스 해소" keeps only matching workouts
    let catalog = sample_catalog();
    let candidates =
      catalog.select_candidates(FilterMode::Purpose, Some("스트레스 해소"), None);
    let names: Vec<&str> = candidates.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Yoga Flow", "빠르게 걷기"]);
  }

  #[test]
  fn test_purpose_filter_unknown_purpose_falls_back() {
    let catalog = sample_catalog();
    let candidates = catalog.select_candidates(FilterMode::Purpose, Some("근력 강화"), None);
    assert_eq!(candidates.len(), catalog.len());
  }

  #[test]
  fn test_purpose_filter_empty_purpose_falls_back() {
    let catalog = sample_catalog();
    assert_eq!(
      catalog.select_candidates(FilterMode::Purpose, None, None).len(),
      catalog.len()
    );
    assert_eq!(
      catalog.select_candidates(FilterMode::Purpose, Some("  "), None).len(),
      catalog.len()
    );
  }

  #[test]
  fn test_arousal_buckets() {
    assert_eq!(Intensity::from_arousal(Some(1.0)), Some(Intensity::Low));
    assert_eq!(Intensity::from_arousal(Some(2.5)), Some(Intensity::Low));
    assert_eq!(Intensity::from_arousal(Some(3.0)), Some(Intensity::Medium));
    // Scenario: 3.9 maps to the high-intensity bucket
    assert_eq!(Intensity::from_arousal(Some(3.9)), Some(Intensity::High));
    assert_eq!(Intensity::from_arousal(None), None);
  }

  #[test]
  fn test_arousal_filter_selects_bucket() {
    let catalog = sample_catalog();
    let candidates = catalog.select_candidates(FilterMode::Arousal, None, Some(3.9));
    let names: Vec<&str> = candidates.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Jumping Jacks"]);
  }

  #[test]
  fn test_arousal_filter_missing_score_falls_back() {
    let catalog = sample_catalog();
    let candidates = catalog.select_candidates(FilterMode::Arousal, None, None);
    assert_eq!(candidates.len(), catalog.len());
  }

  #[test]
  fn test_arousal_filter_without_intensity_column_falls_back() {
    let catalog =
      WorkoutCatalog::from_csv_str("운동명,운동목적\nYoga Flow,스트레스 해소\n").unwrap();
    let candidates = catalog.select_candidates(FilterMode::Arousal, None, Some(4.2));
    assert_eq!(candidates.len(), 1);
  }

  #[test]
  #[serial]
  fn test_filter_mode_from_env() {
    temp_env::with_var("MOODFIT_FILTER_MODE", Some("arousal"), || {
      assert_eq!(FilterMode::from_env(), FilterMode::Arousal);
    });
    temp_env::with_var("MOODFIT_FILTER_MODE", None::<&str>, || {
      assert_eq!(FilterMode::from_env(), FilterMode::Purpose);
    });
  }

  #[test]
  fn test_candidates_never_empty() {
    let catalog = sample_catalog();
    for purpose in [None, Some(""), Some("스트레스 해소"), Some("없는목적")] {
      for score in [None, Some(0.0), Some(2.5), Some(3.4), Some(5.0)] {
        for mode in [FilterMode::Purpose, FilterMode::Arousal] {
          assert!(!catalog.select_candidates(mode, purpose, score).is_empty());
        }
      }
    }
  }
}
