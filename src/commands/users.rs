//! User registration commands (the `users` sheet)

use crate::sheets::{SheetsClient, SheetsError, UsersTable, USERS_SHEET};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug, Serialize)]
pub enum UserError {
  #[error("Name must not be empty")]
  EmptyName,

  #[error("Name '{name}' is already registered; try '{suggested}'")]
  DuplicateName { name: String, suggested: String },

  #[error(transparent)]
  Sheets(#[from] SheetsError),
}

/// ---------------------------------------------------------------------------
/// List Users
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn list_users() -> Result<Vec<String>, SheetsError> {
  let sheets = SheetsClient::from_env()?;
  let table = UsersTable::from_values(sheets.read_table(USERS_SHEET).await?)?;
  Ok(table.names())
}

/// ---------------------------------------------------------------------------
/// Register User
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct NewUserProfile {
  pub name: String,
  pub age: u32,
  pub gender: String,
  pub height_cm: String,
  pub weight_kg: String,
  pub activity_level: String,
  pub has_injury: bool,
  pub injury_detail: String,
}

/// Append a profile row; duplicate names are rejected with a free alias so
/// recommendations later resolve to exactly one person.
#[tauri::command]
pub async fn register_user(profile: NewUserProfile) -> Result<(), UserError> {
  let name = profile.name.trim().to_string();
  if name.is_empty() {
    return Err(UserError::EmptyName);
  }

  let sheets = SheetsClient::from_env().map_err(UserError::Sheets)?;
  let table = UsersTable::from_values(sheets.read_table(USERS_SHEET).await?)?;
  let existing = table.names();

  if existing.iter().any(|n| n == &name) {
    return Err(UserError::DuplicateName {
      suggested: suggest_unique_name(&name, &existing),
      name,
    });
  }

  let injury_status = if profile.has_injury { "있음" } else { "없음" };
  sheets
    .append_row(
      USERS_SHEET,
      vec![
        name,
        profile.age.to_string(),
        profile.gender,
        profile.height_cm,
        profile.weight_kg,
        profile.activity_level,
        injury_status.to_string(),
        profile.injury_detail,
      ],
    )
    .await?;

  Ok(())
}

/// First free `name_2`, `name_3`, ... alias
pub fn suggest_unique_name(name: &str, existing: &[String]) -> String {
  let mut i = 2;
  loop {
    let candidate = format!("{}_{}", name, i);
    if !existing.iter().any(|n| n == &candidate) {
      return candidate;
    }
    i += 1;
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_suggest_unique_name_first_alias() {
    let existing = vec!["지민".to_string()];
    assert_eq!(suggest_unique_name("지민", &existing), "지민_2");
  }

  #[test]
  fn test_suggest_unique_name_skips_taken_aliases() {
    let existing = vec!["지민".to_string(), "지민_2".to_string(), "지민_3".to_string()];
    assert_eq!(suggest_unique_name("지민", &existing), "지민_4");
  }
}
