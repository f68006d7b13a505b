//! Current-weather lookup for the profile payload environment section
//!
//! The recommendation pipeline survives without weather: a missing API key
//! or any call failure degrades to ("unknown", 0.0) instead of aborting.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

const WEATHER_API_BASE: &str = "https://api.openweathermap.org/data/2.5";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// ---------------------------------------------------------------------------
/// Weather Report
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherReport {
  /// Lowercased condition label ("clear", "rain", ...), "unknown" on failure
  pub condition: String,
  pub temp_c: f64,
}

impl WeatherReport {
  pub fn unknown() -> Self {
    Self {
      condition: "unknown".to_string(),
      temp_c: 0.0,
    }
  }
}

#[derive(Debug, Deserialize)]
struct OwmResponse {
  weather: Vec<OwmCondition>,
  main: OwmMain,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
  main: String,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
  temp: f64,
}

/// ---------------------------------------------------------------------------
/// Weather Client
/// ---------------------------------------------------------------------------

pub struct WeatherClient {
  client: Client,
  api_key: Option<String>,
  api_base: String,
}

impl WeatherClient {
  /// API key comes from WEATHER_API_KEY; absence is not an error, the client
  /// just always reports unknown.
  pub fn from_env() -> Self {
    Self::new(env::var("WEATHER_API_KEY").ok(), WEATHER_API_BASE.to_string())
  }

  pub fn new(api_key: Option<String>, api_base: String) -> Self {
    let client = Client::builder()
      .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
      .build()
      .unwrap_or_else(|_| Client::new());

    Self {
      client,
      api_key,
      api_base,
    }
  }

  /// Current weather for a city. Total: every failure path degrades to
  /// WeatherReport::unknown(). Transport errors get one retry.
  pub async fn current(&self, city: &str) -> WeatherReport {
    let Some(key) = &self.api_key else {
      return WeatherReport::unknown();
    };

    let url = match url::Url::parse_with_params(
      &format!("{}/weather", self.api_base),
      &[
        ("q", city),
        ("appid", key.as_str()),
        ("lang", "kr"),
        ("units", "metric"),
      ],
    ) {
      Ok(url) => url,
      Err(_) => return WeatherReport::unknown(),
    };

    for _ in 0..2 {
      match self.try_fetch(url.as_str()).await {
        Some(report) => return report,
        None => continue,
      }
    }
    WeatherReport::unknown()
  }

  async fn try_fetch(&self, url: &str) -> Option<WeatherReport> {
    let response = self.client.get(url).send().await.ok()?;
    if !response.status().is_success() {
      return Some(WeatherReport::unknown());
    }

    let parsed: OwmResponse = response.json().await.ok()?;
    Some(WeatherReport {
      condition: parsed
        .weather
        .first()
        .map(|w| w.main.to_lowercase())
        .unwrap_or_else(|| "unknown".to_string()),
      temp_c: parsed.main.temp,
    })
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_missing_key_degrades_to_unknown() {
    let client = WeatherClient::new(None, "http://localhost:1".to_string());
    let report = client.current("Seoul").await;
    assert_eq!(report, WeatherReport::unknown());
  }

  #[tokio::test]
  async fn test_current_parses_condition_and_temp() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", mockito::Matcher::Regex("^/weather".to_string()))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"weather": [{"main": "Rain"}], "main": {"temp": 18.4}}"#)
      .create_async()
      .await;

    let client = WeatherClient::new(Some("key".to_string()), server.url());
    let report = client.current("Seoul").await;
    assert_eq!(report.condition, "rain");
    assert_eq!(report.temp_c, 18.4);
  }

  #[tokio::test]
  async fn test_api_error_degrades_to_unknown() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", mockito::Matcher::Regex("^/weather".to_string()))
      .with_status(404)
      .with_body(r#"{"cod": "404", "message": "city not found"}"#)
      .create_async()
      .await;

    let client = WeatherClient::new(Some("key".to_string()), server.url());
    let report = client.current("Nowhere").await;
    assert_eq!(report, WeatherReport::unknown());
  }
}
