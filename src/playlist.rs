//! Spotify playlist enrichment for recommended workouts
//!
//! Strictly best-effort: missing credentials, keyword-derivation failures and
//! search errors all degrade (fallback query, empty suggestion list) and can
//! never fail the recommendation flow. Results are cached per request
//! signature in a small LRU held by the app context.

use crate::llm::{extract_json, OpenAiClient};
use crate::models::{PlaylistSuggestion, RecommendationEntry, WorkoutPlaylists};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::env;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

const SPOTIFY_API_BASE: &str = "https://api.spotify.com";
const SPOTIFY_ACCOUNTS_BASE: &str = "https://accounts.spotify.com";
const SEARCH_MARKET: &str = "KR";
const SEARCH_LIMIT: usize = 3;
const REQUEST_TIMEOUT_SECS: u64 = 10;
const TOKEN_EXPIRY_BUFFER_SECS: u64 = 60;

const KEYWORD_SYSTEM_PROMPT: &str =
  "You are a workout-music curator. Output exactly one JSON object: {\"query\": \"...\"}";

#[derive(Debug, Error)]
pub enum PlaylistError {
  #[error("Missing configuration: {0}")]
  MissingConfig(String),
}

#[derive(Debug, Clone)]
pub struct SpotifyConfig {
  pub client_id: String,
  pub client_secret: String,
}

impl SpotifyConfig {
  pub fn from_env() -> Result<Self, PlaylistError> {
    Ok(Self {
      client_id: env::var("SPOTIFY_CLIENT_ID")
        .map_err(|_| PlaylistError::MissingConfig("SPOTIFY_CLIENT_ID".into()))?,
      client_secret: env::var("SPOTIFY_CLIENT_SECRET")
        .map_err(|_| PlaylistError::MissingConfig("SPOTIFY_CLIENT_SECRET".into()))?,
    })
  }
}

/// ---------------------------------------------------------------------------
/// Spotify Client (client-credentials flow)
/// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
  access_token: String,
  expires_in: u64,
}

struct CachedToken {
  access_token: String,
  expires_at: Instant,
}

pub struct SpotifyClient {
  client: Client,
  config: SpotifyConfig,
  api_base: String,
  accounts_base: String,
  token: Mutex<Option<CachedToken>>,
}

impl SpotifyClient {
  pub fn from_env() -> Result<Self, PlaylistError> {
    Ok(Self::new(
      SpotifyConfig::from_env()?,
      SPOTIFY_API_BASE.to_string(),
      SPOTIFY_ACCOUNTS_BASE.to_string(),
    ))
  }

  pub fn new(config: SpotifyConfig, api_base: String, accounts_base: String) -> Self {
    let client = Client::builder()
      .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
      .build()
      .unwrap_or_else(|_| Client::new());

    Self {
      client,
      config,
      api_base,
      accounts_base,
      token: Mutex::new(None),
    }
  }

  /// Get a valid bearer token, fetching a fresh one when missing or near
  /// expiry. Returns None on any auth failure (the caller degrades).
  async fn access_token(&self) -> Option<String> {
    {
      let cached = self.token.lock().ok()?;
      if let Some(token) = cached.as_ref() {
        if Instant::now() < token.expires_at {
          return Some(token.access_token.clone());
        }
      }
    }

    let response = self
      .client
      .post(format!("{}/api/token", self.accounts_base))
      .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
      .form(&[("grant_type", "client_credentials")])
      .send()
      .await
      .ok()?;

    if !response.status().is_success() {
      return None;
    }

    let token: TokenResponse = response.json().await.ok()?;
    let expires_at = Instant::now()
      + Duration::from_secs(token.expires_in.saturating_sub(TOKEN_EXPIRY_BUFFER_SECS));

    let mut cached = self.token.lock().ok()?;
    *cached = Some(CachedToken {
      access_token: token.access_token.clone(),
      expires_at,
    });
    Some(token.access_token)
  }

  /// Search playlists for a free-text query. Total: any failure yields an
  /// empty list rather than an error.
  pub async fn search_playlists(&self, query: &str) -> Vec<PlaylistSuggestion> {
    let Some(token) = self.access_token().await else {
      return Vec::new();
    };

    let limit = SEARCH_LIMIT.to_string();
    let url = match url::Url::parse_with_params(
      &format!("{}/v1/search", self.api_base),
      &[
        ("q", query),
        ("type", "playlist"),
        ("limit", limit.as_str()),
        ("market", SEARCH_MARKET),
      ],
    ) {
      Ok(url) => url,
      Err(_) => return Vec::new(),
    };

    let response = match self.client.get(url).bearer_auth(&token).send().await {
      Ok(r) if r.status().is_success() => r,
      _ => return Vec::new(),
    };

    match response.json::<serde_json::Value>().await {
      Ok(body) => normalize_playlists(&body),
      Err(_) => Vec::new(),
    }
  }
}

/// Normalize the search payload defensively: null or non-object items are
/// skipped, missing title/owner/url become empty strings.
pub fn normalize_playlists(body: &serde_json::Value) -> Vec<PlaylistSuggestion> {
  let items = body
    .get("playlists")
    .and_then(|p| p.get("items"))
    .and_then(|i| i.as_array());

  let Some(items) = items else {
    return Vec::new();
  };

  items
    .iter()
    .filter_map(|item| {
      let obj = item.as_object()?;
      let title = obj.get("name").and_then(|v| v.as_str()).unwrap_or("");
      let owner = obj
        .get("owner")
        .and_then(|o| o.as_object())
        .and_then(|o| {
          o.get("display_name")
            .and_then(|v| v.as_str())
            .or_else(|| o.get("id").and_then(|v| v.as_str()))
        })
        .unwrap_or("");
      let url = obj
        .get("external_urls")
        .and_then(|e| e.get("spotify"))
        .and_then(|v| v.as_str())
        .unwrap_or("");

      Some(PlaylistSuggestion {
        title: title.to_string(),
        owner: owner.to_string(),
        url: url.to_string(),
      })
    })
    .take(SEARCH_LIMIT)
    .collect()
}

/// ---------------------------------------------------------------------------
/// Query Derivation
/// ---------------------------------------------------------------------------

/// One workout's search-query inputs; also the cache signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuerySignature {
  pub workout: String,
  pub emotion: String,
  pub purpose: String,
  pub intensity: String,
}

impl QuerySignature {
  /// Deterministic fallback used whenever keyword derivation is unavailable
  pub fn fallback_query(&self) -> String {
    format!("{} workout playlist", self.workout)
  }
}

/// Derive a search query for one workout, optionally via a keyword LLM call.
/// Any failure (no client, empty response, parse failure) falls back to the
/// templated query.
pub async fn derive_query(llm: Option<&OpenAiClient>, signature: &QuerySignature) -> String {
  let fallback = signature.fallback_query();

  let Some(llm) = llm else {
    return fallback;
  };

  let payload = json!({
    "workout": signature.workout,
    "emotion": signature.emotion,
    "purpose": signature.purpose,
    "intensity": signature.intensity,
  })
  .to_string();

  let raw = match llm.derive_keyword(KEYWORD_SYSTEM_PROMPT, &payload).await {
    Ok(raw) => raw,
    Err(_) => return fallback,
  };

  let query = extract_json(&raw)
    .ok()
    .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
    .and_then(|v| v.get("query").and_then(|q| q.as_str()).map(str::to_string))
    .unwrap_or_default();

  if query.trim().is_empty() {
    fallback
  } else {
    query
  }
}

/// ---------------------------------------------------------------------------
/// Bounded LRU Cache
/// ---------------------------------------------------------------------------

/// Playlist results keyed by request signature, least-recently-used eviction
pub struct PlaylistCache {
  capacity: usize,
  entries: HashMap<QuerySignature, Vec<PlaylistSuggestion>>,
  order: VecDeque<QuerySignature>,
}

impl PlaylistCache {
  pub fn new(capacity: usize) -> Self {
    Self {
      capacity: capacity.max(1),
      entries: HashMap::new(),
      order: VecDeque::new(),
    }
  }

  pub fn get(&mut self, signature: &QuerySignature) -> Option<Vec<PlaylistSuggestion>> {
    if !self.entries.contains_key(signature) {
      return None;
    }
    self.order.retain(|k| k != signature);
    self.order.push_back(signature.clone());
    self.entries.get(signature).cloned()
  }

  pub fn insert(&mut self, signature: QuerySignature, playlists: Vec<PlaylistSuggestion>) {
    if self.entries.contains_key(&signature) {
      self.order.retain(|k| k != &signature);
    } else if self.entries.len() >= self.capacity {
      if let Some(evicted) = self.order.pop_front() {
        self.entries.remove(&evicted);
      }
    }
    self.order.push_back(signature.clone());
    self.entries.insert(signature, playlists);
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

/// ---------------------------------------------------------------------------
/// Enrichment
/// ---------------------------------------------------------------------------

/// Find playlists for each recommended workout. Sequential by design; the
/// three lookups are independent and recombined by workout identity.
pub async fn enrich_recommendations(
  spotify: Option<&SpotifyClient>,
  llm: Option<&OpenAiClient>,
  entries: &[RecommendationEntry],
  emotion: &str,
  purpose: &str,
  intensity: &str,
  cache: &Mutex<PlaylistCache>,
) -> Vec<WorkoutPlaylists> {
  let mut result = Vec::with_capacity(entries.len());

  for entry in entries {
    let signature = QuerySignature {
      workout: entry.workout_name.clone(),
      emotion: emotion.to_string(),
      purpose: purpose.to_string(),
      intensity: intensity.to_string(),
    };

    if let Some(cached) = cache.lock().ok().and_then(|mut c| c.get(&signature)) {
      result.push(WorkoutPlaylists {
        workout_name: entry.workout_name.clone(),
        playlists: cached,
      });
      continue;
    }

    let playlists = match spotify {
      Some(spotify) => {
        let query = derive_query(llm, &signature).await;
        spotify.search_playlists(&query).await
      }
      None => Vec::new(),
    };

    if let Ok(mut cache) = cache.lock() {
      cache.insert(signature, playlists.clone());
    }

    result.push(WorkoutPlaylists {
      workout_name: entry.workout_name.clone(),
      playlists,
    });
  }

  result
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
