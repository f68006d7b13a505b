//! LLM integration for workout recommendations
//!
//! This module handles communication with the OpenAI chat completions API
//! for ranking workout candidates and deriving playlist search keywords.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const RECOMMEND_MODEL: &str = "gpt-4o";
const KEYWORD_MODEL: &str = "gpt-4o-mini";
const REQUEST_TIMEOUT_SECS: u64 = 20;

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug, Serialize)]
pub enum LlmError {
  #[error("API key not configured")]
  MissingApiKey,

  #[error("Request failed: {0}")]
  Request(String),

  #[error("API error: {0}")]
  Api(String),

  #[error("Parse error: {0}")]
  Parse(String),
}

/// ---------------------------------------------------------------------------
/// Chat Completions API Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
  model: String,
  messages: Vec<ChatMessage>,
  temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
  role: String,
  content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
  choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
  message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
  content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
  error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
  message: String,
}

/// ---------------------------------------------------------------------------
/// OpenAI Client
/// ---------------------------------------------------------------------------

pub struct OpenAiClient {
  client: Client,
  api_key: String,
  api_base: String,
}

impl OpenAiClient {
  /// Create a new client, loading the API key from the environment
  pub fn from_env() -> Result<Self, LlmError> {
    let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| LlmError::MissingApiKey)?;
    Ok(Self::new(api_key, OPENAI_API_BASE.to_string()))
  }

  pub fn new(api_key: String, api_base: String) -> Self {
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

  /// Call the chat completions endpoint with a system prompt and one user
  /// message, returning the assistant's text.
  pub async fn complete(
    &self,
    model: &str,
    system_prompt: &str,
    user_message: &str,
    temperature: f32,
  ) -> Result<String, LlmError> {
    let request = ChatRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessage {
          role: "system".to_string(),
          content: system_prompt.to_string(),
        },
        ChatMessage {
          role: "user".to_string(),
          content: user_message.to_string(),
        },
      ],
      temperature,
    };

    let response = self
      .client
      .post(format!("{}/chat/completions", self.api_base))
      .bearer_auth(&self.api_key)
      .json(&request)
      .send()
      .await
      .map_err(|e| LlmError::Request(e.to_string()))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| LlmError::Request(e.to_string()))?;

    if !status.is_success() {
      if let Ok(error_resp) = serde_json::from_str::<OpenAiErrorResponse>(&body) {
        return Err(LlmError::Api(error_resp.error.message));
      }
      return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
    }

    let chat_response: ChatResponse =
      serde_json::from_str(&body).map_err(|e| LlmError::Parse(e.to_string()))?;

    chat_response
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.message.content)
      .ok_or_else(|| LlmError::Parse("No message content in response".to_string()))
  }

  /// Ranking call for the recommendation pipeline (temperature 0.6, the
  /// reasons benefit from some variety)
  pub async fn rank_candidates(
    &self,
    system_prompt: &str,
    payload_json: &str,
  ) -> Result<String, LlmError> {
    self
      .complete(RECOMMEND_MODEL, system_prompt, payload_json, 0.6)
      .await
  }

  /// One-line keyword derivation for playlist search
  pub async fn derive_keyword(
    &self,
    system_prompt: &str,
    payload_json: &str,
  ) -> Result<String, LlmError> {
    self
      .complete(KEYWORD_MODEL, system_prompt, payload_json, 0.2)
      .await
  }
}

/// ---------------------------------------------------------------------------
/// JSON Extraction
/// ---------------------------------------------------------------------------

/// Extract the JSON object from an LLM response (handles markdown code
/// blocks with or without a language tag, and surrounding prose).
pub fn extract_json(text: &str) -> Result<String, LlmError> {
  // Bare object first; slice to the last brace so trailing prose is dropped
  let trimmed = text.trim();
  if trimmed.starts_with('{') {
    if let Some(end) = trimmed.rfind('}') {
      return Ok(trimmed[..=end].to_string());
    }
  }

  // Look for JSON in code blocks
  if let Some(start) = text.find("```json") {
    let start = start + 7;
    if let Some(end) = text[start..].find("```") {
      return Ok(text[start..start + end].trim().to_string());
    }
  }

  // Look for plain code blocks
  if let Some(start) = text.find("```") {
    let start = start + 3;
    // Skip language identifier if present
    let content_start = text[start..]
      .find('\n')
      .map(|i| start + i + 1)
      .unwrap_or(start);
    if let Some(end) = text[content_start..].find("```") {
      return Ok(text[content_start..content_start + end].trim().to_string());
    }
  }

  // Last resort: find first { to last }
  if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
    return Ok(text[start..=end].to_string());
  }

  Err(LlmError::Parse("Could not extract JSON from response".to_string()))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
