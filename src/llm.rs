//! Text completion against an OpenAI-compatible chat endpoint.
//!
//! The rest of the crate only sees [`Generator`], so tests can swap in a
//! scripted fake.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// No timeout when unset.
    pub timeout_secs: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.0,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API key not set: export {0}")]
    MissingApiKey(String),
    #[error("failed to create HTTP client: {0}")]
    Client(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("HTTP {status} from {endpoint}: {body}")]
    Status {
        status: u16,
        endpoint: String,
        body: String,
    },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("model returned an empty completion")]
    EmptyResponse,
}

/// Produces text for a prompt. Blocking.
pub trait Generator {
    fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

pub struct OpenAiClient {
    config: LlmConfig,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(config.api_key_env.clone()))?;

        // reqwest's blocking client defaults to 30s; keep it unbounded unless asked.
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout_secs.map(Duration::from_secs))
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

impl Generator for OpenAiClient {
    fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = self.url();
        let request = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %self.config.model, prompt_chars = prompt.chars().count(), "requesting completion");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                endpoint: url,
                body,
            });
        }

        let body = response
            .text()
            .map_err(|e| LlmError::Http(e.to_string()))?;
        extract_content(&body)
    }
}

/// Pulls the first choice's text out of a chat-completions response body.
fn extract_content(body: &str) -> Result<String, LlmError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text)
}
