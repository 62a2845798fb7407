//! Blocking client for the Anthropic Messages API.

use std::time::Duration;

use pyreview::{AssistantClient, AssistantError};
use reqwest::blocking::Client;
use serde::Deserialize;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub const DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";
pub const MAX_TOKENS: u32 = 2048;

pub struct AnthropicClient {
    http: Client,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Result<Self, AssistantError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AssistantError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_key,
            model,
        })
    }
}

impl AssistantClient for AnthropicClient {
    fn complete(&self, prompt: &str) -> Result<String, AssistantError> {
        let request = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{"role": "user", "content": prompt}],
        });

        let resp = self
            .http
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .map_err(|e| AssistantError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(AssistantError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = resp
            .json()
            .map_err(|e| AssistantError::MalformedResponse(e.to_string()))?;
        first_text(parsed)
    }
}

fn first_text(resp: MessagesResponse) -> Result<String, AssistantError> {
    resp.content
        .into_iter()
        .next()
        .and_then(|block| block.text)
        .ok_or_else(|| AssistantError::MalformedResponse("no text in first content block".to_owned()))
}
