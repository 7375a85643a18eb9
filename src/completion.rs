//! Chat completion client used by the document stages.
//!
//! The pipeline talks to the language model through [`CompletionClient`] so
//! the stages can be exercised without network access. [`OpenAiClient`] is
//! the production implementation for any OpenAI-compatible endpoint.

use crate::{
    config::Config,
    error::{Error, Result},
};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const REQUEST_TIMEOUT_SECS: u64 = 300;
const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// A single-turn completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model name
    pub model: String,

    /// System message describing the assistant's role
    pub system: String,

    /// User message
    pub prompt: String,

    /// Sampling temperature
    pub temperature: f32,
}

/// Something that can answer a [`CompletionRequest`].
pub trait CompletionClient {
    /// Sends the request and returns the answer text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] if the request fails or the response is malformed.
    fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// OpenAI chat completions client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    /// Creates a client for `base_url` (without the `/v1/...` path).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::api(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Creates a client from the pipeline configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no API key is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            Error::config(format!(
                "No API key configured. Set [api].openai_api_key in the settings file or the {} environment variable",
                crate::config::API_KEY_ENV
            ))
        })?;

        Self::new(api_key, config.api_base_url.clone())
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, CHAT_COMPLETIONS_PATH)
    }
}

impl CompletionClient for OpenAiClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatRequest::from(request);

        debug!(
            "Sending completion request to {} (model {}, {} prompt bytes)",
            self.endpoint(),
            request.model,
            request.prompt.len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(Error::api(format!("HTTP {}: {}", status, text)));
        }

        let parsed: ChatResponse = response.json()?;
        info!("Received completion from {}", request.model);

        parsed.into_text()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a CompletionRequest> for ChatRequest<'a> {
    fn from(request: &'a CompletionRequest) -> Self {
        Self {
            model: &request.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn into_text(self) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::api("Response contained no choices"))
            .map(|choice| choice.message.content.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "gpt-4".to_string(),
            system: "You write specifications.".to_string(),
            prompt: "Describe this code".to_string(),
            temperature: 0.7,
        }
    }

    #[test]
    fn test_request_body_shape() {
        let request = request();
        let body = serde_json::to_value(ChatRequest::from(&request)).unwrap();

        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "You write specifications.");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Describe this code");
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_response_text_extraction() {
        let json = r##"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"# Spec"}}]}"##;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.into_text().unwrap(), "# Spec");
    }

    #[test]
    fn test_response_without_choices() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(parsed.into_text(), Err(Error::Api { .. })));
    }

    #[test]
    fn test_null_content_is_empty_text() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.into_text().unwrap(), "");
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let client = OpenAiClient::new("sk-test", "http://localhost:8080/").unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_from_config_requires_key() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = Config::builder().root_dir(temp.path()).build().unwrap();

        let result = OpenAiClient::from_config(&config);
        assert!(result.unwrap_err().is_config());
    }
}
