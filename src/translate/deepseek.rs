//! DeepSeek (OpenAI-compatible) chat/completions client.
//! Turns a fully tagged string into natural-language text with one
//! non-streaming request. No retries: a failed call fails the translation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{TextGenerator, TranslateError};
use crate::config::GeneratorConfig;

/// Fixed instruction sent with every generation request.
const SYSTEM_PROMPT: &str = "You turn sequences of bracketed semantic tags into natural-language text. \
Each [tag] names one concept; characters outside brackets are punctuation or spacing to keep. \
Write fluent text whose meaning matches the tags in order. Output only that text, nothing else.";

const TEMPERATURE: f32 = 0.3;

pub struct DeepSeekClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl DeepSeekClient {
    /// Build a client from config. Fails when no API key is configured.
    pub fn new(config: &GeneratorConfig) -> Result<Self, TranslateError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| TranslateError::InvalidInput("DEEPSEEK_API_KEY is not set".into()))?;

        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TranslateError::ApiError(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn build_request<'a>(&'a self, tagged: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: tagged,
                },
            ],
            temperature: TEMPERATURE,
            stream: false,
        }
    }
}

#[async_trait]
impl TextGenerator for DeepSeekClient {
    async fn generate(&self, tagged: &str) -> Result<String, TranslateError> {
        let start = Instant::now();
        let result = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.build_request(tagged))
            .send()
            .await;

        let response = match result {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => return Err(TranslateError::Timeout),
            Err(e) => return Err(TranslateError::ApiError(e.to_string())),
        };

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body_text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| TranslateError::ApiError(format!("invalid response body: {e}")))?;
        let text = extract_text(parsed)?;

        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            chars = text.chars().count(),
            "generation complete"
        );
        Ok(text)
    }
}

/// Any non-2xx reply, 429 included, is a plain API error; nothing is retried.
fn status_error(status: reqwest::StatusCode, body: &str) -> TranslateError {
    TranslateError::ApiError(format!(
        "unexpected status {}: {}",
        status,
        body.chars().take(200).collect::<String>()
    ))
}

fn extract_text(response: ChatResponse) -> Result<String, TranslateError> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(TranslateError::ApiError("generation returned empty text".into()));
    }
    Ok(text)
}

// --- Wire types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: Option<&str>) -> GeneratorConfig {
        GeneratorConfig {
            api_key: api_key.map(str::to_string),
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn requires_api_key() {
        assert!(matches!(
            DeepSeekClient::new(&config(None)),
            Err(TranslateError::InvalidInput(_))
        ));
        assert!(DeepSeekClient::new(&config(Some("  "))).is_err());
    }

    #[test]
    fn request_carries_system_prompt_and_tagged_input() {
        let client = DeepSeekClient::new(&config(Some("sk-test"))).unwrap();
        let body = serde_json::to_value(client.build_request("[greet]")).unwrap();
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], SYSTEM_PROMPT);
        assert_eq!(body["messages"][1]["content"], "[greet]");
    }

    #[test]
    fn extracts_trimmed_first_choice() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  Hello!\n"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(parsed).unwrap(), "Hello!");
    }

    #[test]
    fn rate_limit_is_an_api_error() {
        let err = status_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, TranslateError::ApiError(_)));
        assert!(err.to_string().contains("429"));

        let long_body = "x".repeat(500);
        let TranslateError::ApiError(msg) =
            status_error(reqwest::StatusCode::BAD_GATEWAY, &long_body)
        else {
            panic!("expected ApiError");
        };
        assert!(msg.contains("502"));
        assert!(msg.len() < 300);
    }

    #[test]
    fn empty_completion_is_an_error() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(extract_text(parsed).is_err());
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(extract_text(parsed).is_err());
    }
}
