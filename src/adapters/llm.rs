//! Ollama-compatible client that turns OCR text into ticket fields.
//!
//! The server is asked for a non-streamed completion; the first JSON object
//! in the reply is parsed and returned. Network failures are retried with
//! exponential backoff, everything else is reported inline as an
//! error-tagged [`ParsedFields::Failure`].

use crate::config::LlmSettings;
use crate::core::prompt::build_prompt;
use crate::core::text::{extract_json_block, prefilter_ocr};
use crate::domain::model::{LlmFailure, LlmFailureKind, ParsedFields};
use crate::domain::ports::TicketParser;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: f64,
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    /// Delay slept after the given 1-based attempt fails: `unit * base^attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        self.backoff_unit.mul_f64(self.backoff_base.powi(exponent))
    }
}

impl From<&LlmSettings> for RetryPolicy {
    fn from(settings: &LlmSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            backoff_base: settings.backoff_base,
            backoff_unit: settings.backoff_unit(),
        }
    }
}

/// Request body of `POST /api/generate`.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Failure of a single round trip, before retry policy is applied.
#[derive(Debug)]
struct AttemptError {
    kind: LlmFailureKind,
    detail: String,
}

impl AttemptError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self {
                kind: LlmFailureKind::Timeout,
                detail: format!("timeout: {}", err),
            }
        } else if err.is_connect() || err.is_request() || err.is_status() {
            Self {
                kind: LlmFailureKind::RequestFailed,
                detail: err.to_string(),
            }
        } else {
            Self {
                kind: LlmFailureKind::UnknownError,
                detail: err.to_string(),
            }
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            LlmFailureKind::Timeout | LlmFailureKind::RequestFailed
        )
    }
}

pub struct OllamaClient {
    client: Client,
    url: String,
    model: String,
    retry: RetryPolicy,
}

impl OllamaClient {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let client = Client::builder().timeout(settings.timeout()).build()?;

        Ok(Self {
            client,
            url: settings.url.clone(),
            model: settings.model.clone(),
            retry: RetryPolicy::from(settings),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> std::result::Result<String, AttemptError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(AttemptError::from_reqwest)?;

        tracing::debug!("LLM response status: {}", response.status());

        let body = response
            .error_for_status()
            .map_err(AttemptError::from_reqwest)?
            .text()
            .await
            .map_err(AttemptError::from_reqwest)?;

        Ok(raw_reply_from_body(&body))
    }
}

#[async_trait]
impl TicketParser for OllamaClient {
    async fn parse_ticket(&self, ocr_text: &str) -> ParsedFields {
        let short_text = prefilter_ocr(ocr_text);
        let prompt = build_prompt(&short_text, chrono::Local::now().naive_local());
        let mut last_detail = String::new();

        for attempt in 1..=self.retry.max_attempts {
            tracing::debug!(attempt, model = %self.model, "Requesting ticket fields from LLM");

            match self.generate(&prompt).await {
                Ok(raw) => return interpret_reply(&raw),
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(
                        "LLM attempt {} failed ({}): {}. Retrying in {:?}",
                        attempt,
                        err.kind,
                        err.detail,
                        delay
                    );
                    last_detail = err.detail;
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    tracing::error!("LLM request failed ({}): {}", err.kind, err.detail);
                    return LlmFailure::with_detail(err.kind, err.detail).into();
                }
            }
        }

        LlmFailure::with_detail(LlmFailureKind::FailedAfterRetries, last_detail).into()
    }
}

/// Picks the model's text out of a generate response body: `response`,
/// then `generated`, then the whole JSON document; a non-object body is
/// used verbatim.
fn raw_reply_from_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => ["response", "generated"]
            .iter()
            .filter_map(|key| map.get(*key).and_then(Value::as_str))
            .find(|text| !text.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
        _ => body.to_string(),
    }
}

/// Parses the first JSON object found in the model's reply.
pub fn interpret_reply(raw: &str) -> ParsedFields {
    let Some(block) = extract_json_block(raw) else {
        tracing::warn!("LLM reply contained no JSON object");
        return LlmFailure::with_raw_reply(LlmFailureKind::ModelNoJson, raw).into();
    };

    match serde_json::from_str::<Value>(block) {
        Ok(value) => ParsedFields::from_value(value),
        Err(e) => {
            tracing::warn!("LLM reply JSON could not be decoded: {}", e);
            LlmFailure::with_raw_reply(LlmFailureKind::JsonDecodeFailed, raw).into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backoff_grows_exponentially() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff_base: 2.0,
            backoff_unit: Duration::from_secs(1),
        };
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
    }

    #[test]
    fn test_raw_reply_prefers_response_field() {
        let body = json!({"model": "mistral", "response": "{\"origin\": \"Dadar\"}", "done": true});
        assert_eq!(raw_reply_from_body(&body.to_string()), "{\"origin\": \"Dadar\"}");
    }

    #[test]
    fn test_raw_reply_falls_back_to_generated_then_body() {
        let body = json!({"response": "", "generated": "hello"});
        assert_eq!(raw_reply_from_body(&body.to_string()), "hello");

        let body = json!({"done": true});
        assert_eq!(raw_reply_from_body(&body.to_string()), "{\"done\":true}");

        assert_eq!(raw_reply_from_body("plain text reply"), "plain text reply");
    }

    #[test]
    fn test_interpret_reply_outcomes() {
        let fields = interpret_reply("Here you go: {\"origin\": \"Dadar\", \"passenger_count\": 1}");
        assert_eq!(fields.get("origin"), Some(&json!("Dadar")));

        let fields = interpret_reply("I could not read the ticket.");
        assert_eq!(fields.failure_kind(), Some(LlmFailureKind::ModelNoJson));

        let fields = interpret_reply("{origin: Dadar}");
        assert_eq!(fields.failure_kind(), Some(LlmFailureKind::JsonDecodeFailed));
    }

    #[test]
    fn test_new_reads_settings() {
        let settings = LlmSettings {
            model: "llama3".to_string(),
            max_attempts: 4,
            ..LlmSettings::default()
        };
        let client = OllamaClient::new(&settings).unwrap();
        assert_eq!(client.model(), "llama3");
        assert_eq!(client.retry.max_attempts, 4);
    }
}
