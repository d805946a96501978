//! HTTP model adapters.
//!
//! Two shapes cover the providers this pipeline targets: Anthropic-style
//! (`messages` array, `content[0].text` response) and Google-style (a
//! single prompt string, `candidates[0].content.parts[0].text` response).
//! Both are blocking `reqwest` calls — the orchestrator's loop is
//! synchronous end to end.

use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::json;

use crate::error::{Error, RouterError};

use super::models::{Cooldown, ModelConfig, ModelResponse};
use super::provider::{AdapterState, ModelAdapter, QuotaSource};
use super::response_parser::parse_model_response;

/// Adapter for Anthropic-style chat-completion endpoints.
pub struct AnthropicAdapter {
    state: AdapterState,
    client: Client,
    api_key: String,
    model_id: String,
    endpoint: String,
    temperature: f64,
}

impl AnthropicAdapter {
    /// Builds an adapter from a resolved [`ModelConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build (invalid
    /// timeout) or `config.api_key` is absent.
    pub fn new(config: &ModelConfig, model_id: impl Into<String>, endpoint: impl Into<String>) -> crate::error::Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| Error::Config {
            message: format!("model {} is missing an api_key", config.name),
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|err| Error::Config {
                message: format!("failed to build HTTP client: {err}"),
            })?;
        Ok(Self {
            state: AdapterState::new(config.name.clone(), config.daily_token_limit),
            client,
            api_key,
            model_id: model_id.into(),
            endpoint: endpoint.into(),
            temperature: config.temperature,
        })
    }
}

impl ModelAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        &self.state.name
    }

    fn daily_token_limit(&self) -> u64 {
        self.state.daily_token_limit
    }

    fn is_available(&self, quota: &dyn QuotaSource) -> bool {
        self.state.is_available(quota)
    }

    fn trigger_cooldown(&self) {
        self.state.trigger_cooldown();
    }

    fn translate(&self, chunk: &str, system_prompt: &str) -> crate::error::Result<ModelResponse> {
        let body = json!({
            "model": self.model_id,
            "max_tokens": 4096,
            "temperature": self.temperature,
            "system": system_prompt,
            "messages": [{"role": "user", "content": chunk}],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .map_err(|err| retryable_or_content(&self.state.name, &err))?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS || status == reqwest::StatusCode::REQUEST_TIMEOUT {
            return Err(Error::Router(RouterError::Retryable {
                model: self.state.name.clone(),
                reason: format!("HTTP {status}"),
            }));
        }
        if status.is_client_error() {
            return Err(Error::Router(RouterError::Content {
                model: self.state.name.clone(),
                reason: format!("HTTP {status}"),
            }));
        }

        let payload: serde_json::Value = response.json().map_err(|err| Error::Router(RouterError::Retryable {
            model: self.state.name.clone(),
            reason: format!("invalid response body: {err}"),
        }))?;

        let raw_text = payload
            .get("content")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("text"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        let tokens_input = payload.get("usage").and_then(|u| u.get("input_tokens")).and_then(serde_json::Value::as_u64).unwrap_or(0);
        let tokens_output = payload.get("usage").and_then(|u| u.get("output_tokens")).and_then(serde_json::Value::as_u64).unwrap_or(0);

        let parsed = parse_model_response(raw_text, &self.state.name);
        Ok(ModelResponse {
            translation: parsed.translation,
            confidence: parsed.confidence,
            notes: parsed.notes,
            model_used: self.state.name.clone(),
            #[allow(clippy::cast_possible_truncation)]
            tokens_input: tokens_input as u32,
            #[allow(clippy::cast_possible_truncation)]
            tokens_output: tokens_output as u32,
        })
    }
}

/// Adapter for Google-style generative-content endpoints.
pub struct GoogleAdapter {
    state: AdapterState,
    client: Client,
    api_key: String,
    endpoint: String,
    temperature: f64,
}

impl GoogleAdapter {
    /// Builds an adapter from a resolved [`ModelConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build or
    /// `config.api_key` is absent.
    pub fn new(config: &ModelConfig, endpoint: impl Into<String>) -> crate::error::Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| Error::Config {
            message: format!("model {} is missing an api_key", config.name),
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|err| Error::Config {
                message: format!("failed to build HTTP client: {err}"),
            })?;
        Ok(Self {
            state: AdapterState::new(config.name.clone(), config.daily_token_limit),
            client,
            api_key,
            endpoint: endpoint.into(),
            temperature: config.temperature,
        })
    }
}

impl ModelAdapter for GoogleAdapter {
    fn name(&self) -> &str {
        &self.state.name
    }

    fn daily_token_limit(&self) -> u64 {
        self.state.daily_token_limit
    }

    fn is_available(&self, quota: &dyn QuotaSource) -> bool {
        self.state.is_available(quota)
    }

    fn trigger_cooldown(&self) {
        self.state.trigger_cooldown();
    }

    fn translate(&self, chunk: &str, system_prompt: &str) -> crate::error::Result<ModelResponse> {
        let full_prompt = format!("{system_prompt}\n\n{chunk}");
        let body = json!({
            "contents": [{"parts": [{"text": full_prompt}]}],
            "generationConfig": {
                "temperature": self.temperature,
                "response_mime_type": "application/json",
            },
        });

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .map_err(|err| retryable_or_content(&self.state.name, &err))?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::Router(RouterError::Retryable {
                model: self.state.name.clone(),
                reason: format!("HTTP {status}"),
            }));
        }
        if status.is_client_error() {
            return Err(Error::Router(RouterError::Content {
                model: self.state.name.clone(),
                reason: format!("HTTP {status}"),
            }));
        }

        let payload: serde_json::Value = response.json().map_err(|err| Error::Router(RouterError::Retryable {
            model: self.state.name.clone(),
            reason: format!("invalid response body: {err}"),
        }))?;

        let raw_text = payload
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        let usage = payload.get("usageMetadata");
        let tokens_input = usage.and_then(|u| u.get("promptTokenCount")).and_then(serde_json::Value::as_u64).unwrap_or(0);
        let tokens_output = usage.and_then(|u| u.get("candidatesTokenCount")).and_then(serde_json::Value::as_u64).unwrap_or(0);

        let parsed = parse_model_response(raw_text, &self.state.name);
        Ok(ModelResponse {
            translation: parsed.translation,
            confidence: parsed.confidence,
            notes: parsed.notes,
            model_used: self.state.name.clone(),
            #[allow(clippy::cast_possible_truncation)]
            tokens_input: tokens_input as u32,
            #[allow(clippy::cast_possible_truncation)]
            tokens_output: tokens_output as u32,
        })
    }
}

fn retryable_or_content(model: &str, err: &reqwest::Error) -> Error {
    if err.is_timeout() || err.is_connect() {
        Error::Router(RouterError::Retryable {
            model: model.to_string(),
            reason: err.to_string(),
        })
    } else {
        Error::Router(RouterError::Retryable {
            model: model.to_string(),
            reason: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ModelConfig {
        ModelConfig {
            name: "claude".into(),
            priority: 1,
            daily_token_limit: 80_000,
            api_key: Some("secret".into()),
            timeout_seconds: 30,
            temperature: 0.3,
        }
    }

    #[test]
    fn anthropic_adapter_requires_api_key() {
        let mut config = base_config();
        config.api_key = None;
        let result = AnthropicAdapter::new(&config, "claude-haiku", "https://example.invalid");
        assert!(result.is_err());
    }

    #[test]
    fn google_adapter_requires_api_key() {
        let mut config = base_config();
        config.api_key = None;
        let result = GoogleAdapter::new(&config, "https://example.invalid");
        assert!(result.is_err());
    }

    #[test]
    fn anthropic_adapter_name_matches_config() {
        let config = base_config();
        let adapter = AnthropicAdapter::new(&config, "claude-haiku", "https://example.invalid").unwrap();
        assert_eq!(adapter.name(), "claude");
    }

    struct AlwaysZeroQuota;
    impl QuotaSource for AlwaysZeroQuota {
        fn tokens_used_today(&self, _model: &str) -> u64 {
            0
        }
    }

    #[test]
    fn fresh_adapter_is_available() {
        let config = base_config();
        let adapter = AnthropicAdapter::new(&config, "claude-haiku", "https://example.invalid").unwrap();
        assert!(adapter.is_available(&AlwaysZeroQuota));
    }

    #[test]
    fn cooldown_unavailable() {
        let cooldown = Cooldown::default();
        assert!(cooldown.is_expired());
    }
}
