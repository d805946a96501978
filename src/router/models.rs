//! Value types shared across the router: model configuration and the
//! response contract every adapter returns.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// A single model call's outcome, normalized across adapters regardless of
/// how degraded the parse of the raw response had to get.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    /// The translated/fixed/polished text.
    pub translation: String,
    /// Model's self-reported confidence in [0, 1].
    pub confidence: f64,
    /// Free-form notes: decisions made, caveats, or a degradation warning.
    pub notes: String,
    /// Name of the model that produced this response.
    pub model_used: String,
    /// Prompt tokens consumed.
    pub tokens_input: u32,
    /// Completion tokens consumed.
    pub tokens_output: u32,
}

/// Static, YAML-sourced configuration for one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Identifier matching `quota_usage.model` in storage.
    pub name: String,
    /// Ascending priority; lower values are tried first.
    pub priority: i32,
    /// Daily token budget before the adapter reports itself unavailable.
    pub daily_token_limit: u64,
    /// API key, resolved from `${VAR}` environment references. `None` for
    /// adapters authenticated by ambient credentials.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-call timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Sampling temperature passed to the provider.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

const fn default_timeout_seconds() -> u64 {
    60
}

const fn default_temperature() -> f64 {
    0.3
}

/// Process-local, volatile cooldown state for one adapter.
///
/// Deliberately not persisted: a restart always gives every model a clean
/// slate for cooldowns even though its durable daily quota is unaffected.
#[derive(Debug, Default)]
pub struct Cooldown {
    unavailable_until: Option<Instant>,
}

impl Cooldown {
    /// Seconds an adapter sits out after a retryable network error.
    pub const DURATION_SECS: u64 = 300;

    /// Whether the cooldown has expired (or was never set).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.unavailable_until.is_none_or(|until| Instant::now() >= until)
    }

    /// Starts a fresh cooldown window from now.
    pub fn trigger(&mut self) {
        self.unavailable_until = Some(Instant::now() + std::time::Duration::from_secs(Self::DURATION_SECS));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_cooldown_is_expired() {
        assert!(Cooldown::default().is_expired());
    }

    #[test]
    fn triggered_cooldown_is_not_expired() {
        let mut cooldown = Cooldown::default();
        cooldown.trigger();
        assert!(!cooldown.is_expired());
    }

    #[test]
    fn config_defaults_fill_in_timeout_and_temperature() {
        let json = r#"{"name": "claude", "priority": 1, "daily_token_limit": 80000}"#;
        let config: ModelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.timeout_seconds, 60);
        assert!((config.temperature - 0.3).abs() < f64::EPSILON);
    }
}
