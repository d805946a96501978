//! The adapter contract and the priority-failover router built on top of
//! it.
//!
//! The orchestrator and bible extractor only ever speak to [`Router`] or
//! [`ModelAdapter`]; neither imports a concrete provider module directly.

use std::sync::Mutex;

use tracing::{debug, error, info, warn};

use crate::error::{Error, RouterError};

use super::models::{Cooldown, ModelResponse};

/// Durable daily-quota lookup an adapter needs before risking a network
/// call. Implemented by [`crate::storage::Repository`]; kept as a trait
/// here so the router never depends on the storage module.
pub trait QuotaSource: Send {
    /// Tokens already consumed by `model` today.
    fn tokens_used_today(&self, model: &str) -> u64;
}

/// Whether a failed call should fail over to the next adapter (retryable)
/// or propagate immediately because the content itself is the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterErrorKind {
    /// Network/timeout/rate-limit — another model might still succeed.
    Retryable,
    /// Malformed request or content-policy rejection — recurs on any model.
    Content,
}

/// Contract every model back-end implements.
///
/// `translate` itself never raises on malformed model output — parsing
/// failures are reflected in the returned confidence/notes via the
/// response parser. It may raise for network/availability failures, which
/// the router distinguishes by [`AdapterErrorKind`].
pub trait ModelAdapter: Send + Sync {
    /// Identifier matching `quota_usage.model` in storage.
    fn name(&self) -> &str;

    /// Daily token budget configured for this adapter.
    fn daily_token_limit(&self) -> u64;

    /// Whether this adapter is not in cooldown and has not exceeded its
    /// daily budget according to `quota`.
    fn is_available(&self, quota: &dyn QuotaSource) -> bool;

    /// Starts a cooldown window after a retryable failure.
    fn trigger_cooldown(&self);

    /// Sends `chunk` with `system_prompt` and returns the normalized
    /// response.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Retryable`] or [`RouterError::Content`]
    /// depending on the failure's [`AdapterErrorKind`].
    fn translate(&self, chunk: &str, system_prompt: &str) -> crate::error::Result<ModelResponse>;
}

/// Shared cooldown + quota-limit bookkeeping any adapter can embed.
#[derive(Debug)]
pub struct AdapterState {
    /// Adapter name.
    pub name: String,
    /// Daily token budget.
    pub daily_token_limit: u64,
    cooldown: Mutex<Cooldown>,
}

impl AdapterState {
    /// Creates fresh, un-cooled-down state.
    #[must_use]
    pub fn new(name: String, daily_token_limit: u64) -> Self {
        Self {
            name,
            daily_token_limit,
            cooldown: Mutex::new(Cooldown::default()),
        }
    }

    /// Checks cooldown expiry and today's quota in one call.
    #[must_use]
    pub fn is_available(&self, quota: &dyn QuotaSource) -> bool {
        let cooldown_clear = self.cooldown.lock().expect("cooldown mutex poisoned").is_expired();
        cooldown_clear && quota.tokens_used_today(&self.name) < self.daily_token_limit
    }

    /// Starts a 300-second cooldown from now.
    pub fn trigger_cooldown(&self) {
        self.cooldown.lock().expect("cooldown mutex poisoned").trigger();
    }
}

/// Priority-sorted sequence of adapters with automatic failover.
pub struct Router {
    adapters: Vec<Box<dyn ModelAdapter>>,
}

impl Router {
    /// Creates a router over adapters already sorted by ascending
    /// priority.
    ///
    /// # Errors
    ///
    /// Returns an error if `adapters` is empty.
    pub fn new(adapters: Vec<Box<dyn ModelAdapter>>) -> crate::error::Result<Self> {
        if adapters.is_empty() {
            return Err(Error::Config {
                message: "router needs at least one model adapter".to_string(),
            });
        }
        Ok(Self { adapters })
    }

    /// Tries each available adapter in priority order; fails over on
    /// retryable errors, propagates content errors immediately, and raises
    /// [`RouterError::AllModelsExhausted`] once the whole list is spent.
    ///
    /// # Errors
    ///
    /// See above.
    pub fn translate(&self, chunk: &str, system_prompt: &str, quota: &dyn QuotaSource) -> crate::error::Result<ModelResponse> {
        for adapter in &self.adapters {
            if !adapter.is_available(quota) {
                info!(model = adapter.name(), "not available (cooldown or quota), skipping");
                continue;
            }

            debug!(model = adapter.name(), "attempting translation");
            match adapter.translate(chunk, system_prompt) {
                Ok(response) => {
                    info!(
                        model = adapter.name(),
                        tokens_in = response.tokens_input,
                        tokens_out = response.tokens_output,
                        confidence = response.confidence,
                        "chunk translated"
                    );
                    return Ok(response);
                }
                Err(Error::Router(RouterError::Content { model, reason })) => {
                    error!(model = %model, reason = %reason, "content error, not failing over");
                    return Err(Error::Router(RouterError::Content { model, reason }));
                }
                Err(err) => {
                    warn!(model = adapter.name(), error = %err, "retryable failure, trying next adapter");
                    adapter.trigger_cooldown();
                }
            }
        }

        Err(Error::Router(RouterError::AllModelsExhausted))
    }

    /// Names of adapters currently available, for status reporting.
    #[must_use]
    pub fn available_models(&self, quota: &dyn QuotaSource) -> Vec<String> {
        self.adapters.iter().filter(|a| a.is_available(quota)).map(|a| a.name().to_string()).collect()
    }
}
