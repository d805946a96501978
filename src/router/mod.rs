//! Multi-model dispatch: configuration, prompt construction, response
//! parsing, and the priority-failover router itself.

mod adapters;
mod config;
mod models;
mod prompt;
mod provider;
mod response_parser;

pub use adapters::{AnthropicAdapter, GoogleAdapter};
pub use config::{default_config_path, load_model_configs};
pub use models::{Cooldown, ModelConfig, ModelResponse};
pub use prompt::{build_fix_prompt, build_polish_prompt, build_translate_prompt, PromptContext};
pub use provider::{AdapterErrorKind, AdapterState, ModelAdapter, QuotaSource, Router};
pub use response_parser::{parse_model_response, ParsedResponse, EMERGENCY_CONFIDENCE};

const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const GOOGLE_GENERATE_URL_PREFIX: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Builds the concrete adapter set for a list of resolved configs,
/// dispatching on each model's name to decide which HTTP shape it speaks.
///
/// Names beginning with `claude` use the Anthropic messages API; names
/// beginning with `gemini` use the Google generate-content API. Any other
/// name is rejected since there is no adapter to build it with.
///
/// # Errors
///
/// Returns an error if a config is missing its `api_key`, its name does
/// not match a known provider prefix, or the HTTP client fails to build.
pub fn build_adapters(configs: &[ModelConfig]) -> crate::error::Result<Vec<Box<dyn ModelAdapter>>> {
    configs
        .iter()
        .map(|config| -> crate::error::Result<Box<dyn ModelAdapter>> {
            if config.name.starts_with("claude") {
                let adapter = AnthropicAdapter::new(config, &config.name, ANTHROPIC_MESSAGES_URL)?;
                Ok(Box::new(adapter))
            } else if config.name.starts_with("gemini") {
                let endpoint = format!("{GOOGLE_GENERATE_URL_PREFIX}/{}:generateContent", config.name);
                let adapter = GoogleAdapter::new(config, endpoint)?;
                Ok(Box::new(adapter))
            } else {
                Err(crate::error::Error::Config {
                    message: format!("no adapter known for model '{}'", config.name),
                })
            }
        })
        .collect()
}
