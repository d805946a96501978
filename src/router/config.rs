//! Loads model configuration from YAML, resolving `${VAR}` API-key
//! references against the process environment.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, RouterError};

use super::models::ModelConfig;

#[derive(Debug, Deserialize)]
struct RawConfigFile {
    #[serde(default)]
    models: Vec<RawModelEntry>,
}

#[derive(Debug, Deserialize)]
struct RawModelEntry {
    name: String,
    #[serde(default = "default_priority")]
    priority: i32,
    #[serde(default = "default_daily_limit")]
    daily_token_limit: u64,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    timeout_seconds: Option<u64>,
    #[serde(default)]
    temperature: Option<f64>,
}

const fn default_priority() -> i32 {
    99
}

const fn default_daily_limit() -> u64 {
    80_000
}

/// Resolves the default config path: `$XDG_CONFIG_HOME/tradnovela/models.yaml`
/// (or the platform equivalent via [`dirs::config_dir`]).
#[must_use]
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tradnovela")
        .join("models.yaml")
}

/// Loads and sorts model configs by ascending priority.
///
/// Resolution order for the path: explicit `config_path` argument, then
/// `TRADNOVELA_MODELS_CONFIG`, then [`default_config_path`].
///
/// # Errors
///
/// Returns [`RouterError::ConfigLoad`] if the file is missing or fails to
/// parse as YAML.
pub fn load_model_configs(config_path: Option<&Path>) -> crate::error::Result<Vec<ModelConfig>> {
    let path = config_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var("TRADNOVELA_MODELS_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(default_config_path);

    let raw = std::fs::read_to_string(&path).map_err(|err| {
        Error::from(RouterError::ConfigLoad(format!(
            "could not read {}: {err}",
            path.display()
        )))
    })?;

    let parsed: RawConfigFile = serde_yaml::from_str(&raw)
        .map_err(|err| Error::from(RouterError::ConfigLoad(format!("invalid YAML: {err}"))))?;

    let mut configs: Vec<ModelConfig> = parsed
        .models
        .into_iter()
        .map(|entry| ModelConfig {
            name: entry.name,
            priority: entry.priority,
            daily_token_limit: entry.daily_token_limit,
            api_key: entry.api_key.map(|v| resolve_env(&v)),
            timeout_seconds: entry.timeout_seconds.unwrap_or(60),
            temperature: entry.temperature.unwrap_or(0.3),
        })
        .collect();

    configs.sort_by_key(|c| c.priority);
    Ok(configs)
}

/// Expands a `${VAR_NAME}` reference against the environment; any other
/// string passes through unchanged.
fn resolve_env(value: &str) -> String {
    let Some(inner) = value.strip_prefix("${").and_then(|s| s.strip_suffix('}')) else {
        return value.to_string();
    };
    std::env::var(inner.trim()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn resolve_env_expands_variable() {
        // SAFETY: test-local env mutation, no concurrent access in this test.
        unsafe {
            std::env::set_var("TRADNOVELA_TEST_CONFIG_VAR", "secret-value");
        }
        assert_eq!(resolve_env("${TRADNOVELA_TEST_CONFIG_VAR}"), "secret-value");
        unsafe {
            std::env::remove_var("TRADNOVELA_TEST_CONFIG_VAR");
        }
    }

    #[test]
    fn resolve_env_passes_through_plain_value() {
        assert_eq!(resolve_env("literal-key"), "literal-key");
    }

    #[test]
    fn load_model_configs_sorts_by_priority() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "models:\n  - name: low-priority\n    priority: 5\n  - name: high-priority\n    priority: 1\n"
        )
        .unwrap();
        let configs = load_model_configs(Some(file.path())).unwrap();
        assert_eq!(configs[0].name, "high-priority");
        assert_eq!(configs[1].name, "low-priority");
    }

    #[test]
    fn load_model_configs_missing_file_errors() {
        let result = load_model_configs(Some(Path::new("/nonexistent/models.yaml")));
        assert!(result.is_err());
    }
}
