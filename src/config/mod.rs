mod types;

pub use types::*;

use crate::{Error, Result};
use std::{env, path::Path};
use tracing::debug;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Loads configuration from `path`, `CONFIG_PATH`, or `config.yaml`.
///
/// The default file is optional; an explicitly named file must exist.
/// Environment overrides are applied afterwards and the result is validated,
/// so a missing API key fails here rather than on the first model call.
pub async fn load(path: Option<&str>) -> Result<Config> {
    let explicit = path
        .map(str::to_string)
        .or_else(|| env::var("CONFIG_PATH").ok());

    let mut config = match explicit {
        Some(config_path) => {
            debug!("Loading configuration from: {}", config_path);
            let config_str = tokio::fs::read_to_string(&config_path).await.map_err(|e| {
                Error::config(format!("Cannot read config file '{config_path}': {e}"))
            })?;
            serde_yaml::from_str(&config_str)?
        }
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            debug!("Loading configuration from: {}", DEFAULT_CONFIG_PATH);
            let config_str = tokio::fs::read_to_string(DEFAULT_CONFIG_PATH).await?;
            serde_yaml::from_str(&config_str)?
        }
        None => {
            debug!("No config file found, using defaults");
            Config::default()
        }
    };

    apply_env_overrides(&mut config, |key| env::var(key).ok());
    validate(&config)?;

    Ok(config)
}

/// Overlays environment values on top of the file configuration.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(api_key) = non_empty("OPENAI_API_KEY") {
        config.llm.api_key = api_key;
    }
    if let Some(base_url) = non_empty("OPENAI_BASE_URL") {
        config.llm.base_url = base_url;
    }
    if let Some(model) = non_empty("OPENAI_MODEL") {
        config.llm.model = model.clone();
        config.critique.model = model;
    }
    if let Some(model_path) = non_empty("CLASSIFIER_MODEL_PATH") {
        config.classifier.model_path = Some(model_path);
    }
    if let Some(labels_path) = non_empty("CLASSIFIER_LABELS_PATH") {
        config.classifier.labels_path = Some(labels_path);
    }
}

pub fn validate(config: &Config) -> Result<()> {
    if config.llm.api_key.trim().is_empty() {
        return Err(Error::config(
            "OPENAI_API_KEY is not set. Add it to your environment or to a .env file.",
        ));
    }
    if config.llm.model.trim().is_empty() || config.critique.model.trim().is_empty() {
        return Err(Error::config("Model identifier must not be empty"));
    }
    for (name, temperature) in [
        ("llm.temperature", config.llm.temperature),
        ("critique.temperature", config.critique.temperature),
    ] {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(Error::config(format!(
                "{name} must be between 0.0 and 2.0, got {temperature}"
            )));
        }
    }
    if config.llm.request_timeout_secs == 0 {
        return Err(Error::config("llm.request_timeout_secs must be positive"));
    }
    if config.llm.retry.backoff_multiplier < 1.0 {
        return Err(Error::config("llm.retry.backoff_multiplier must be at least 1.0"));
    }
    if config.agent.max_turns == 0 {
        return Err(Error::config("agent.max_turns must be at least 1"));
    }
    if config.classifier.top_k == 0 {
        return Err(Error::config("classifier.top_k must be at least 1"));
    }
    if config.classifier.model_path.is_some() != config.classifier.labels_path.is_some() {
        return Err(Error::config(
            "classifier.model_path and classifier.labels_path must be set together",
        ));
    }
    Ok(())
}
