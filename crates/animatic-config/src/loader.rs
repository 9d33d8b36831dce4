//! Configuration loading and validation.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::AnimaticConfig;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load full Animatic configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<AnimaticConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AnimaticConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &AnimaticConfig) -> Result<(), ConfigError> {
    if config.version == 0 {
        return Err(ConfigError::Invalid(
            "version must be greater than 0".to_string(),
        ));
    }

    if config.app.name.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "app.name must not be empty".to_string(),
        ));
    }

    if config.server.listen.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "server.listen must not be empty".to_string(),
        ));
    }

    if config.pipeline.max_attempts == 0 {
        return Err(ConfigError::Invalid(
            "pipeline.max_attempts must be > 0".to_string(),
        ));
    }

    if config.pipeline.default_scene.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "pipeline.default_scene must not be empty".to_string(),
        ));
    }

    if config.generator.endpoint.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "generator.endpoint must not be empty".to_string(),
        ));
    }

    if config.generator.model.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "generator.model must not be empty".to_string(),
        ));
    }

    if config.generator.timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "generator.timeout_secs must be > 0".to_string(),
        ));
    }

    if config.renderer.binary.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "renderer.binary must not be empty".to_string(),
        ));
    }

    if !matches!(
        config.renderer.quality.trim().to_ascii_lowercase().as_str(),
        "l" | "low" | "m" | "medium" | "h" | "high"
    ) {
        return Err(ConfigError::Invalid(format!(
            "renderer.quality '{}' is not one of low/medium/high",
            config.renderer.quality
        )));
    }

    if config.renderer.timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "renderer.timeout_secs must be > 0".to_string(),
        ));
    }

    Ok(())
}
