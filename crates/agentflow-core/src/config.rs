//! Engine configuration loader.
//!
//! Reads `agentflow.toml` from a configuration directory and deserializes it
//! into [`EngineConfig`]. Falls back to defaults when the file is missing or
//! malformed, so a broken config never prevents the engine from starting.

use std::path::Path;

use agentflow_types::config::EngineConfig;
use thiserror::Error;

/// File name looked up inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "agentflow.toml";

/// Errors from strict configuration parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse engine config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Parse an `EngineConfig` from TOML text, clamping degenerate values.
pub fn parse_engine_config(content: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = toml::from_str(content)?;
    Ok(config.validated())
}

/// Load engine configuration from `{config_dir}/agentflow.toml`.
///
/// - Missing file: returns [`EngineConfig::default()`].
/// - Unreadable or malformed file: logs a warning and returns the default.
/// - Otherwise: returns the parsed config after [`EngineConfig::validated`].
pub async fn load_engine_config(config_dir: &Path) -> EngineConfig {
    let config_path = config_dir.join(CONFIG_FILE_NAME);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {CONFIG_FILE_NAME} found at {}, using defaults", config_path.display());
            return EngineConfig::default();
        }
        Err(err) => {
            let err = ConfigError::Read {
                path: config_path.display().to_string(),
                source: err,
            };
            tracing::warn!("{err}, using defaults");
            return EngineConfig::default();
        }
    };

    match parse_engine_config(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("{} in {}, using defaults", err, config_path.display());
            EngineConfig::default()
        }
    }
}
