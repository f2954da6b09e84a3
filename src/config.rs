use anyhow::{Context, Result};
use mini_markdown_ast::{PageConfig, RenderOptions};
use serde::Deserialize;
use std::path::Path;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "mmd.json";

/// Top-level mmd.json schema. Every field is optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MmdConfig {
    /// Options passed to every render.
    pub render: RenderOptions,

    /// Defaults for `--format page` and `mmd build`.
    pub page: PageConfig,

    /// Inputs larger than this are rejected before parsing.
    pub max_input_bytes: usize,
}

fn default_max_input_bytes() -> usize {
    1024 * 1024
}

impl Default for MmdConfig {
    fn default() -> Self {
        Self {
            render: RenderOptions::default(),
            page: PageConfig::default(),
            max_input_bytes: default_max_input_bytes(),
        }
    }
}

/// Load config from an explicit path (which must exist), or from `mmd.json`
/// in the working directory, or return defaults if that is missing.
pub fn load_config(explicit: Option<&Path>) -> Result<MmdConfig> {
    let config_path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = Path::new(DEFAULT_CONFIG_FILE).to_path_buf();
            if !path.exists() {
                tracing::debug!("no {DEFAULT_CONFIG_FILE} found, using defaults");
                return Ok(MmdConfig::default());
            }
            path
        }
    };

    let raw = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    let config = parse_config(&raw)
        .with_context(|| format!("Failed to parse {}", config_path.display()))?;
    tracing::debug!(path = %config_path.display(), "loaded config");
    Ok(config)
}

/// Parse and validate config JSON.
pub fn parse_config(raw: &str) -> Result<MmdConfig> {
    let config: MmdConfig = serde_json::from_str(raw)?;
    config.render.validate()?;
    Ok(config)
}
