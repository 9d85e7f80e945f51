use registry_core::identifier::DEFAULT_QUERY_LABEL;
use registry_core::KeyOptions;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{Result, ToolError};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub payloads: PayloadConfig,
    pub normalize: NormalizeConfig,
    /// Default cleaning steps for the merge tool.
    pub merge: KeyOptions,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    /// Rows shown in table previews.
    pub preview_rows: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_upload_bytes: 50 * 1024 * 1024,
            preview_rows: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PayloadConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 15 * 60,
            max_entries: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub query_label: String,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            query_label: DEFAULT_QUERY_LABEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load `config.toml` (or `$REGISTRY_CONFIG`), then apply environment overrides.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var("REGISTRY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_path(Path::new(&path))?;
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at '{}', using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            ToolError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("REGISTRY_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ToolError::Config(format!("PORT is not a valid port: '{port}'")))?;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.server.max_upload_bytes == 0 {
            return Err(ToolError::Config("server.max_upload_bytes must be positive".to_string()));
        }
        if self.payloads.max_entries == 0 {
            return Err(ToolError::Config("payloads.max_entries must be positive".to_string()));
        }
        if self.payloads.ttl_secs == 0 {
            warn!("payloads.ttl_secs is 0; downloads expire immediately");
        }
        Ok(())
    }
}
