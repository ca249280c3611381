use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::domain::{OnError, OutputFormat};
use crate::error::KiraError;
use crate::tripod::{DEFAULT_RETRIES, DEFAULT_TIMEOUT_SECS, DEFAULT_TRIPOD_URL, TripodOptions};

pub const DEFAULT_CONFIG_FILE: &str = "kira-tox21.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub assays: Vec<String>,
    #[serde(default)]
    pub format: Option<OutputFormat>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub retries: Option<usize>,
    #[serde(default)]
    pub on_error: Option<OnError>,
    #[serde(default)]
    pub cache: Option<bool>,
    #[serde(default)]
    pub tripod_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub catalog: Catalog,
    pub format: OutputFormat,
    pub tripod: TripodOptions,
    pub on_error: OnError,
    pub cache: bool,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            catalog: Catalog::tox21(),
            format: OutputFormat::default(),
            tripod: TripodOptions::default(),
            on_error: OnError::default(),
            cache: true,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `kira-tox21.json` when present. Without either the
    /// defaults apply.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KiraError> {
        let catalog = if config.assays.is_empty() {
            Catalog::tox21()
        } else {
            Catalog::subset(&config.assays)?
        };

        let tripod = TripodOptions {
            base_url: config
                .tripod_url
                .unwrap_or_else(|| DEFAULT_TRIPOD_URL.to_string()),
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            retries: config.retries.unwrap_or(DEFAULT_RETRIES),
        };

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            catalog,
            format: config.format.unwrap_or_default(),
            tripod,
            on_error: config.on_error.unwrap_or_default(),
            cache: config.cache.unwrap_or(true),
        })
    }
}
