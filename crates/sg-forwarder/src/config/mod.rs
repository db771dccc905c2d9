// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Configuration loading and validation.
//!
//! ## Configuration Priority
//!
//! Sources are applied in order, later sources overriding earlier ones:
//!
//! 1. **Defaults** - `Default` impls of each section
//! 2. **YAML file** - `sg-forwarder.yaml` in the config directory, if present
//! 3. **Environment variables** - `SG_*`, nested sections separated by `__`
//!    (e.g. `SG_ELASTICSEARCH__BUFFER_SIZE=10`)
//!
//! An output adapter is enabled by the presence of its section. A source that fails to load is
//! reported and skipped; [`Config::validate`] then decides whether the result is usable.

pub mod env;
pub mod log_level;
pub mod yaml;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::{env::EnvConfigSource, log_level::LogLevel, yaml::YamlConfigSource};
use crate::elasticsearch::AppConfig;
use crate::logs::LogConfig;
use crate::loki::LokiConfig;
use crate::transport::TransportConfig;

/// File name looked up in the config directory.
pub const CONFIG_FILE: &str = "sg-forwarder.yaml";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[allow(clippy::module_name_repetitions)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[allow(clippy::module_name_repetitions)]
pub trait ConfigSource {
    fn load(&self, config: &mut Config) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: LogLevel,
    pub logs: LogConfig,
    pub transport: TransportConfig,
    pub elasticsearch: Option<AppConfig>,
    pub loki: Option<LokiConfig>,
}

impl Config {
    /// Checks every configured section. Disabled adapters are not checked.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logs.validate().map_err(ConfigError::Invalid)?;
        if self.transport.address.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "transport.address must not be empty".to_string(),
            ));
        }
        if let Some(elasticsearch) = &self.elasticsearch {
            elasticsearch.validate().map_err(ConfigError::Invalid)?;
        }
        if let Some(loki) = &self.loki {
            loki.validate().map_err(ConfigError::Invalid)?;
        }
        if self.elasticsearch.is_none() && self.loki.is_none() {
            return Err(ConfigError::Invalid(
                "no output configured: add an elasticsearch or loki section".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Default)]
#[allow(clippy::module_name_repetitions)]
pub struct ConfigBuilder {
    sources: Vec<Box<dyn ConfigSource>>,
    config: Config,
}

#[allow(clippy::module_name_repetitions)]
impl ConfigBuilder {
    #[must_use]
    pub fn add_source(mut self, source: Box<dyn ConfigSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn build(&mut self) -> Config {
        let mut failed_sources = 0;
        for source in &self.sources {
            if let Err(e) = source.load(&mut self.config) {
                error!("Failed to load config: {}", e);
                failed_sources += 1;
            }
        }

        if !self.sources.is_empty() && failed_sources == self.sources.len() {
            debug!("All sources failed to load config, using default config.");
        }

        self.config.clone()
    }
}

/// Loads `sg-forwarder.yaml` from `config_directory` and the environment, then validates.
pub fn get_config(config_directory: &Path) -> Result<Config, ConfigError> {
    let path = config_directory.join(CONFIG_FILE);
    let config = ConfigBuilder::default()
        .add_source(Box::new(YamlConfigSource { path }))
        .add_source(Box::new(EnvConfigSource))
        .build();
    config.validate()?;
    Ok(config)
}
