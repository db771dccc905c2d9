// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use figment::{
    providers::{Format, Serialized, Yaml},
    Figment,
};
use tracing::debug;

use crate::config::{Config, ConfigError, ConfigSource};

/// YAML file layered over the current configuration. A missing file is not an error.
#[derive(Debug, PartialEq, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct YamlConfigSource {
    pub path: PathBuf,
}

impl ConfigSource for YamlConfigSource {
    fn load(&self, config: &mut Config) -> Result<(), ConfigError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no config file, skipping");
            return Ok(());
        }

        let figment = Figment::from(Serialized::defaults(&*config)).merge(Yaml::file(&self.path));
        *config = figment.extract().map_err(|e| {
            ConfigError::Parse(format!(
                "Failed to parse config from yaml file {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(())
    }
}
