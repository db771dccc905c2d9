// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use figment::{
    providers::{Env, Serialized},
    Figment,
};

use crate::config::{Config, ConfigError, ConfigSource};

/// Prefix of every environment variable read by [`EnvConfigSource`].
pub const ENV_PREFIX: &str = "SG_";

/// `SG_*` environment variables layered over the current configuration.
#[derive(Debug, Clone, Copy)]
#[allow(clippy::module_name_repetitions)]
pub struct EnvConfigSource;

impl ConfigSource for EnvConfigSource {
    fn load(&self, config: &mut Config) -> Result<(), ConfigError> {
        let figment =
            Figment::from(Serialized::defaults(&*config)).merge(Env::prefixed(ENV_PREFIX).split("__"));
        *config = figment.extract().map_err(|e| {
            ConfigError::Parse(format!("Failed to parse config from environment: {e}"))
        })?;
        Ok(())
    }
}
