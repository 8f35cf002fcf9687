// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use config::{Environment, File};
use log::warn;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

use crate::api::client::DEFAULT_ENDPOINT;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Settings {
    pub endpoint: String,
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,
    pub state_path: String,
    pub log: LogConfig,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("endpoint", &self.endpoint)
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("state_path", &self.state_path)
            .field("log", &self.log)
            .finish()
    }
}

impl Settings {
    pub fn new(config_path: Option<&str>) -> Result<Self, SettingsError> {
        let mut config_builder = config::Config::builder()
            .set_default("endpoint", DEFAULT_ENDPOINT)?
            .set_default("request_timeout_secs", 30)?
            .set_default("state_path", "mailforge-state.json")?
            .set_default("log.level", "info")?;

        if let Some(path) = config_path {
            config_builder = config_builder.add_source(File::with_name(path));
        }

        // e.g. `MAILFORGE_REQUEST_TIMEOUT_SECS=10` or `MAILFORGE_LOG__LEVEL=debug`
        config_builder = config_builder.add_source(
            Environment::with_prefix("MAILFORGE")
                .prefix_separator("_")
                .separator("__")
                .ignore_empty(true),
        );

        // Names the provider's own tooling uses
        let env_vars = [
            ("PURELYMAIL_API_TOKEN", "api_token"),
            ("PURELYMAIL_ENDPOINT", "endpoint"),
            ("MAILFORGE_STATE_PATH", "state_path"),
            ("MAILFORGE_TIMEOUT_SECS", "request_timeout_secs"),
        ];

        for (env_var, config_path) in &env_vars {
            if let Ok(value) = env::var(env_var) {
                if value.is_empty() {
                    continue;
                }
                if *env_var == "MAILFORGE_TIMEOUT_SECS" {
                    if let Ok(secs) = value.parse::<u64>() {
                        config_builder = config_builder.set_override(config_path, secs)?;
                    } else {
                        warn!("Invalid timeout value in {}: {}", env_var, value);
                    }
                } else {
                    config_builder = config_builder.set_override(config_path, value)?;
                }
            }
        }

        Ok(config_builder.build()?.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        url::Url::parse(&self.endpoint)
            .map_err(|e| SettingsError::Invalid(format!("endpoint '{}': {}", self.endpoint, e)))?;
        if self.request_timeout_secs == 0 {
            return Err(SettingsError::Invalid("request_timeout_secs must be greater than zero".to_string()));
        }
        if self.state_path.trim().is_empty() {
            return Err(SettingsError::Invalid("state_path must not be empty".to_string()));
        }
        if self.api_token.as_deref().map_or(true, str::is_empty) {
            warn!("No API token configured (set PURELYMAIL_API_TOKEN)");
        }
        Ok(())
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig { level: "info".to_string() }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_token: None,
            request_timeout_secs: 30,
            state_path: "mailforge-state.json".to_string(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load or parse configuration: {0}")]
    LoadError(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
