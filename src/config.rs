// Copyright 2024 Chronicle Labs
// SPDX-License-Identifier: Apache-2.0

//! Config loading for the demo binary: a TOML file overlaid with CLI flags,
//! grounded on the teacher's `bin/inx-chronicle/src/config.rs`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::ClArgs;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub worker_count: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            worker_count: 4,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config file `{path}`: {source}")]
    TomlDeserialization {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::TomlDeserialization {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn apply_cli_args(&mut self, args: &ClArgs) {
        if let Some(worker_count) = args.worker_count {
            self.worker_count = worker_count;
        }
        if let Some(log_level) = &args.log_level {
            self.log_level = log_level.clone();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config_has_sensible_values() {
        let config = Config::default();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.log_level, "info");
    }
}
