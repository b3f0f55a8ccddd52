//! Resolved configuration.
//!
//! Precedence, lowest first: built-in defaults, the optional settings file,
//! environment variables (a `.env` file is loaded by the binary).

pub(crate) mod helpers;
mod versions;

pub use versions::VersionsConfig;

use crate::config::helpers::parse_string_env;
use crate::error::ConfigError;
use crate::settings::Settings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_level: String,
    pub versions: VersionsConfig,
}

impl Config {
    pub fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            log_level: parse_string_env("VERSIONS_LOG_LEVEL", settings.log_level.clone())?,
            versions: VersionsConfig::resolve(settings)?,
        })
    }
}
