//! File-backed settings with defaults.
//!
//! Settings are the lowest-precedence layer; `config::Config::resolve` applies
//! environment overrides on top.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionSettings {
    /// Parent stage indicator that makes new versions post-sale.
    pub closed_won_stage: String,
    pub name_prefix: String,
    pub chapter_prefix: String,
    /// Keep one blank line item in an otherwise empty working set.
    pub seed_blank_line_item: bool,
}

impl Default for VersionSettings {
    fn default() -> Self {
        Self {
            closed_won_stage: "06-Closed Won".to_string(),
            name_prefix: "Version-".to_string(),
            chapter_prefix: "Ch-".to_string(),
            seed_blank_line_item: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,
    pub versions: VersionSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            versions: VersionSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
            [versions]
            closed_won_stage = "Closed Won"
            "#,
        )
        .expect("parse");
        assert_eq!(settings.versions.closed_won_stage, "Closed Won");
        assert_eq!(settings.versions.name_prefix, "Version-");
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Settings::from_toml("versions = [").expect_err("must fail");
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "log_level = \"debug\"\n").expect("write");
        let settings = Settings::load(&path).expect("load");
        assert_eq!(settings.log_level, "debug");
        assert!(settings.versions.seed_blank_line_item);
    }
}
