use crate::config::helpers::{parse_bool_env, parse_string_env};
use crate::error::ConfigError;
use crate::settings::Settings;

/// Version naming and workflow controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionsConfig {
    pub closed_won_stage: String,
    pub name_prefix: String,
    pub chapter_prefix: String,
    pub seed_blank_line_item: bool,
}

impl Default for VersionsConfig {
    fn default() -> Self {
        let defaults = crate::settings::VersionSettings::default();
        Self {
            closed_won_stage: defaults.closed_won_stage,
            name_prefix: defaults.name_prefix,
            chapter_prefix: defaults.chapter_prefix,
            seed_blank_line_item: defaults.seed_blank_line_item,
        }
    }
}

fn validate_stage(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "VERSIONS_CLOSED_WON_STAGE".to_string(),
            message: "closed-won stage must not be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

// Prefixes are used verbatim, so surrounding whitespace would leak into names.
fn validate_prefix(key: &str, raw: &str) -> Result<String, ConfigError> {
    if raw.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "prefix must not be empty".to_string(),
        });
    }
    if raw.trim() != raw {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "prefix must not start or end with whitespace".to_string(),
        });
    }
    if raw.chars().any(char::is_control) {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "prefix must not contain control characters".to_string(),
        });
    }
    Ok(raw.to_string())
}

impl VersionsConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let versions = &settings.versions;
        Ok(Self {
            closed_won_stage: {
                let raw = parse_string_env(
                    "VERSIONS_CLOSED_WON_STAGE",
                    versions.closed_won_stage.clone(),
                )?;
                validate_stage(&raw)?
            },
            name_prefix: {
                let raw = parse_string_env("VERSIONS_NAME_PREFIX", versions.name_prefix.clone())?;
                validate_prefix("VERSIONS_NAME_PREFIX", &raw)?
            },
            chapter_prefix: {
                let raw =
                    parse_string_env("VERSIONS_CHAPTER_PREFIX", versions.chapter_prefix.clone())?;
                validate_prefix("VERSIONS_CHAPTER_PREFIX", &raw)?
            },
            seed_blank_line_item: parse_bool_env(
                "VERSIONS_SEED_BLANK_LINE_ITEM",
                versions.seed_blank_line_item,
            )?,
        })
    }
}
