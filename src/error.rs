//! Error types for deal versions.

use thiserror::Error;

use crate::versions::lifecycle::VersionAction;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse settings file: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Backend persistence errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

/// Errors surfaced by the version workflows.
///
/// Load failures are usually degraded to warnings by the sessions; the rest
/// are returned to the caller for display. None of them are fatal.
#[derive(Debug, Error)]
pub enum VersionError {
    #[error("Failed to load products: {0}")]
    CatalogLoad(#[source] DatabaseError),

    #[error("Failed to load versions: {0}")]
    VersionLoad(#[source] DatabaseError),

    #[error("Failed to load version line items: {0}")]
    LineItemLoad(#[source] DatabaseError),

    #[error("Failed to determine version type: {0}")]
    StageLoad(#[source] DatabaseError),

    #[error("Failed to save: {0}")]
    SaveFailure(#[source] DatabaseError),

    #[error("Cannot {action} version {version_id}: {reason}")]
    LifecycleViolation {
        version_id: String,
        action: VersionAction,
        reason: String,
    },

    #[error("Found {count} syncing versions ({}); expected at most one", .version_ids.join(", "))]
    DataConsistencyViolation {
        count: usize,
        version_ids: Vec<String>,
    },

    #[error("A save is already in progress")]
    SaveInFlight,

    #[error("Session already saved")]
    SessionClosed,

    #[error("Line item {local_key} is locked; its product cannot change")]
    LineItemLocked { local_key: String },

    #[error("Line item {local_key} not found")]
    UnknownLineItem { local_key: String },

    #[error("Field {field} cannot be edited here")]
    UnsupportedEdit { field: &'static str },

    #[error("Version {version_id} not found")]
    UnknownVersion { version_id: String },

    #[error("{action} cancelled by operator")]
    Cancelled { action: VersionAction },
}

impl VersionError {
    /// True for failures that leave the session usable after a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CatalogLoad(_)
                | Self::VersionLoad(_)
                | Self::LineItemLoad(_)
                | Self::StageLoad(_)
                | Self::SaveFailure(_)
                | Self::SaveInFlight
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistency_violation_lists_every_syncing_id() {
        let err = VersionError::DataConsistencyViolation {
            count: 2,
            version_ids: vec!["v1".to_string(), "v2".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Found 2 syncing versions (v1, v2); expected at most one"
        );
    }

    #[test]
    fn lifecycle_violation_names_the_action() {
        let err = VersionError::LifecycleViolation {
            version_id: "v9".to_string(),
            action: VersionAction::Edit,
            reason: "version is syncing".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot edit version v9: version is syncing");
        assert!(!err.is_retryable());
    }

    #[test]
    fn save_failures_are_retryable() {
        let err = VersionError::SaveFailure(DatabaseError::Query("timeout".to_string()));
        assert!(err.is_retryable());
        assert!(!VersionError::SessionClosed.is_retryable());
    }
}
