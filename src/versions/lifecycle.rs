//! Which operator actions a version allows.
//!
//! | status   | syncing | approve | edit | delete |
//! |----------|---------|---------|------|--------|
//! | Draft    | false   | yes     | yes  | yes    |
//! | Draft    | true    | no      | no   | no     |
//! | Approved | false   | no      | no   | yes    |
//! | Approved | true    | no      | no   | no     |
//! | Obsolete | false   | no      | no   | yes    |
//! | Obsolete | true    | no      | no   | no     |

use std::fmt;

use crate::db::{VersionRecord, VersionStatus};
use crate::error::VersionError;

/// An operator-facing action on a version row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionAction {
    Approve,
    Edit,
    Delete,
}

impl VersionAction {
    pub const ALL: [VersionAction; 3] = [Self::Approve, Self::Edit, Self::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }

    /// Approve and delete must be confirmed by the operator before running.
    pub fn requires_confirmation(self) -> bool {
        matches!(self, Self::Approve | Self::Delete)
    }
}

impl fmt::Display for VersionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why `action` is not allowed in this state, or `None` when it is.
fn denial_reason(action: VersionAction, status: VersionStatus, syncing: bool) -> Option<&'static str> {
    match action {
        VersionAction::Approve if syncing => Some("the version is already syncing"),
        VersionAction::Approve if status != VersionStatus::Draft => {
            Some("only draft versions can be approved")
        }
        VersionAction::Edit if syncing => Some(
            "cannot edit a syncing version; sync another version before editing this one",
        ),
        VersionAction::Edit if status == VersionStatus::Obsolete => {
            Some("cannot edit a version with status \"Obsolete\"")
        }
        VersionAction::Edit if status != VersionStatus::Draft => {
            Some("only draft versions can be edited")
        }
        VersionAction::Delete if syncing => Some(
            "cannot delete a syncing version; sync another version before deleting this one",
        ),
        _ => None,
    }
}

pub fn is_permitted(action: VersionAction, status: VersionStatus, syncing: bool) -> bool {
    denial_reason(action, status, syncing).is_none()
}

/// Actions to offer for a version row, in display order. Empty means the row
/// exposes no actions.
pub fn available_actions(status: VersionStatus, syncing: bool) -> Vec<VersionAction> {
    VersionAction::ALL
        .into_iter()
        .filter(|action| is_permitted(*action, status, syncing))
        .collect()
}

/// Fail with `LifecycleViolation` unless `action` is allowed on `version`.
pub fn ensure_permitted(version: &VersionRecord, action: VersionAction) -> Result<(), VersionError> {
    match denial_reason(action, version.status, version.syncing) {
        None => Ok(()),
        Some(reason) => {
            tracing::warn!(
                version_id = %version.id,
                action = %action,
                status = version.status.as_str(),
                syncing = version.syncing,
                "Blocked version action"
            );
            Err(VersionError::LifecycleViolation {
                version_id: version.id.clone(),
                action,
                reason: reason.to_string(),
            })
        }
    }
}
