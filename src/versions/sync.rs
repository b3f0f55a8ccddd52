//! The syncing version of a parent.

use crate::db::VersionRecord;
use crate::error::VersionError;

/// The syncing version among `versions`, if any.
///
/// More than one syncing version means the backend broke its own invariant;
/// that is reported as `DataConsistencyViolation` instead of picking one.
pub fn find_synced(versions: &[VersionRecord]) -> Result<Option<&VersionRecord>, VersionError> {
    let mut syncing = versions.iter().filter(|v| v.syncing);
    let Some(first) = syncing.next() else {
        return Ok(None);
    };

    let extra: Vec<&VersionRecord> = syncing.collect();
    if extra.is_empty() {
        return Ok(Some(first));
    }

    let version_ids: Vec<String> = std::iter::once(first)
        .chain(extra)
        .map(|v| v.id.clone())
        .collect();
    tracing::error!(?version_ids, "Multiple syncing versions observed");
    Err(VersionError::DataConsistencyViolation {
        count: version_ids.len(),
        version_ids,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::{VersionStatus, VersionType};

    fn version(id: &str, syncing: bool) -> VersionRecord {
        VersionRecord {
            id: id.to_string(),
            parent_id: "opp-1".to_string(),
            name: id.to_string(),
            version_type: VersionType::PreSale,
            status: if syncing {
                VersionStatus::Approved
            } else {
                VersionStatus::Draft
            },
            syncing,
            total_price: Decimal::ZERO,
            total_hours: Decimal::ZERO,
            total_cost: Decimal::ZERO,
        }
    }

    #[test]
    fn none_when_nothing_syncs() {
        assert!(find_synced(&[]).expect("ok").is_none());
        assert!(
            find_synced(&[version("a", false), version("b", false)])
                .expect("ok")
                .is_none()
        );
    }

    #[test]
    fn returns_the_single_syncing_version() {
        let versions = [version("a", false), version("b", true), version("c", false)];
        let synced = find_synced(&versions).expect("ok").expect("some");
        assert_eq!(synced.id, "b");
        assert!(synced.syncing);
    }

    #[test]
    fn two_syncing_versions_are_a_violation() {
        let versions = [version("a", true), version("b", false), version("c", true)];
        let err = find_synced(&versions).expect_err("violation");
        let VersionError::DataConsistencyViolation { count, version_ids } = err else {
            panic!("expected DataConsistencyViolation");
        };
        assert_eq!(count, 2);
        assert_eq!(version_ids, vec!["a".to_string(), "c".to_string()]);
    }
}
