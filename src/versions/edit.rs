//! Line-item editing for an existing draft version.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::VersionsConfig;
use crate::db::{Database, VersionRecord};
use crate::error::VersionError;
use crate::versions::catalog::ProductCatalog;
use crate::versions::diff::{LineItemDiff, diff};
use crate::versions::lifecycle::{VersionAction, ensure_permitted};
use crate::versions::line_item::{LineItem, LineItemEdit, WorkingSet};
use crate::versions::notify::{RefreshBus, RefreshTopic};
use crate::versions::workflow::SaveGate;

/// Holds the line items as loaded (`original`) next to the operator's
/// working copy. `original` is a structural clone taken once at open and is
/// never mutated afterwards.
pub struct EditSession {
    db: Arc<dyn Database>,
    bus: RefreshBus,
    version: VersionRecord,
    catalog: ProductCatalog,
    original: Vec<LineItem>,
    working: WorkingSet,
    warnings: Vec<VersionError>,
    gate: SaveGate,
}

impl EditSession {
    /// Open `version` for editing. Fails with `LifecycleViolation` before
    /// touching the backend when the version may not be edited.
    pub async fn open(
        db: Arc<dyn Database>,
        bus: RefreshBus,
        config: &VersionsConfig,
        version: &VersionRecord,
    ) -> Result<Self, VersionError> {
        ensure_permitted(version, VersionAction::Edit)?;

        let mut warnings = Vec::new();
        let catalog = match ProductCatalog::load(db.as_ref(), &version.parent_id).await {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::warn!(version_id = %version.id, error = %e, "Continuing with an empty catalog");
                warnings.push(e);
                ProductCatalog::default()
            }
        };

        let original: Vec<LineItem> = match db.list_line_items(&version.id).await {
            Ok(records) => records
                .iter()
                .map(|record| LineItem::from_record(record, &catalog))
                .collect(),
            Err(e) => {
                tracing::warn!(version_id = %version.id, error = %e, "Continuing with no line items");
                warnings.push(VersionError::LineItemLoad(e));
                Vec::new()
            }
        };
        let working = WorkingSet::new_unseeded(original.clone(), config.seed_blank_line_item);

        tracing::info!(
            version_id = %version.id,
            line_items = original.len(),
            "Opened version editor"
        );

        Ok(Self {
            db,
            bus,
            version: version.clone(),
            catalog,
            original,
            working,
            warnings,
            gate: SaveGate::default(),
        })
    }

    pub fn version(&self) -> &VersionRecord {
        &self.version
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    pub fn original(&self) -> &[LineItem] {
        &self.original
    }

    pub fn line_items(&self) -> &[LineItem] {
        self.working.items()
    }

    pub fn warnings(&self) -> &[VersionError] {
        &self.warnings
    }

    pub fn add_line_item(&mut self) -> Uuid {
        self.working.add_blank()
    }

    pub fn remove_line_item(&mut self, local_key: Uuid) -> Result<LineItem, VersionError> {
        self.working.remove(local_key)
    }

    /// Apply a field edit. `PricingComplete` is not saved by the line-item
    /// batch and is refused.
    pub fn edit_line_item(&mut self, local_key: Uuid, edit: LineItemEdit) -> Result<(), VersionError> {
        if matches!(edit, LineItemEdit::PricingComplete(_)) {
            return Err(VersionError::UnsupportedEdit {
                field: "pricing_complete",
            });
        }
        self.working.apply(local_key, edit, &self.catalog)
    }

    /// Changes the next save would submit.
    pub fn diff(&self) -> LineItemDiff {
        diff(&self.version.id, &self.original, self.working.items())
    }

    /// Submit the diff as one batch, even when it is empty.
    ///
    /// On failure nothing is changed locally and the save may be retried.
    pub async fn save(&self) -> Result<LineItemDiff, VersionError> {
        let ticket = self.gate.begin()?;
        let changes = self.diff();
        let batch = changes.clone().into_batch();

        tracing::debug!(
            version_id = %self.version.id,
            create = batch.to_create.len(),
            update = batch.to_update.len(),
            delete = batch.to_delete_ids.len(),
            "Saving line items"
        );
        self.db.apply_line_item_batch(&batch).await.map_err(|e| {
            tracing::warn!(version_id = %self.version.id, error = %e, "Line item save failed");
            VersionError::SaveFailure(e)
        })?;
        ticket.commit();

        tracing::info!(version_id = %self.version.id, "Saved line items");
        self.bus.publish(RefreshTopic::VersionList);
        self.bus.publish(RefreshTopic::VersionLineItems);
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::db::memory::{BackendOp, Fixture, MemoryBackend};
    use crate::db::{LineItemRecord, LineItemStore, VersionStatus, VersionType};

    fn draft(syncing: bool, status: VersionStatus) -> VersionRecord {
        VersionRecord {
            id: "ver-1".to_string(),
            parent_id: "opp-1".to_string(),
            name: "Version-1".to_string(),
            version_type: VersionType::PreSale,
            status,
            syncing,
            total_price: Decimal::ZERO,
            total_hours: Decimal::ZERO,
            total_cost: Decimal::ZERO,
        }
    }

    fn backend() -> Arc<MemoryBackend> {
        let mut fixture = Fixture::default();
        fixture.versions.push(draft(false, VersionStatus::Draft));
        fixture.line_items.push(LineItemRecord {
            id: "li-1".to_string(),
            version_id: "ver-1".to_string(),
            product_label: Some("Build".to_string()),
            catalog_entry_id: Some("pbe-build".to_string()),
            hours: Some(dec!(5)),
            price: Some(dec!(100)),
            cost: Some(dec!(60)),
            pricing_complete: false,
        });
        Arc::new(MemoryBackend::new(fixture))
    }

    #[tokio::test]
    async fn syncing_version_is_refused_before_any_load() {
        let backend = backend();
        let result = EditSession::open(
            backend.clone(),
            RefreshBus::new(),
            &VersionsConfig::default(),
            &draft(true, VersionStatus::Draft),
        )
        .await;
        assert!(matches!(result, Err(VersionError::LifecycleViolation { .. })));
        assert_eq!(backend.call_count(BackendOp::ListLineItems).await, 0);
        assert_eq!(backend.call_count(BackendOp::ListCatalog).await, 0);
    }

    #[tokio::test]
    async fn editing_leaves_original_untouched() {
        let mut session = EditSession::open(
            backend(),
            RefreshBus::new(),
            &VersionsConfig::default(),
            &draft(false, VersionStatus::Draft),
        )
        .await
        .expect("open");
        let key = session.line_items()[0].local_key;
        session
            .edit_line_item(key, LineItemEdit::Hours("8".to_string()))
            .expect("edit");

        assert_eq!(session.original()[0].hours, dec!(5));
        assert_eq!(session.line_items()[0].hours, dec!(8));
        assert_eq!(session.diff().to_update.len(), 1);
    }

    #[tokio::test]
    async fn unmatched_label_keeps_catalog_reference_and_no_diff() {
        let session = EditSession::open(
            backend(),
            RefreshBus::new(),
            &VersionsConfig::default(),
            &draft(false, VersionStatus::Draft),
        )
        .await
        .expect("open");
        let item = &session.line_items()[0];
        assert_eq!(item.product.product_id, None);
        assert_eq!(item.product.catalog_entry_id.as_deref(), Some("pbe-build"));
        assert!(session.diff().is_empty());
    }

    fn empty_draft_backend() -> Arc<MemoryBackend> {
        let mut fixture = Fixture::default();
        fixture.versions.push(draft(false, VersionStatus::Draft));
        Arc::new(MemoryBackend::new(fixture))
    }

    #[tokio::test]
    async fn untouched_empty_version_saves_nothing() {
        let backend = empty_draft_backend();
        let session = EditSession::open(
            backend.clone(),
            RefreshBus::new(),
            &VersionsConfig::default(),
            &draft(false, VersionStatus::Draft),
        )
        .await
        .expect("open");
        assert!(session.line_items().is_empty());
        assert!(session.diff().is_empty());

        let changes = session.save().await.expect("save");
        assert!(changes.is_empty());
        assert!(backend.list_line_items("ver-1").await.expect("items").is_empty());
    }

    #[tokio::test]
    async fn failed_line_item_load_does_not_seed_a_blank_item() {
        let backend = backend();
        backend.set_failing(BackendOp::ListLineItems, true).await;
        let session = EditSession::open(
            backend,
            RefreshBus::new(),
            &VersionsConfig::default(),
            &draft(false, VersionStatus::Draft),
        )
        .await
        .expect("open");
        assert!(session.line_items().is_empty());
        assert!(session.diff().is_empty());
    }

    #[tokio::test]
    async fn removing_the_last_item_reseeds_a_blank_one() {
        let mut session = EditSession::open(
            backend(),
            RefreshBus::new(),
            &VersionsConfig::default(),
            &draft(false, VersionStatus::Draft),
        )
        .await
        .expect("open");
        let key = session.line_items()[0].local_key;
        session.remove_line_item(key).expect("remove");
        assert_eq!(session.line_items().len(), 1);
        assert_eq!(session.line_items()[0].id, None);
    }

    #[tokio::test]
    async fn pricing_complete_edits_are_refused() {
        let mut session = EditSession::open(
            backend(),
            RefreshBus::new(),
            &VersionsConfig::default(),
            &draft(false, VersionStatus::Draft),
        )
        .await
        .expect("open");
        let existing = session.line_items()[0].local_key;
        let added = session.add_line_item();

        for key in [existing, added] {
            let err = session
                .edit_line_item(key, LineItemEdit::PricingComplete(true))
                .expect_err("not saved by the batch");
            assert!(matches!(
                err,
                VersionError::UnsupportedEdit {
                    field: "pricing_complete"
                }
            ));
        }
        assert!(session.line_items().iter().all(|item| !item.pricing_complete));
    }

    #[tokio::test]
    async fn empty_save_still_issues_one_batch() {
        let backend = backend();
        let session = EditSession::open(
            backend.clone(),
            RefreshBus::new(),
            &VersionsConfig::default(),
            &draft(false, VersionStatus::Draft),
        )
        .await
        .expect("open");
        let changes = session.save().await.expect("save");
        assert!(changes.is_empty());
        assert_eq!(backend.call_count(BackendOp::ApplyBatch).await, 1);
    }
}
