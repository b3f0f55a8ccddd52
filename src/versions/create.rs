//! New-version workflow.
//!
//! Opening a session classifies the parent's stage, names the new version,
//! loads the catalog, and seeds the working set from the syncing version's
//! line items. Saving submits the whole working set in one creation call.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::VersionsConfig;
use crate::db::{CreateVersionLineItemParams, CreateVersionParams, Database, VersionType};
use crate::error::VersionError;
use crate::versions::catalog::ProductCatalog;
use crate::versions::line_item::{LineItem, LineItemEdit, WorkingSet};
use crate::versions::naming::generate_name;
use crate::versions::notify::{RefreshBus, RefreshTopic};
use crate::versions::sync::find_synced;
use crate::versions::workflow::{SaveGate, classify_stage};

pub struct CreateSession {
    db: Arc<dyn Database>,
    bus: RefreshBus,
    parent_id: String,
    name: String,
    version_type: VersionType,
    source_version_id: Option<String>,
    catalog: ProductCatalog,
    working: WorkingSet,
    warnings: Vec<VersionError>,
    gate: SaveGate,
}

impl CreateSession {
    /// Open a session, deriving the version type from the parent's stage.
    ///
    /// A failed stage lookup falls back to pre-sale and is kept as a warning.
    pub async fn open(
        db: Arc<dyn Database>,
        bus: RefreshBus,
        config: &VersionsConfig,
        parent_id: &str,
    ) -> Result<Self, VersionError> {
        let (version_type, stage_warning) = match db.get_stage_indicator(parent_id).await {
            Ok(stage) => (classify_stage(&stage, config), None),
            Err(e) => {
                tracing::warn!(parent_id, error = %e, "Stage lookup failed; defaulting to pre-sale");
                (VersionType::PreSale, Some(VersionError::StageLoad(e)))
            }
        };

        let mut session = Self::open_with_type(db, bus, config, parent_id, version_type).await?;
        if let Some(warning) = stage_warning {
            session.warnings.insert(0, warning);
        }
        Ok(session)
    }

    /// Open a session for a known version type.
    ///
    /// Only the sibling-version load is fatal, since the name depends on it.
    /// Catalog and line-item failures leave empty collections and a warning.
    pub async fn open_with_type(
        db: Arc<dyn Database>,
        bus: RefreshBus,
        config: &VersionsConfig,
        parent_id: &str,
        version_type: VersionType,
    ) -> Result<Self, VersionError> {
        let versions = db
            .list_versions(parent_id)
            .await
            .map_err(VersionError::VersionLoad)?;
        let name = generate_name(&versions, version_type, config);

        let mut warnings = Vec::new();
        let catalog = match ProductCatalog::load(db.as_ref(), parent_id).await {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::warn!(parent_id, error = %e, "Continuing with an empty catalog");
                warnings.push(e);
                ProductCatalog::default()
            }
        };

        let mut items = Vec::new();
        let mut source_version_id = None;
        match find_synced(&versions) {
            Ok(Some(synced)) => match db.list_line_items(&synced.id).await {
                Ok(records) => {
                    items = records
                        .iter()
                        .map(|record| LineItem::copied_from(record, &catalog))
                        .collect();
                    source_version_id = Some(synced.id.clone());
                }
                Err(e) => {
                    tracing::warn!(version_id = %synced.id, error = %e, "Could not copy synced line items");
                    warnings.push(VersionError::LineItemLoad(e));
                }
            },
            Ok(None) => {}
            Err(e) => warnings.push(e),
        }

        tracing::info!(
            parent_id,
            name = %name,
            version_type = version_type.as_str(),
            copied = items.len(),
            "Opened version creation"
        );

        Ok(Self {
            db,
            bus,
            parent_id: parent_id.to_string(),
            name,
            version_type,
            source_version_id,
            catalog,
            working: WorkingSet::new(items, config.seed_blank_line_item),
            warnings,
            gate: SaveGate::default(),
        })
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version_type(&self) -> VersionType {
        self.version_type
    }

    /// The syncing version whose line items seeded this session.
    pub fn source_version_id(&self) -> Option<&str> {
        self.source_version_id.as_deref()
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    pub fn line_items(&self) -> &[LineItem] {
        self.working.items()
    }

    /// Degraded loads encountered while opening.
    pub fn warnings(&self) -> &[VersionError] {
        &self.warnings
    }

    pub fn add_line_item(&mut self) -> Uuid {
        self.working.add_blank()
    }

    pub fn remove_line_item(&mut self, local_key: Uuid) -> Result<LineItem, VersionError> {
        self.working.remove(local_key)
    }

    pub fn edit_line_item(&mut self, local_key: Uuid, edit: LineItemEdit) -> Result<(), VersionError> {
        self.working.apply(local_key, edit, &self.catalog)
    }

    /// The creation request for the current working set.
    pub fn payload(&self) -> CreateVersionParams {
        CreateVersionParams {
            name: self.name.clone(),
            version_type: self.version_type,
            line_items: self
                .working
                .items()
                .iter()
                .map(|item| CreateVersionLineItemParams {
                    product: item.product.clone(),
                    hours: item.hours,
                    price: item.price,
                    cost: item.cost,
                    pricing_complete: item.pricing_complete,
                })
                .collect(),
        }
    }

    /// Create the version. Returns its id.
    ///
    /// On failure the working set is untouched and the save may be retried.
    pub async fn save(&self) -> Result<String, VersionError> {
        let ticket = self.gate.begin()?;
        let payload = self.payload();

        let version_id = self
            .db
            .create_version(&self.parent_id, &payload)
            .await
            .map_err(|e| {
                tracing::warn!(parent_id = %self.parent_id, error = %e, "Version creation failed");
                VersionError::SaveFailure(e)
            })?;
        ticket.commit();

        tracing::info!(
            parent_id = %self.parent_id,
            version_id = %version_id,
            line_items = payload.line_items.len(),
            "Created version"
        );
        self.bus.publish(RefreshTopic::VersionList);
        Ok(version_id)
    }
}
