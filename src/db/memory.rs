//! In-process backend over a JSON fixture.
//!
//! Mirrors the behavior the remote backend exposes to this crate: approving a
//! version makes it the syncing one, totals are rolled up from line items, and
//! a line-item batch is applied all-or-nothing.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::db::{
    CatalogEntry, CatalogStore, CreateVersionParams, LineItemBatch, LineItemRecord, LineItemStore,
    ParentStore, ProductRef, VersionRecord, VersionStatus, VersionStore,
};
use crate::error::DatabaseError;

/// Backend operation, used to inject failures in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    ListVersions,
    ListLineItems,
    ListCatalog,
    StageIndicator,
    CreateVersion,
    ApplyBatch,
    SetStatus,
    DeleteVersion,
}

/// A parent record: its stage and its price book.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParentFixture {
    pub stage: String,
    #[serde(default)]
    pub catalog: Vec<CatalogEntry>,
}

/// Serialized state of a `MemoryBackend`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub parents: HashMap<String, ParentFixture>,
    #[serde(default)]
    pub versions: Vec<VersionRecord>,
    #[serde(default)]
    pub line_items: Vec<LineItemRecord>,
    #[serde(default)]
    pub next_id: u64,
}

#[derive(Debug, Default)]
struct State {
    fixture: Fixture,
    failing: HashSet<BackendOp>,
    calls: HashMap<BackendOp, usize>,
}

impl State {
    fn enter(&mut self, op: BackendOp) -> Result<(), DatabaseError> {
        *self.calls.entry(op).or_default() += 1;
        if self.failing.contains(&op) {
            return Err(DatabaseError::Query(format!("injected failure for {op:?}")));
        }
        Ok(())
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.fixture.next_id += 1;
        format!("{prefix}-{}", self.fixture.next_id)
    }

    fn version_mut(&mut self, version_id: &str) -> Result<&mut VersionRecord, DatabaseError> {
        self.fixture
            .versions
            .iter_mut()
            .find(|v| v.id == version_id)
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "version".to_string(),
                id: version_id.to_string(),
            })
    }

    fn parent_of(&self, version_id: &str) -> Option<&str> {
        self.fixture
            .versions
            .iter()
            .find(|v| v.id == version_id)
            .map(|v| v.parent_id.as_str())
    }

    /// Display label for a product, looked up in the parent's price book.
    fn product_label(&self, parent_id: &str, product: &ProductRef) -> Option<String> {
        let product_id = product.product_id.as_deref()?;
        self.fixture
            .parents
            .get(parent_id)?
            .catalog
            .iter()
            .find(|entry| entry.product_id == product_id)
            .map(|entry| entry.name.clone())
    }

    fn recompute_totals(&mut self, version_id: &str) {
        let (mut price, mut hours, mut cost) = (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
        for item in self
            .fixture
            .line_items
            .iter()
            .filter(|item| item.version_id == version_id)
        {
            price += item.price.unwrap_or(Decimal::ZERO);
            hours += item.hours.unwrap_or(Decimal::ZERO);
            cost += item.cost.unwrap_or(Decimal::ZERO);
        }
        if let Ok(version) = self.version_mut(version_id) {
            version.total_price = price;
            version.total_hours = hours;
            version.total_cost = cost;
        }
    }
}

pub struct MemoryBackend {
    state: RwLock<State>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(Fixture::default())
    }
}

impl MemoryBackend {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            state: RwLock::new(State {
                fixture,
                ..State::default()
            }),
        }
    }

    /// Load a fixture from a JSON file.
    pub async fn load(path: &Path) -> Result<Self, DatabaseError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DatabaseError::Query(format!("failed to read {}: {}", path.display(), e)))?;
        let fixture: Fixture =
            serde_json::from_str(&raw).map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        Ok(Self::new(fixture))
    }

    /// Write the current state back to a JSON file.
    pub async fn save(&self, path: &Path) -> Result<(), DatabaseError> {
        let fixture = self.snapshot().await;
        let raw = serde_json::to_string_pretty(&fixture)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        tokio::fs::write(path, raw)
            .await
            .map_err(|e| DatabaseError::Query(format!("failed to write {}: {}", path.display(), e)))
    }

    pub async fn snapshot(&self) -> Fixture {
        self.state.read().await.fixture.clone()
    }

    /// Make every subsequent call of `op` fail until cleared.
    pub async fn set_failing(&self, op: BackendOp, failing: bool) {
        let mut state = self.state.write().await;
        if failing {
            state.failing.insert(op);
        } else {
            state.failing.remove(&op);
        }
    }

    /// Number of times `op` has been invoked, failures included.
    pub async fn call_count(&self, op: BackendOp) -> usize {
        self.state
            .read()
            .await
            .calls
            .get(&op)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl VersionStore for MemoryBackend {
    async fn list_versions(&self, parent_id: &str) -> Result<Vec<VersionRecord>, DatabaseError> {
        let mut state = self.state.write().await;
        state.enter(BackendOp::ListVersions)?;
        Ok(state
            .fixture
            .versions
            .iter()
            .filter(|v| v.parent_id == parent_id)
            .cloned()
            .collect())
    }

    async fn create_version(
        &self,
        parent_id: &str,
        input: &CreateVersionParams,
    ) -> Result<String, DatabaseError> {
        let mut state = self.state.write().await;
        state.enter(BackendOp::CreateVersion)?;
        if input.name.trim().is_empty() {
            return Err(DatabaseError::Constraint(
                "version name is required".to_string(),
            ));
        }

        let version_id = state.next_id("ver");
        state.fixture.versions.push(VersionRecord {
            id: version_id.clone(),
            parent_id: parent_id.to_string(),
            name: input.name.clone(),
            version_type: input.version_type,
            status: VersionStatus::Draft,
            syncing: false,
            total_price: Decimal::ZERO,
            total_hours: Decimal::ZERO,
            total_cost: Decimal::ZERO,
        });

        for item in &input.line_items {
            let id = state.next_id("li");
            let product_label = state.product_label(parent_id, &item.product);
            state.fixture.line_items.push(LineItemRecord {
                id,
                version_id: version_id.clone(),
                product_label,
                catalog_entry_id: item.product.catalog_entry_id.clone(),
                hours: Some(item.hours),
                price: Some(item.price),
                cost: Some(item.cost),
                pricing_complete: item.pricing_complete,
            });
        }
        state.recompute_totals(&version_id);
        Ok(version_id)
    }

    async fn set_version_status(
        &self,
        version_id: &str,
        status: VersionStatus,
    ) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        state.enter(BackendOp::SetStatus)?;
        let parent_id = state.version_mut(version_id)?.parent_id.clone();

        if status == VersionStatus::Approved {
            for sibling in state
                .fixture
                .versions
                .iter_mut()
                .filter(|v| v.parent_id == parent_id && v.id != version_id)
            {
                if sibling.syncing && sibling.status == VersionStatus::Approved {
                    sibling.status = VersionStatus::Obsolete;
                }
                sibling.syncing = false;
            }
        }

        let version = state.version_mut(version_id)?;
        version.status = status;
        if status == VersionStatus::Approved {
            version.syncing = true;
        }
        Ok(())
    }

    async fn delete_version(&self, version_id: &str) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        state.enter(BackendOp::DeleteVersion)?;
        state.version_mut(version_id)?;
        state.fixture.versions.retain(|v| v.id != version_id);
        state
            .fixture
            .line_items
            .retain(|item| item.version_id != version_id);
        Ok(())
    }
}

#[async_trait]
impl LineItemStore for MemoryBackend {
    async fn list_line_items(
        &self,
        version_id: &str,
    ) -> Result<Vec<LineItemRecord>, DatabaseError> {
        let mut state = self.state.write().await;
        state.enter(BackendOp::ListLineItems)?;
        Ok(state
            .fixture
            .line_items
            .iter()
            .filter(|item| item.version_id == version_id)
            .cloned()
            .collect())
    }

    async fn apply_line_item_batch(&self, batch: &LineItemBatch) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        state.enter(BackendOp::ApplyBatch)?;

        // Validate everything first so a rejected batch changes nothing.
        for item in &batch.to_create {
            if state.parent_of(&item.version_id).is_none() {
                return Err(DatabaseError::Constraint(format!(
                    "line item references unknown version '{}'",
                    item.version_id
                )));
            }
        }
        for id in batch
            .to_update
            .iter()
            .map(|u| &u.id)
            .chain(batch.to_delete_ids.iter())
        {
            if !state.fixture.line_items.iter().any(|item| &item.id == id) {
                return Err(DatabaseError::NotFound {
                    entity: "line item".to_string(),
                    id: id.clone(),
                });
            }
        }

        let mut touched: HashSet<String> = HashSet::new();

        for id in &batch.to_delete_ids {
            if let Some(pos) = state.fixture.line_items.iter().position(|i| &i.id == id) {
                let removed = state.fixture.line_items.remove(pos);
                touched.insert(removed.version_id);
            }
        }

        for update in &batch.to_update {
            let label = match &update.product {
                Some(product) => {
                    let parent = state
                        .fixture
                        .line_items
                        .iter()
                        .find(|i| i.id == update.id)
                        .and_then(|i| state.parent_of(&i.version_id))
                        .map(str::to_string)
                        .unwrap_or_default();
                    Some(state.product_label(&parent, product))
                }
                None => None,
            };
            let Some(item) = state
                .fixture
                .line_items
                .iter_mut()
                .find(|i| i.id == update.id)
            else {
                continue;
            };
            if let Some(product) = &update.product {
                item.catalog_entry_id = product.catalog_entry_id.clone();
            }
            if let Some(label) = label {
                item.product_label = label;
            }
            if let Some(hours) = update.hours {
                item.hours = Some(hours);
            }
            if let Some(price) = update.price {
                item.price = Some(price);
            }
            if let Some(cost) = update.cost {
                item.cost = Some(cost);
            }
            touched.insert(item.version_id.clone());
        }

        for create in &batch.to_create {
            let id = state.next_id("li");
            let parent = state
                .parent_of(&create.version_id)
                .map(str::to_string)
                .unwrap_or_default();
            let product_label = state.product_label(&parent, &create.product);
            state.fixture.line_items.push(LineItemRecord {
                id,
                version_id: create.version_id.clone(),
                product_label,
                catalog_entry_id: create.product.catalog_entry_id.clone(),
                hours: Some(create.hours),
                price: Some(create.price),
                cost: Some(create.cost),
                pricing_complete: false,
            });
            touched.insert(create.version_id.clone());
        }

        for version_id in touched {
            state.recompute_totals(&version_id);
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryBackend {
    async fn list_catalog_entries(
        &self,
        parent_id: &str,
    ) -> Result<Vec<CatalogEntry>, DatabaseError> {
        let mut state = self.state.write().await;
        state.enter(BackendOp::ListCatalog)?;
        Ok(state
            .fixture
            .parents
            .get(parent_id)
            .map(|p| p.catalog.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ParentStore for MemoryBackend {
    async fn get_stage_indicator(&self, parent_id: &str) -> Result<String, DatabaseError> {
        let mut state = self.state.write().await;
        state.enter(BackendOp::StageIndicator)?;
        state
            .fixture
            .parents
            .get(parent_id)
            .map(|p| p.stage.clone())
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "parent".to_string(),
                id: parent_id.to_string(),
            })
    }
}
