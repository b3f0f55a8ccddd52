//! Persistence boundary.
//!
//! The remote backend that owns versions, line items, and the product catalog
//! is an external collaborator. This module defines the records it returns,
//! the parameters it accepts, and a backend-agnostic `Database` trait made of
//! per-concern sub-traits:
//!
//! - `VersionStore`: versions of a parent record and their status
//! - `LineItemStore`: line items of a version, written in one batch
//! - `CatalogStore`: purchasable products for a parent record
//! - `ParentStore`: the parent record's stage indicator
//!
//! `memory::MemoryBackend` implements all of them in-process.

pub mod memory;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;

/// Whether a version was drafted before or after the deal closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionType {
    #[serde(rename = "Pre-Sale")]
    PreSale,
    #[serde(rename = "Post-Sale")]
    PostSale,
}

impl VersionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreSale => "Pre-Sale",
            Self::PostSale => "Post-Sale",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "Pre-Sale" => Some(Self::PreSale),
            "Post-Sale" => Some(Self::PostSale),
            _ => None,
        }
    }
}

/// Version lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionStatus {
    Draft,
    Approved,
    Obsolete,
}

impl VersionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Approved => "Approved",
            Self::Obsolete => "Obsolete",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "Draft" => Some(Self::Draft),
            "Approved" => Some(Self::Approved),
            "Obsolete" => Some(Self::Obsolete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: String,
    pub parent_id: String,
    pub name: String,
    pub version_type: VersionType,
    pub status: VersionStatus,
    pub syncing: bool,
    /// Totals are computed by the backend from the version's line items.
    #[serde(default)]
    pub total_price: Decimal,
    #[serde(default)]
    pub total_hours: Decimal,
    #[serde(default)]
    pub total_cost: Decimal,
}

/// Line item as the backend returns it.
///
/// The backend does not return the catalog key of the product directly, only
/// its display label; callers match the label against the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemRecord {
    pub id: String,
    pub version_id: String,
    #[serde(default)]
    pub product_label: Option<String>,
    #[serde(default)]
    pub catalog_entry_id: Option<String>,
    #[serde(default)]
    pub hours: Option<Decimal>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub cost: Option<Decimal>,
    #[serde(default)]
    pub pricing_complete: bool,
}

/// One purchasable product in a parent record's price book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub product_id: String,
    pub name: String,
    /// Price-book entry id; the durable reference written on line items.
    pub catalog_entry_id: String,
}

/// The product a line item points at. Both halves are empty for a line item
/// with no product selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductRef {
    pub product_id: Option<String>,
    pub catalog_entry_id: Option<String>,
}

impl ProductRef {
    pub fn is_empty(&self) -> bool {
        self.product_id.is_none() && self.catalog_entry_id.is_none()
    }
}

/// Line item submitted together with a new version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateVersionLineItemParams {
    pub product: ProductRef,
    pub hours: Decimal,
    pub price: Decimal,
    pub cost: Decimal,
    pub pricing_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateVersionParams {
    pub name: String,
    pub version_type: VersionType,
    pub line_items: Vec<CreateVersionLineItemParams>,
}

/// New line item for an existing version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateLineItemParams {
    pub version_id: String,
    pub product: ProductRef,
    pub hours: Decimal,
    pub price: Decimal,
    pub cost: Decimal,
}

/// Changed fields of a persisted line item. `None` means unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateLineItemParams {
    pub id: String,
    pub product: Option<ProductRef>,
    pub hours: Option<Decimal>,
    pub price: Option<Decimal>,
    pub cost: Option<Decimal>,
}

/// A single batched line-item write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItemBatch {
    pub to_create: Vec<CreateLineItemParams>,
    pub to_update: Vec<UpdateLineItemParams>,
    pub to_delete_ids: Vec<String>,
}

impl LineItemBatch {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete_ids.is_empty()
    }
}

// ==================== Sub-traits ====================
//
// Each sub-trait groups related persistence methods. The `Database` supertrait
// combines them; leaf consumers can depend on a specific sub-trait instead.

#[async_trait]
pub trait VersionStore: Send + Sync {
    async fn list_versions(&self, parent_id: &str) -> Result<Vec<VersionRecord>, DatabaseError>;
    /// Create a Draft, non-syncing version with its line items. Returns the
    /// new version id.
    async fn create_version(
        &self,
        parent_id: &str,
        input: &CreateVersionParams,
    ) -> Result<String, DatabaseError>;
    async fn set_version_status(
        &self,
        version_id: &str,
        status: VersionStatus,
    ) -> Result<(), DatabaseError>;
    async fn delete_version(&self, version_id: &str) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait LineItemStore: Send + Sync {
    async fn list_line_items(&self, version_id: &str)
    -> Result<Vec<LineItemRecord>, DatabaseError>;
    async fn apply_line_item_batch(&self, batch: &LineItemBatch) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_catalog_entries(&self, parent_id: &str)
    -> Result<Vec<CatalogEntry>, DatabaseError>;
}

#[async_trait]
pub trait ParentStore: Send + Sync {
    /// Free-form stage label of the parent record, used only to classify new
    /// versions as pre- or post-sale.
    async fn get_stage_indicator(&self, parent_id: &str) -> Result<String, DatabaseError>;
}

/// Backend-agnostic database supertrait.
pub trait Database: VersionStore + LineItemStore + CatalogStore + ParentStore + Send + Sync {}

impl<T> Database for T where T: VersionStore + LineItemStore + CatalogStore + ParentStore + Send + Sync
{}
