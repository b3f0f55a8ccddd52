//! Purchasable products for one workflow session.

use crate::db::{CatalogEntry, Database};
use crate::error::VersionError;

/// Products loaded once per session and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    entries: Vec<CatalogEntry>,
}

impl ProductCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// Fetch the parent record's price book. Callers decide whether to
    /// continue with `ProductCatalog::default()` on failure.
    pub async fn load(db: &dyn Database, parent_id: &str) -> Result<Self, VersionError> {
        let entries = db
            .list_catalog_entries(parent_id)
            .await
            .map_err(VersionError::CatalogLoad)?;
        tracing::debug!(parent_id, count = entries.len(), "Loaded product catalog");
        Ok(Self::new(entries))
    }

    /// Entry whose display name is exactly `name`.
    ///
    /// Historical labels on line items may no longer exist in the catalog, and
    /// a name shared by several entries cannot identify one. Both yield `None`.
    pub fn match_by_name(&self, name: &str) -> Option<&CatalogEntry> {
        let mut matches = self.entries.iter().filter(|entry| entry.name == name);
        let first = matches.next()?;
        if matches.next().is_some() {
            tracing::warn!(name, "Ambiguous product name in catalog");
            return None;
        }
        Some(first)
    }

    pub fn by_product_id(&self, product_id: &str) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|entry| entry.product_id == product_id)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
