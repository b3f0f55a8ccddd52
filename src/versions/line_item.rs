//! Client-side line items and the working set an operator edits.

use std::str::FromStr;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::{LineItemRecord, ProductRef};
use crate::error::VersionError;
use crate::versions::catalog::ProductCatalog;

/// A line item being edited.
///
/// `local_key` identifies the item inside one session, including before it
/// has a persisted `id`. It is never written to the backend. Every field is
/// owned, so `clone` yields a snapshot that shares nothing with the source.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub local_key: Uuid,
    pub id: Option<String>,
    /// Owning version; set for loaded items, assigned at save for new ones.
    pub version_id: Option<String>,
    pub product: ProductRef,
    /// Label to show for the product; the historical label for loaded items.
    pub product_name: String,
    pub hours: Decimal,
    pub price: Decimal,
    pub cost: Decimal,
    pub pricing_complete: bool,
    /// Locked items keep their product.
    pub locked: bool,
}

impl LineItem {
    pub fn blank() -> Self {
        Self {
            local_key: Uuid::new_v4(),
            id: None,
            version_id: None,
            product: ProductRef::default(),
            product_name: String::new(),
            hours: Decimal::ZERO,
            price: Decimal::ZERO,
            cost: Decimal::ZERO,
            pricing_complete: false,
            locked: false,
        }
    }

    /// A persisted line item of the version being edited.
    ///
    /// An unmatched label leaves the product id empty but keeps the catalog
    /// reference the backend already has, so an untouched item does not show
    /// up as changed.
    pub fn from_record(record: &LineItemRecord, catalog: &ProductCatalog) -> Self {
        let label = record.product_label.clone().unwrap_or_default();
        let matched = catalog.match_by_name(&label);
        if matched.is_none() {
            tracing::warn!(line_item_id = %record.id, label = %label, "No matching product for line item");
        }
        Self {
            local_key: Uuid::new_v4(),
            id: Some(record.id.clone()),
            version_id: Some(record.version_id.clone()),
            product: ProductRef {
                product_id: matched.map(|entry| entry.product_id.clone()),
                catalog_entry_id: matched
                    .map(|entry| entry.catalog_entry_id.clone())
                    .or_else(|| record.catalog_entry_id.clone()),
            },
            product_name: label,
            hours: record.hours.unwrap_or(Decimal::ZERO),
            price: record.price.unwrap_or(Decimal::ZERO),
            cost: record.cost.unwrap_or(Decimal::ZERO),
            pricing_complete: record.pricing_complete,
            locked: false,
        }
    }

    /// A line item copied from another version into a new one.
    ///
    /// The copy has no id of its own yet and is locked to its product. An
    /// unmatched label yields an empty product reference.
    pub fn copied_from(record: &LineItemRecord, catalog: &ProductCatalog) -> Self {
        let label = record.product_label.clone().unwrap_or_default();
        let product = match catalog.match_by_name(&label) {
            Some(entry) => ProductRef {
                product_id: Some(entry.product_id.clone()),
                catalog_entry_id: Some(entry.catalog_entry_id.clone()),
            },
            None => {
                tracing::warn!(line_item_id = %record.id, label = %label, "No matching product for copied line item");
                ProductRef::default()
            }
        };
        Self {
            local_key: Uuid::new_v4(),
            id: None,
            version_id: None,
            product,
            product_name: label,
            hours: record.hours.unwrap_or(Decimal::ZERO),
            price: record.price.unwrap_or(Decimal::ZERO),
            cost: record.cost.unwrap_or(Decimal::ZERO),
            pricing_complete: record.pricing_complete,
            locked: true,
        }
    }
}

/// One field edit from the operator. Numeric edits carry the raw input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineItemEdit {
    /// Select a product by id; an empty id clears the selection.
    Product(String),
    Hours(String),
    Price(String),
    Cost(String),
    PricingComplete(bool),
}

/// Parse operator input into a non-negative amount.
///
/// Unparseable and negative input both become zero.
pub fn normalize_amount(raw: &str) -> Decimal {
    match Decimal::from_str(raw.trim()) {
        Ok(value) if value.is_sign_negative() => Decimal::ZERO,
        Ok(value) => value.normalize(),
        Err(_) => Decimal::ZERO,
    }
}

/// The mutable line items of a session.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    items: Vec<LineItem>,
    seed_blank: bool,
}

impl WorkingSet {
    pub fn new(items: Vec<LineItem>, seed_blank: bool) -> Self {
        let mut set = Self { items, seed_blank };
        set.ensure_seeded();
        set
    }

    /// Like `new`, but an empty `items` stays empty until something is
    /// removed. Loaded sets must not gain items the operator never entered.
    pub fn new_unseeded(items: Vec<LineItem>, seed_blank: bool) -> Self {
        Self { items, seed_blank }
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn get(&self, local_key: Uuid) -> Option<&LineItem> {
        self.items.iter().find(|item| item.local_key == local_key)
    }

    pub fn add_blank(&mut self) -> Uuid {
        let item = LineItem::blank();
        let key = item.local_key;
        tracing::debug!(local_key = %key, "Added line item");
        self.items.push(item);
        key
    }

    pub fn remove(&mut self, local_key: Uuid) -> Result<LineItem, VersionError> {
        let pos = self
            .items
            .iter()
            .position(|item| item.local_key == local_key)
            .ok_or_else(|| VersionError::UnknownLineItem {
                local_key: local_key.to_string(),
            })?;
        let removed = self.items.remove(pos);
        tracing::debug!(local_key = %local_key, id = ?removed.id, "Removed line item");
        self.ensure_seeded();
        Ok(removed)
    }

    pub fn apply(
        &mut self,
        local_key: Uuid,
        edit: LineItemEdit,
        catalog: &ProductCatalog,
    ) -> Result<(), VersionError> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.local_key == local_key)
            .ok_or_else(|| VersionError::UnknownLineItem {
                local_key: local_key.to_string(),
            })?;

        match edit {
            LineItemEdit::Product(product_id) => {
                if item.locked {
                    return Err(VersionError::LineItemLocked {
                        local_key: local_key.to_string(),
                    });
                }
                if product_id.is_empty() {
                    item.product = ProductRef::default();
                    item.product_name.clear();
                    return Ok(());
                }
                match catalog.by_product_id(&product_id) {
                    Some(entry) => {
                        item.product.catalog_entry_id = Some(entry.catalog_entry_id.clone());
                        item.product_name = entry.name.clone();
                    }
                    None => {
                        tracing::warn!(product_id = %product_id, "No matching product for selection");
                    }
                }
                item.product.product_id = Some(product_id);
            }
            LineItemEdit::Hours(raw) => item.hours = normalize_amount(&raw),
            LineItemEdit::Price(raw) => item.price = normalize_amount(&raw),
            LineItemEdit::Cost(raw) => item.cost = normalize_amount(&raw),
            LineItemEdit::PricingComplete(done) => item.pricing_complete = done,
        }
        Ok(())
    }

    fn ensure_seeded(&mut self) {
        if self.seed_blank && self.items.is_empty() {
            self.items.push(LineItem::blank());
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::db::CatalogEntry;

    fn catalog() -> ProductCatalog {
        ProductCatalog::new(vec![
            CatalogEntry {
                product_id: "p-design".to_string(),
                name: "Design".to_string(),
                catalog_entry_id: "pbe-design".to_string(),
            },
            CatalogEntry {
                product_id: "p-build".to_string(),
                name: "Build".to_string(),
                catalog_entry_id: "pbe-build".to_string(),
            },
        ])
    }

    fn record(label: Option<&str>) -> LineItemRecord {
        LineItemRecord {
            id: "li-1".to_string(),
            version_id: "ver-1".to_string(),
            product_label: label.map(str::to_string),
            catalog_entry_id: Some("pbe-old".to_string()),
            hours: Some(dec!(5)),
            price: None,
            cost: Some(dec!(12.5)),
            pricing_complete: true,
        }
    }

    #[test]
    fn normalize_amount_handles_junk_and_negatives() {
        assert_eq!(normalize_amount("12.50"), dec!(12.5));
        assert_eq!(normalize_amount(" 7 "), dec!(7));
        assert_eq!(normalize_amount("abc"), Decimal::ZERO);
        assert_eq!(normalize_amount(""), Decimal::ZERO);
        assert_eq!(normalize_amount("-3"), Decimal::ZERO);
    }

    #[test]
    fn normalized_amounts_compare_equal_regardless_of_scale() {
        assert_eq!(normalize_amount("5.000"), normalize_amount("5"));
    }

    #[test]
    fn from_record_matches_label_to_catalog() {
        let item = LineItem::from_record(&record(Some("Build")), &catalog());
        assert_eq!(item.id.as_deref(), Some("li-1"));
        assert_eq!(item.version_id.as_deref(), Some("ver-1"));
        assert_eq!(item.product.product_id.as_deref(), Some("p-build"));
        assert_eq!(item.product.catalog_entry_id.as_deref(), Some("pbe-build"));
        assert_eq!(item.price, Decimal::ZERO);
        assert!(!item.locked);
    }

    #[test]
    fn from_record_keeps_backend_reference_when_label_is_unknown() {
        let item = LineItem::from_record(&record(Some("Retired Team")), &catalog());
        assert_eq!(item.product.product_id, None);
        assert_eq!(item.product.catalog_entry_id.as_deref(), Some("pbe-old"));
        assert_eq!(item.product_name, "Retired Team");
    }

    #[test]
    fn copied_item_with_unknown_label_has_empty_product() {
        let item = LineItem::copied_from(&record(Some("Retired Team")), &catalog());
        assert!(item.product.is_empty());
        assert!(item.locked);
        assert_eq!(item.id, None);
        assert_eq!(item.hours, dec!(5));
    }

    #[test]
    fn local_keys_are_distinct_from_ids() {
        let a = LineItem::from_record(&record(Some("Build")), &catalog());
        let b = LineItem::from_record(&record(Some("Build")), &catalog());
        assert_eq!(a.id, b.id);
        assert_ne!(a.local_key, b.local_key);
    }

    #[test]
    fn product_edit_resolves_catalog_reference() {
        let mut set = WorkingSet::new(vec![], true);
        let key = set.items()[0].local_key;
        set.apply(key, LineItemEdit::Product("p-design".to_string()), &catalog())
            .expect("edit");
        let item = set.get(key).expect("item");
        assert_eq!(item.product.catalog_entry_id.as_deref(), Some("pbe-design"));
        assert_eq!(item.product_name, "Design");
    }

    #[test]
    fn unknown_product_keeps_previous_catalog_reference() {
        let mut set = WorkingSet::new(
            vec![LineItem::from_record(&record(Some("Build")), &catalog())],
            true,
        );
        let key = set.items()[0].local_key;
        set.apply(key, LineItemEdit::Product("p-gone".to_string()), &catalog())
            .expect("edit");
        let item = set.get(key).expect("item");
        assert_eq!(item.product.product_id.as_deref(), Some("p-gone"));
        assert_eq!(item.product.catalog_entry_id.as_deref(), Some("pbe-build"));
    }

    #[test]
    fn locked_items_refuse_product_changes_but_accept_numbers() {
        let mut set = WorkingSet::new(
            vec![LineItem::copied_from(&record(Some("Build")), &catalog())],
            true,
        );
        let key = set.items()[0].local_key;
        let err = set
            .apply(key, LineItemEdit::Product("p-design".to_string()), &catalog())
            .expect_err("locked");
        assert!(matches!(err, VersionError::LineItemLocked { .. }));

        set.apply(key, LineItemEdit::Hours("8".to_string()), &catalog())
            .expect("hours");
        set.apply(key, LineItemEdit::PricingComplete(false), &catalog())
            .expect("flag");
        let item = set.get(key).expect("item");
        assert_eq!(item.hours, dec!(8));
        assert!(!item.pricing_complete);
        assert_eq!(item.product.product_id.as_deref(), Some("p-build"));
    }

    #[test]
    fn removing_the_last_item_reseeds_a_blank_one() {
        let mut set = WorkingSet::new(vec![], true);
        assert_eq!(set.items().len(), 1);
        let key = set.items()[0].local_key;
        set.remove(key).expect("remove");
        assert_eq!(set.items().len(), 1);
        assert_ne!(set.items()[0].local_key, key);

        let mut loaded = WorkingSet::new_unseeded(vec![], true);
        assert!(loaded.items().is_empty());
        let key = loaded.add_blank();
        loaded.remove(key).expect("remove");
        assert_eq!(loaded.items().len(), 1);

        let mut unseeded = WorkingSet::new(vec![], false);
        assert!(unseeded.items().is_empty());
        let key = unseeded.add_blank();
        unseeded.remove(key).expect("remove");
        assert!(unseeded.items().is_empty());
    }

    #[test]
    fn unknown_key_is_an_error() {
        let mut set = WorkingSet::new(vec![], true);
        let err = set.remove(Uuid::new_v4()).expect_err("unknown");
        assert!(matches!(err, VersionError::UnknownLineItem { .. }));
    }
}
