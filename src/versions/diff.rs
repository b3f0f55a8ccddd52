//! Original-versus-working comparison for the edit workflow.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;

use crate::db::{CreateLineItemParams, LineItemBatch, ProductRef, UpdateLineItemParams};
use crate::versions::line_item::LineItem;

/// The disjoint partition of changes between two line-item sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineItemDiff {
    pub to_create: Vec<CreateLineItemParams>,
    pub to_update: Vec<UpdateLineItemParams>,
    pub to_delete: Vec<String>,
}

impl LineItemDiff {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    pub fn into_batch(self) -> LineItemBatch {
        LineItemBatch {
            to_create: self.to_create,
            to_update: self.to_update,
            to_delete_ids: self.to_delete,
        }
    }
}

/// The product counts as changed only when its catalog-entry id does; that
/// is the reference the backend stores.
fn changed_product(before: &ProductRef, after: &ProductRef) -> Option<ProductRef> {
    (before.catalog_entry_id != after.catalog_entry_id).then(|| after.clone())
}

fn changed_amount(before: Decimal, after: Decimal) -> Option<Decimal> {
    (before != after).then_some(after)
}

/// Compare `working` against `original` by persisted id.
///
/// Items without an id become creates owned by `version_id`. Ids present only
/// in `original` become deletes. Items present in both become updates
/// carrying only the fields that differ among catalog-entry id, hours, price,
/// and cost. `pricing_complete` is not compared.
/// A working item whose id never appeared in `original` is skipped.
pub fn diff(version_id: &str, original: &[LineItem], working: &[LineItem]) -> LineItemDiff {
    let originals: HashMap<&str, &LineItem> = original
        .iter()
        .filter_map(|item| item.id.as_deref().map(|id| (id, item)))
        .collect();
    let mut kept: HashSet<&str> = HashSet::new();
    let mut result = LineItemDiff::default();

    for item in working {
        let Some(id) = item.id.as_deref() else {
            result.to_create.push(CreateLineItemParams {
                version_id: version_id.to_string(),
                product: item.product.clone(),
                hours: item.hours,
                price: item.price,
                cost: item.cost,
            });
            continue;
        };

        let Some(before) = originals.get(id) else {
            tracing::debug!(line_item_id = id, "Skipping line item missing from original set");
            continue;
        };
        kept.insert(id);

        let update = UpdateLineItemParams {
            id: id.to_string(),
            product: changed_product(&before.product, &item.product),
            hours: changed_amount(before.hours, item.hours),
            price: changed_amount(before.price, item.price),
            cost: changed_amount(before.cost, item.cost),
        };
        if update.product.is_some()
            || update.hours.is_some()
            || update.price.is_some()
            || update.cost.is_some()
        {
            result.to_update.push(update);
        }
    }

    result.to_delete = original
        .iter()
        .filter_map(|item| item.id.as_deref())
        .filter(|id| !kept.contains(id))
        .map(str::to_string)
        .collect();

    result
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn item(id: Option<&str>, hours: Decimal) -> LineItem {
        LineItem {
            id: id.map(str::to_string),
            product: ProductRef {
                product_id: Some("p-build".to_string()),
                catalog_entry_id: Some("pbe-build".to_string()),
            },
            product_name: "Build".to_string(),
            hours,
            ..LineItem::blank()
        }
    }

    #[test]
    fn identical_sets_produce_no_changes() {
        let original = vec![item(Some("1"), dec!(5)), item(Some("2"), dec!(3))];
        let working = original.clone();
        assert!(diff("ver-1", &original, &working).is_empty());
        assert!(diff("ver-1", &[], &[]).is_empty());
    }

    #[test]
    fn changed_hours_and_new_item() {
        let original = vec![item(Some("1"), dec!(5))];
        let mut working = original.clone();
        working[0].hours = dec!(8);
        working.push(item(None, dec!(2)));

        let result = diff("ver-1", &original, &working);
        assert_eq!(
            result.to_create,
            vec![CreateLineItemParams {
                version_id: "ver-1".to_string(),
                product: working[1].product.clone(),
                hours: dec!(2),
                price: Decimal::ZERO,
                cost: Decimal::ZERO,
            }]
        );
        assert_eq!(
            result.to_update,
            vec![UpdateLineItemParams {
                id: "1".to_string(),
                product: None,
                hours: Some(dec!(8)),
                price: None,
                cost: None,
            }]
        );
        assert!(result.to_delete.is_empty());
    }

    #[test]
    fn removed_item_is_deleted() {
        let original = vec![item(Some("1"), dec!(5)), item(Some("2"), dec!(5))];
        let working = vec![original[0].clone()];
        let result = diff("ver-1", &original, &working);
        assert_eq!(result.to_delete, vec!["2".to_string()]);
        assert!(result.to_create.is_empty());
        assert!(result.to_update.is_empty());
    }

    #[test]
    fn product_change_is_an_update() {
        let original = vec![item(Some("1"), dec!(5))];
        let mut working = original.clone();
        working[0].product = ProductRef {
            product_id: Some("p-design".to_string()),
            catalog_entry_id: Some("pbe-design".to_string()),
        };
        let result = diff("ver-1", &original, &working);
        assert_eq!(result.to_update.len(), 1);
        assert_eq!(result.to_update[0].product, Some(working[0].product.clone()));
        assert_eq!(result.to_update[0].hours, None);
    }

    #[test]
    fn product_id_alone_is_not_a_change() {
        let mut unmatched = item(Some("1"), dec!(5));
        unmatched.product.product_id = None;
        let original = vec![unmatched];
        let mut working = original.clone();
        working[0].product.product_id = Some("p-retired".to_string());
        assert!(diff("ver-1", &original, &working).is_empty());
    }

    #[test]
    fn pricing_complete_alone_is_not_a_change() {
        let original = vec![item(Some("1"), dec!(5))];
        let mut working = original.clone();
        working[0].pricing_complete = !working[0].pricing_complete;
        assert!(diff("ver-1", &original, &working).is_empty());
    }

    #[test]
    fn scale_differences_are_not_changes() {
        let original = vec![item(Some("1"), dec!(5.0))];
        let mut working = original.clone();
        working[0].hours = dec!(5);
        assert!(diff("ver-1", &original, &working).is_empty());
    }

    #[test]
    fn working_id_absent_from_original_is_ignored() {
        let original = vec![item(Some("1"), dec!(5))];
        let working = vec![original[0].clone(), item(Some("99"), dec!(1))];
        assert!(diff("ver-1", &original, &working).is_empty());
    }

    #[test]
    fn partitions_are_disjoint() {
        let original = vec![
            item(Some("1"), dec!(1)),
            item(Some("2"), dec!(2)),
            item(Some("3"), dec!(3)),
        ];
        let mut working = vec![original[0].clone(), original[2].clone()];
        working[1].cost = dec!(40);
        working.push(item(None, dec!(4)));

        let result = diff("ver-1", &original, &working);
        let updated: HashSet<&str> = result.to_update.iter().map(|u| u.id.as_str()).collect();
        let deleted: HashSet<&str> = result.to_delete.iter().map(String::as_str).collect();
        assert!(updated.is_disjoint(&deleted));
        assert_eq!(updated, HashSet::from(["3"]));
        assert_eq!(deleted, HashSet::from(["2"]));
        assert_eq!(result.to_create.len(), 1);

        let batch = result.into_batch();
        assert_eq!(batch.to_delete_ids, vec!["2".to_string()]);
    }
}
