//! Inventory operations for agents and containers.
//!
//! Inventories are item-name to count maps. Counts never go below zero and
//! a key is removed once its count reaches zero. All sums use checked
//! arithmetic -- no silent overflows, no panics.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::SettlementError;

/// An item-name to count map.
pub type Inventory = BTreeMap<String, i32>;

/// Sum of all positive counts. Saturates instead of overflowing.
pub fn total_items(inventory: &Inventory) -> i32 {
    inventory
        .values()
        .filter(|qty| **qty > 0)
        .fold(0_i32, |acc, qty| acc.saturating_add(*qty))
}

/// Count of `item`, zero when absent.
pub fn count_of(inventory: &Inventory, item: &str) -> i32 {
    inventory.get(item).copied().unwrap_or(0)
}

/// Whether the inventory holds at least every listed amount.
pub fn has_all(inventory: &Inventory, required: &[(&str, i32)]) -> bool {
    required
        .iter()
        .all(|(item, qty)| count_of(inventory, item) >= *qty)
}

/// Add `amount` of `item`. Non-positive amounts and blank names are ignored.
pub fn add_item(inventory: &mut Inventory, item: &str, amount: i32) -> Result<(), SettlementError> {
    if amount <= 0 || item.is_empty() {
        return Ok(());
    }
    let entry = inventory.entry(item.to_owned()).or_insert(0);
    *entry = entry
        .checked_add(amount)
        .ok_or_else(|| SettlementError::overflow("inventory item count"))?;
    Ok(())
}

/// Remove `amount` of `item`.
///
/// Returns `false` and leaves the inventory unchanged when the item is not
/// held in sufficient quantity. Removes the key when the count hits zero.
pub fn consume_item(inventory: &mut Inventory, item: &str, amount: i32) -> bool {
    if amount <= 0 || item.is_empty() {
        return false;
    }
    let current = count_of(inventory, item);
    let Some(remaining) = current.checked_sub(amount).filter(|r| *r >= 0) else {
        return false;
    };
    if remaining == 0 {
        inventory.remove(item);
    } else {
        inventory.insert(item.to_owned(), remaining);
    }
    true
}

/// Consume every listed amount, or nothing at all when any is missing.
pub fn consume_all(inventory: &mut Inventory, required: &[(&str, i32)]) -> bool {
    if !has_all(inventory, required) {
        return false;
    }
    required
        .iter()
        .all(|(item, qty)| consume_item(inventory, item, *qty))
}

/// Per-item change from `before` to `after`, omitting unchanged items.
pub fn inventory_delta(before: &Inventory, after: &Inventory) -> BTreeMap<String, i32> {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    keys.into_iter()
        .filter_map(|key| {
            let diff = count_of(after, key).saturating_sub(count_of(before, key));
            (diff != 0).then(|| (key.clone(), diff))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inv(items: &[(&str, i32)]) -> Inventory {
        items.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect()
    }

    #[test]
    fn total_items_skips_non_positive() {
        assert_eq!(total_items(&inv(&[("wood", 3), ("stone", 0), ("berry", 2)])), 5);
        assert_eq!(total_items(&Inventory::new()), 0);
    }

    #[test]
    fn add_item_stacks() {
        let mut i = inv(&[("wood", 2)]);
        assert!(add_item(&mut i, "wood", 3).is_ok());
        assert!(add_item(&mut i, "", 3).is_ok());
        assert!(add_item(&mut i, "stone", 0).is_ok());
        assert_eq!(i, inv(&[("wood", 5)]));
    }

    #[test]
    fn add_item_overflow_is_error() {
        let mut i = inv(&[("wood", i32::MAX)]);
        assert!(add_item(&mut i, "wood", 1).is_err());
    }

    #[test]
    fn consume_item_exact_removes_key() {
        let mut i = inv(&[("wood", 2)]);
        assert!(consume_item(&mut i, "wood", 2));
        assert!(i.is_empty());
    }

    #[test]
    fn consume_item_insufficient_is_noop() {
        let mut i = inv(&[("wood", 1)]);
        assert!(!consume_item(&mut i, "wood", 2));
        assert_eq!(count_of(&i, "wood"), 1);
        assert!(!consume_item(&mut i, "stone", 1));
    }

    #[test]
    fn consume_all_is_atomic() {
        let mut i = inv(&[("wood", 6), ("berry", 1)]);
        assert!(!consume_all(&mut i, &[("wood", 6), ("berry", 2)]));
        assert_eq!(i, inv(&[("wood", 6), ("berry", 1)]));
        assert!(consume_all(&mut i, &[("wood", 6), ("berry", 1)]));
        assert!(i.is_empty());
    }

    #[test]
    fn delta_reports_changes_only() {
        let before = inv(&[("wood", 2), ("stone", 1)]);
        let after = inv(&[("wood", 4), ("stone", 1), ("plank", 1)]);
        assert_eq!(
            inventory_delta(&before, &after),
            inv(&[("wood", 2), ("plank", 1)])
        );
    }
}
