//! Built-in reference dataset.
//!
//! Used when the store cannot be reached or returns garbage, so the ledger
//! stays usable offline or when no endpoint is configured.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    core::adjustments::AdjustmentTable,
    errors::{Error, Result},
    models::{Employee, Item, ItemType, Snapshot},
    store::{StoreAction, StoreBackend},
};

fn employee(id: &str, name: &str) -> Employee {
    Employee {
        id: id.to_string(),
        name: name.to_string(),
        is_active: true,
    }
}

fn item(id: &str, name: &str, price: i64, item_type: ItemType) -> Item {
    Item {
        id: id.to_string(),
        name: name.to_string(),
        unit_price: Decimal::from(price),
        item_type,
        is_active: true,
    }
}

/// Small staff list and catalogue with an empty log.
#[must_use]
pub fn reference_snapshot() -> Snapshot {
    Snapshot {
        employees: vec![
            employee("emp-1", "Employee 1"),
            employee("emp-2", "Employee 2"),
            employee("emp-3", "Employee 3"),
        ],
        items: vec![
            item("tea", "Tea", 10, ItemType::Drink),
            item("coffee", "Coffee", 15, ItemType::Drink),
            item("biscuit", "Biscuit", 5, ItemType::Snack),
            item("samosa", "Samosa", 15, ItemType::Snack),
        ],
        consumption: Vec::new(),
        daily_adjustments: AdjustmentTable::new(),
    }
}

/// Backend used when no store is configured. Every call fails, which makes
/// the repository fall back to [`reference_snapshot`] and log each write.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineStore;

fn not_configured() -> Error {
    Error::Config {
        message: "no store endpoint configured".to_string(),
    }
}

#[async_trait]
impl StoreBackend for OfflineStore {
    async fn fetch(&self) -> Result<Snapshot> {
        Err(not_configured())
    }

    async fn apply(&self, _action: &StoreAction) -> Result<()> {
        Err(not_configured())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_snapshot_has_both_item_types() {
        let snapshot = reference_snapshot();
        assert_eq!(snapshot.active_headcount(), 3);
        assert!(snapshot.items.iter().any(|i| i.item_type == ItemType::Drink));
        assert!(snapshot.items.iter().any(|i| i.item_type == ItemType::Snack));
        assert!(snapshot.consumption.is_empty());
    }

    #[tokio::test]
    async fn test_offline_store_always_fails() {
        assert!(OfflineStore.fetch().await.is_err());
        let action = StoreAction::DeleteConsumption { id: "x".to_string() };
        assert!(OfflineStore.apply(&action).await.is_err());
    }
}
