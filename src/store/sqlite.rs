//! Local `SQLite` backend.
//!
//! Speaks the same [`StoreAction`] protocol as the remote endpoint, against
//! tables managed by `SeaORM`. Prices are stored as `REAL` and converted to
//! [`Decimal`](rust_decimal::Decimal) on the way out.

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, instrument};

use crate::{
    core::adjustments::{AdjustmentTable, EmployeeAdjustment},
    entities::{Adjustment, Consumption, Employee, Item, adjustment, consumption, employee, item},
    errors::Result,
    models::{self, ConsumptionRecord, ItemType, Snapshot, to_decimal, to_f64},
    store::{StoreAction, StoreBackend},
};

/// Store backed by a `SeaORM` connection.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: DatabaseConnection,
}

impl SqliteStore {
    /// Wraps an open connection whose tables already exist.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Underlying connection
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn consumption_to_active(record: &ConsumptionRecord) -> consumption::ActiveModel {
    consumption::ActiveModel {
        id: Set(record.id.clone()),
        employee_id: Set(record.employee_id.clone()),
        item_id: Set(record.item_id.clone()),
        item_name: Set(record.item_name.clone()),
        item_type: Set(record.item_type.as_str().to_string()),
        unit_price: Set(to_f64(record.unit_price)),
        timestamp: Set(record.timestamp),
        quantity: Set(i64::from(record.quantity)),
    }
}

fn consumption_from_model(model: consumption::Model) -> ConsumptionRecord {
    ConsumptionRecord {
        id: model.id,
        employee_id: model.employee_id,
        item_id: model.item_id,
        item_name: model.item_name,
        item_type: ItemType::parse_lenient(&model.item_type),
        unit_price: to_decimal(model.unit_price),
        timestamp: model.timestamp,
        quantity: u32::try_from(model.quantity).unwrap_or(1).max(1),
    }
}

async fn insert_consumption<C>(db: &C, record: &ConsumptionRecord) -> Result<()>
where
    C: ConnectionTrait,
{
    consumption_to_active(record).insert(db).await?;
    Ok(())
}

async fn save_employee<C>(db: &C, employee: &models::Employee) -> Result<()>
where
    C: ConnectionTrait,
{
    if let Some(existing) = Employee::find_by_id(employee.id.clone()).one(db).await? {
        let mut active_model: employee::ActiveModel = existing.into();
        active_model.name = Set(employee.name.clone());
        active_model.is_active = Set(employee.is_active);
        active_model.update(db).await?;
    } else {
        employee::ActiveModel {
            id: Set(employee.id.clone()),
            name: Set(employee.name.clone()),
            is_active: Set(employee.is_active),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

async fn save_item<C>(db: &C, item: &models::Item) -> Result<()>
where
    C: ConnectionTrait,
{
    if let Some(existing) = Item::find_by_id(item.id.clone()).one(db).await? {
        let mut active_model: item::ActiveModel = existing.into();
        active_model.name = Set(item.name.clone());
        active_model.unit_price = Set(to_f64(item.unit_price));
        active_model.item_type = Set(item.item_type.as_str().to_string());
        active_model.is_active = Set(item.is_active);
        active_model.update(db).await?;
    } else {
        item::ActiveModel {
            id: Set(item.id.clone()),
            name: Set(item.name.clone()),
            unit_price: Set(to_f64(item.unit_price)),
            item_type: Set(item.item_type.as_str().to_string()),
            is_active: Set(item.is_active),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

async fn replace_adjustments<C>(db: &C, table: &AdjustmentTable) -> Result<()>
where
    C: ConnectionTrait,
{
    Adjustment::delete_many().exec(db).await?;

    for (date, employee_id, entry) in table.iter() {
        let rows: Vec<(Option<String>, u32)> = match entry {
            EmployeeAdjustment::Units(count) => vec![(None, *count)],
            EmployeeAdjustment::Items(items) => items
                .iter()
                .map(|(item_id, count)| (Some(item_id.clone()), *count))
                .collect(),
        };
        for (item_id, count) in rows {
            adjustment::ActiveModel {
                date: Set(date),
                employee_id: Set(employee_id.to_string()),
                item_id: Set(item_id),
                count: Set(i64::from(count)),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }
    Ok(())
}

fn adjustments_from_rows(rows: Vec<adjustment::Model>) -> AdjustmentTable {
    let mut table = AdjustmentTable::new();
    for row in rows {
        let count = u32::try_from(row.count).unwrap_or(0);
        match row.item_id {
            Some(item_id) => table.set(row.date, &row.employee_id, &item_id, count),
            None => table.set_entry(row.date, &row.employee_id, EmployeeAdjustment::Units(count)),
        }
    }
    table
}

#[async_trait]
impl StoreBackend for SqliteStore {
    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<Snapshot> {
        let employees = Employee::find()
            .order_by_asc(employee::Column::Name)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|model| models::Employee {
                id: model.id,
                name: model.name,
                is_active: model.is_active,
            })
            .collect();

        let items = Item::find()
            .order_by_asc(item::Column::Name)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|model| models::Item {
                id: model.id,
                name: model.name,
                unit_price: to_decimal(model.unit_price),
                item_type: ItemType::parse_lenient(&model.item_type),
                is_active: model.is_active,
            })
            .collect();

        let consumption = Consumption::find()
            .order_by_asc(consumption::Column::Timestamp)
            .all(&self.db)
            .await?
            .into_iter()
            .map(consumption_from_model)
            .collect();

        let daily_adjustments = adjustments_from_rows(
            Adjustment::find()
                .order_by_asc(adjustment::Column::Id)
                .all(&self.db)
                .await?,
        );

        Ok(Snapshot {
            employees,
            items,
            consumption,
            daily_adjustments,
        })
    }

    #[instrument(skip(self, action), fields(action = action.name()))]
    async fn apply(&self, action: &StoreAction) -> Result<()> {
        match action {
            StoreAction::AddConsumption(record) => insert_consumption(&self.db, record).await?,
            StoreAction::AddConsumptionBatch(records) => {
                // All rows land or none do
                let txn = self.db.begin().await?;
                for record in records {
                    insert_consumption(&txn, record).await?;
                }
                txn.commit().await?;
            }
            StoreAction::DeleteConsumption { id } => {
                Consumption::delete_by_id(id.clone()).exec(&self.db).await?;
            }
            StoreAction::DeleteConsumptionBatch { ids } => {
                Consumption::delete_many()
                    .filter(consumption::Column::Id.is_in(ids.iter().cloned()))
                    .exec(&self.db)
                    .await?;
            }
            StoreAction::SaveAdjustments(table) => {
                let txn = self.db.begin().await?;
                replace_adjustments(&txn, table).await?;
                txn.commit().await?;
            }
            StoreAction::SaveEmployee(employee) => save_employee(&self.db, employee).await?,
            StoreAction::SaveItem(item) => save_item(&self.db, item).await?,
        }
        debug!("Applied store action");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_fetch_empty_store() -> Result<()> {
        let store = setup_test_store().await?;
        let snapshot = store.fetch().await?;
        assert_eq!(snapshot, Snapshot::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_employee_inserts_then_updates() -> Result<()> {
        let store = setup_test_store().await?;

        store
            .apply(&StoreAction::SaveEmployee(employee("e1", "Asha", true)))
            .await?;
        store
            .apply(&StoreAction::SaveEmployee(employee("e1", "Asha K", false)))
            .await?;

        let snapshot = store.fetch().await?;
        assert_eq!(snapshot.employees, vec![employee("e1", "Asha K", false)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_item_keeps_price_and_type() -> Result<()> {
        let store = setup_test_store().await?;
        let mut samosa = item("samosa", "Samosa", 15, ItemType::Snack);
        samosa.unit_price = Decimal::new(1250, 2);

        store.apply(&StoreAction::SaveItem(samosa.clone())).await?;

        let snapshot = store.fetch().await?;
        assert_eq!(snapshot.items, vec![samosa]);
        Ok(())
    }

    #[tokio::test]
    async fn test_consumption_batch_insert_and_delete() -> Result<()> {
        let store = setup_test_store().await?;
        let ts = local_noon(2024, 3, 4);
        let records = vec![
            drink("c1", "e1", "tea", 10, 1, ts),
            snack("c2", "e1", "samosa", 15, 2, ts),
            snack("c3", "e2", "biscuit", 5, 1, ts),
        ];

        store
            .apply(&StoreAction::AddConsumptionBatch(records.clone()))
            .await?;
        assert_eq!(store.fetch().await?.consumption.len(), 3);

        store
            .apply(&StoreAction::DeleteConsumption { id: "c1".to_string() })
            .await?;
        store
            .apply(&StoreAction::DeleteConsumptionBatch {
                ids: vec!["c3".to_string(), "missing".to_string()],
            })
            .await?;

        let remaining = store.fetch().await?.consumption;
        assert_eq!(remaining, vec![records[1].clone()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_adjustments_replaces_whole_table() -> Result<()> {
        let store = setup_test_store().await?;
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();

        let mut first = AdjustmentTable::new();
        first.set(day, "e1", "samosa", 2);
        first.set_entry(day, "e2", EmployeeAdjustment::Units(1));
        store.apply(&StoreAction::SaveAdjustments(first.clone())).await?;
        assert_eq!(store.fetch().await?.daily_adjustments, first);

        let mut second = AdjustmentTable::new();
        second.set(day, "e3", "biscuit", 1);
        store.apply(&StoreAction::SaveAdjustments(second.clone())).await?;
        assert_eq!(store.fetch().await?.daily_adjustments, second);
        Ok(())
    }
}
