//! Shared test utilities for `tea-ledger`.
//!
//! Builders for records, employees and items with sensible defaults, plus
//! an in-memory `SQLite` store and a scripted backend for repository tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::{
    errors::{Error, Result},
    models::{ConsumptionRecord, Employee, Item, ItemType, Snapshot},
    store::{StoreAction, StoreBackend, sqlite::SqliteStore},
};

/// Local noon on the given day, as UTC. Noon keeps the local calendar day
/// stable whatever timezone the tests run in.
pub fn local_noon(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Local
        .with_ymd_and_hms(year, month, day, 12, 0, 0)
        .earliest()
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_default()
}

/// Creates a consumption record with a decimal price.
pub fn record(
    id: &str,
    employee_id: &str,
    item_id: &str,
    item_type: ItemType,
    unit_price: Decimal,
    quantity: u32,
    timestamp: DateTime<Utc>,
) -> ConsumptionRecord {
    ConsumptionRecord {
        id: id.to_string(),
        employee_id: employee_id.to_string(),
        item_id: item_id.to_string(),
        item_name: item_id.to_string(),
        item_type,
        unit_price,
        timestamp,
        quantity,
    }
}

/// Drink record priced in whole currency units.
pub fn drink(
    id: &str,
    employee_id: &str,
    item_id: &str,
    price: i64,
    quantity: u32,
    timestamp: DateTime<Utc>,
) -> ConsumptionRecord {
    record(id, employee_id, item_id, ItemType::Drink, Decimal::from(price), quantity, timestamp)
}

/// Snack record priced in whole currency units.
pub fn snack(
    id: &str,
    employee_id: &str,
    item_id: &str,
    price: i64,
    quantity: u32,
    timestamp: DateTime<Utc>,
) -> ConsumptionRecord {
    snack_priced(id, employee_id, item_id, Decimal::from(price), quantity, timestamp)
}

/// Snack record with an exact decimal price.
pub fn snack_priced(
    id: &str,
    employee_id: &str,
    item_id: &str,
    price: Decimal,
    quantity: u32,
    timestamp: DateTime<Utc>,
) -> ConsumptionRecord {
    record(id, employee_id, item_id, ItemType::Snack, price, quantity, timestamp)
}

/// Creates an employee.
pub fn employee(id: &str, name: &str, is_active: bool) -> Employee {
    Employee {
        id: id.to_string(),
        name: name.to_string(),
        is_active,
    }
}

/// Creates an active item.
pub fn item(id: &str, name: &str, price: i64, item_type: ItemType) -> Item {
    Item {
        id: id.to_string(),
        name: name.to_string(),
        unit_price: Decimal::from(price),
        item_type,
        is_active: true,
    }
}

/// Two active employees, one inactive, a tea and two snacks.
pub fn sample_snapshot() -> Snapshot {
    Snapshot {
        employees: vec![
            employee("e1", "Asha", true),
            employee("e2", "Ravi", true),
            employee("e3", "Meera", false),
        ],
        items: vec![
            item("tea", "Masala Tea", 10, ItemType::Drink),
            item("samosa", "Samosa", 15, ItemType::Snack),
            item("biscuit", "Biscuit", 5, ItemType::Snack),
        ],
        ..Snapshot::default()
    }
}

/// Creates an in-memory `SQLite` store with all tables initialized.
pub async fn setup_test_store() -> Result<SqliteStore> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(SqliteStore::new(db))
}

/// Backend that serves a fixed snapshot and records every write it gets.
/// Writes fail while `fail_writes` is set; fetches fail when no snapshot is
/// configured.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    /// Snapshot returned by `fetch`
    pub snapshot: Option<Snapshot>,
    /// Reject every write
    pub fail_writes: bool,
    /// Writes received, in order
    pub applied: Mutex<Vec<StoreAction>>,
}

impl ScriptedBackend {
    /// Backend serving `snapshot`
    pub fn serving(snapshot: Snapshot) -> Arc<Self> {
        Arc::new(Self {
            snapshot: Some(snapshot),
            ..Self::default()
        })
    }

    /// Actions received so far
    pub fn applied(&self) -> Vec<StoreAction> {
        self.applied
            .lock()
            .map(|applied| applied.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StoreBackend for ScriptedBackend {
    async fn fetch(&self) -> Result<Snapshot> {
        self.snapshot.clone().ok_or_else(|| Error::Config {
            message: "store unreachable".to_string(),
        })
    }

    async fn apply(&self, action: &StoreAction) -> Result<()> {
        if let Ok(mut applied) = self.applied.lock() {
            applied.push(action.clone());
        }
        if self.fail_writes {
            return Err(Error::Config {
                message: "write rejected".to_string(),
            });
        }
        Ok(())
    }
}
