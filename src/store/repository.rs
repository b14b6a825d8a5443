//! In-memory owner of the ledger snapshot.
//!
//! The repository loads everything once, serves reads synchronously from
//! that snapshot and applies every write locally before queueing it for the
//! backend. A single background task drains the queue in order. Failed
//! writes are logged and the local state is kept as-is.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{Local, NaiveDate};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    core::{
        adjustments::AdjustmentTable,
        billing::{self, BillingEngine, BillingResult},
        tally::{TallyCalculator, TallyResult},
    },
    errors::{Error, Result},
    models::{ConsumptionRecord, Employee, Item, ItemType, NewConsumption, Snapshot, UNKNOWN},
    store::{StoreAction, StoreBackend, fallback},
};

enum Pending {
    Write(StoreAction),
    Flush(oneshot::Sender<()>),
}

/// Snapshot owner with optimistic writes.
pub struct Repository {
    state: RwLock<Snapshot>,
    queue: mpsc::UnboundedSender<Pending>,
    tally: TallyCalculator,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("tally", &self.tally)
            .finish_non_exhaustive()
    }
}

async fn drain(backend: Arc<dyn StoreBackend>, mut queue: mpsc::UnboundedReceiver<Pending>) {
    while let Some(pending) = queue.recv().await {
        match pending {
            Pending::Write(action) => {
                if let Err(e) = backend.apply(&action).await {
                    error!(action = action.name(), "Store write failed: {e}");
                } else {
                    debug!(action = action.name(), "Store write applied");
                }
            }
            Pending::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

impl Repository {
    /// Fetches the snapshot from `backend` and starts the write worker.
    ///
    /// Any fetch error is logged and replaced by the built-in reference
    /// dataset. Legacy flat adjustments are rewritten per item on load and
    /// the rewritten table is queued for saving.
    ///
    /// Must be called from within a Tokio runtime.
    #[instrument(skip(backend, tally))]
    pub async fn load(backend: Arc<dyn StoreBackend>, tally: TallyCalculator) -> Self {
        let mut snapshot = match backend.fetch().await {
            Ok(snapshot) => {
                info!(
                    employees = snapshot.employees.len(),
                    items = snapshot.items.len(),
                    records = snapshot.consumption.len(),
                    "Loaded store snapshot"
                );
                snapshot
            }
            Err(e) => {
                warn!("Store unavailable, using reference data: {e}");
                fallback::reference_snapshot()
            }
        };

        let migrated = snapshot
            .daily_adjustments
            .migrate_legacy(&snapshot.consumption, &Local);

        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(drain(backend, receiver));

        let repository = Self {
            state: RwLock::new(snapshot),
            queue: sender,
            tally,
        };
        if migrated > 0 {
            info!("Migrated {migrated} legacy adjustment entries");
            let table = repository.read().daily_adjustments.clone();
            repository.enqueue(StoreAction::SaveAdjustments(table));
        }
        repository
    }

    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue(&self, action: StoreAction) {
        let name = action.name();
        if self.queue.send(Pending::Write(action)).is_err() {
            error!(action = name, "Write queue closed, change kept locally only");
        }
    }

    /// Waits until every write queued so far has been attempted.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.queue.send(Pending::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    // --- Reads ---

    /// Copy of the whole snapshot
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.read().clone()
    }

    /// All employees
    #[must_use]
    pub fn employees(&self) -> Vec<Employee> {
        self.read().employees.clone()
    }

    /// Employees currently on staff
    #[must_use]
    pub fn active_employees(&self) -> Vec<Employee> {
        self.read()
            .employees
            .iter()
            .filter(|e| e.is_active)
            .cloned()
            .collect()
    }

    /// Looks up one employee.
    pub fn employee(&self, id: &str) -> Result<Employee> {
        self.read()
            .employee(id)
            .cloned()
            .ok_or_else(|| Error::EmployeeNotFound { id: id.to_string() })
    }

    /// Looks up one item.
    pub fn item(&self, id: &str) -> Result<Item> {
        self.read()
            .item(id)
            .cloned()
            .ok_or_else(|| Error::ItemNotFound { id: id.to_string() })
    }

    /// Whole catalogue
    #[must_use]
    pub fn items(&self) -> Vec<Item> {
        self.read().items.clone()
    }

    /// Items that can still be recorded
    #[must_use]
    pub fn active_items(&self) -> Vec<Item> {
        self.read()
            .items
            .iter()
            .filter(|i| i.is_active)
            .cloned()
            .collect()
    }

    /// Consumption log
    #[must_use]
    pub fn consumption(&self) -> Vec<ConsumptionRecord> {
        self.read().consumption.clone()
    }

    /// Adjustment table
    #[must_use]
    pub fn adjustments(&self) -> AdjustmentTable {
        self.read().daily_adjustments.clone()
    }

    /// Number of active employees
    #[must_use]
    pub fn active_headcount(&self) -> usize {
        self.read().active_headcount()
    }

    // --- Engine ---

    /// Bills every local day in `from..=to`.
    #[must_use]
    pub fn bill(&self, from: NaiveDate, to: NaiveDate) -> BillingResult {
        let snapshot = self.read();
        let records = billing::records_in_range(&snapshot.consumption, from, to, &Local);
        BillingEngine::new(Local, self.tally).calculate(
            &records,
            &snapshot.employees,
            snapshot.active_headcount(),
            &snapshot.daily_adjustments,
        )
    }

    /// Tally for one local day.
    #[must_use]
    pub fn tally(&self, date: NaiveDate) -> TallyResult {
        let snapshot = self.read();
        let day = snapshot
            .consumption
            .iter()
            .filter(|record| billing::day_of(record, &Local) == date);
        self.tally.compute(day, snapshot.active_headcount())
    }

    // --- Writes ---

    /// Builds a record from `entry`, copying the item's name, type and
    /// price as they are right now.
    fn build_record(snapshot: &Snapshot, entry: NewConsumption) -> Result<ConsumptionRecord> {
        if entry.quantity == 0 {
            return Err(Error::InvalidQuantity {
                quantity: entry.quantity,
            });
        }
        if snapshot.employee(&entry.employee_id).is_none() {
            warn!("Recording consumption for unknown employee {}", entry.employee_id);
        }
        let (item_name, item_type, unit_price) = match snapshot.item(&entry.item_id) {
            Some(item) => (item.name.clone(), item.item_type, item.unit_price),
            None => {
                warn!("Recording consumption of unknown item {}", entry.item_id);
                (UNKNOWN.to_string(), ItemType::Snack, rust_decimal::Decimal::ZERO)
            }
        };
        Ok(ConsumptionRecord {
            id: Uuid::new_v4().to_string(),
            employee_id: entry.employee_id,
            item_id: entry.item_id,
            item_name,
            item_type,
            unit_price,
            timestamp: entry.timestamp,
            quantity: entry.quantity,
        })
    }

    fn build_records(
        snapshot: &Snapshot,
        entries: Vec<NewConsumption>,
    ) -> Result<Vec<ConsumptionRecord>> {
        entries
            .into_iter()
            .map(|entry| Self::build_record(snapshot, entry))
            .collect()
    }

    /// Records one consumption.
    pub fn add_consumption(&self, entry: NewConsumption) -> Result<ConsumptionRecord> {
        let record = {
            let mut snapshot = self.write();
            let record = Self::build_record(&snapshot, entry)?;
            snapshot.consumption.push(record.clone());
            record
        };
        self.enqueue(StoreAction::AddConsumption(record.clone()));
        Ok(record)
    }

    /// Records several consumptions as one write. Nothing is recorded if any
    /// entry is invalid.
    pub fn add_consumption_batch(
        &self,
        entries: Vec<NewConsumption>,
    ) -> Result<Vec<ConsumptionRecord>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        let records = {
            let mut snapshot = self.write();
            let records = Self::build_records(&snapshot, entries)?;
            snapshot.consumption.extend(records.iter().cloned());
            records
        };
        self.enqueue(StoreAction::AddConsumptionBatch(records.clone()));
        Ok(records)
    }

    /// Removes one record.
    pub fn delete_consumption(&self, id: &str) -> Result<()> {
        {
            let mut snapshot = self.write();
            let position = snapshot
                .consumption
                .iter()
                .position(|record| record.id == id)
                .ok_or_else(|| Error::ConsumptionNotFound { id: id.to_string() })?;
            snapshot.consumption.remove(position);
        }
        self.enqueue(StoreAction::DeleteConsumption { id: id.to_string() });
        Ok(())
    }

    /// Removes every record whose id is in `ids`. Returns how many were
    /// found locally.
    pub fn delete_consumption_batch(&self, ids: &[String]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let removed = {
            let mut snapshot = self.write();
            let before = snapshot.consumption.len();
            snapshot.consumption.retain(|record| !ids.contains(&record.id));
            before - snapshot.consumption.len()
        };
        self.enqueue(StoreAction::DeleteConsumptionBatch { ids: ids.to_vec() });
        removed
    }

    /// Replaces a batch: deletes `old_ids`, then records `entries` under
    /// fresh ids.
    pub fn replace_consumption_batch(
        &self,
        old_ids: &[String],
        entries: Vec<NewConsumption>,
    ) -> Result<Vec<ConsumptionRecord>> {
        let records = Self::build_records(&self.read(), entries)?;
        self.delete_consumption_batch(old_ids);
        if records.is_empty() {
            return Ok(records);
        }
        self.write().consumption.extend(records.iter().cloned());
        self.enqueue(StoreAction::AddConsumptionBatch(records.clone()));
        Ok(records)
    }

    /// Sets how many of an employee's units of `item_id` on `date` move to
    /// the company. Zero clears the item.
    pub fn set_adjustment(&self, date: NaiveDate, employee_id: &str, item_id: &str, count: u32) {
        let table = {
            let mut snapshot = self.write();
            snapshot
                .daily_adjustments
                .set(date, employee_id, item_id, count);
            snapshot.daily_adjustments.clone()
        };
        self.enqueue(StoreAction::SaveAdjustments(table));
    }

    /// Replaces the whole adjustment table.
    pub fn save_adjustments(&self, table: AdjustmentTable) {
        self.write().daily_adjustments = table.clone();
        self.enqueue(StoreAction::SaveAdjustments(table));
    }

    /// Inserts or replaces an employee.
    pub fn save_employee(&self, employee: Employee) {
        {
            let mut snapshot = self.write();
            match snapshot.employees.iter_mut().find(|e| e.id == employee.id) {
                Some(existing) => *existing = employee.clone(),
                None => snapshot.employees.push(employee.clone()),
            }
        }
        self.enqueue(StoreAction::SaveEmployee(employee));
    }

    /// Inserts or replaces an item. Past records keep the price they were
    /// recorded at.
    pub fn save_item(&self, item: Item) {
        {
            let mut snapshot = self.write();
            match snapshot.items.iter_mut().find(|i| i.id == item.id) {
                Some(existing) => *existing = item.clone(),
                None => snapshot.items.push(item.clone()),
            }
        }
        self.enqueue(StoreAction::SaveItem(item));
    }
}
