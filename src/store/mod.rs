//! Storage layer - everything that moves snapshots in and out of the engine.
//!
//! A [`StoreBackend`] serves a whole [`Snapshot`] on fetch and accepts
//! [`StoreAction`]s one at a time. Backends are dumb: the [`Repository`]
//! owns the in-memory state, applies writes optimistically and forwards them
//! in the background.
//!
//! [`Repository`]: repository::Repository

/// Built-in reference data and the offline backend
pub mod fallback;
/// Tolerant decoding of store payloads
pub mod payload;
/// HTTP backend for the remote endpoint
pub mod remote;
/// Snapshot owner with optimistic writes
pub mod repository;
/// Local `SQLite` backend
pub mod sqlite;

use async_trait::async_trait;
use serde::Serialize;

use crate::{
    core::adjustments::AdjustmentTable,
    errors::Result,
    models::{ConsumptionRecord, Employee, Item, Snapshot},
};

/// A write sent to the store. Serializes as `{"action": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum StoreAction {
    /// Append one record
    AddConsumption(ConsumptionRecord),
    /// Append several records
    AddConsumptionBatch(Vec<ConsumptionRecord>),
    /// Remove one record
    DeleteConsumption {
        /// Record id
        id: String,
    },
    /// Remove several records
    DeleteConsumptionBatch {
        /// Record ids
        ids: Vec<String>,
    },
    /// Replace the whole adjustment table
    SaveAdjustments(AdjustmentTable),
    /// Insert or replace an employee
    SaveEmployee(Employee),
    /// Insert or replace an item
    SaveItem(Item),
}

impl StoreAction {
    /// Wire name of the action
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AddConsumption(_) => "add_consumption",
            Self::AddConsumptionBatch(_) => "add_consumption_batch",
            Self::DeleteConsumption { .. } => "delete_consumption",
            Self::DeleteConsumptionBatch { .. } => "delete_consumption_batch",
            Self::SaveAdjustments(_) => "save_adjustments",
            Self::SaveEmployee(_) => "save_employee",
            Self::SaveItem(_) => "save_item",
        }
    }
}

/// Somewhere snapshots are loaded from and writes are sent to.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Loads everything the store holds.
    async fn fetch(&self) -> Result<Snapshot>;

    /// Applies one write. Callers treat failures as log-only.
    async fn apply(&self, action: &StoreAction) -> Result<()>;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_wire_format() {
        let action = StoreAction::DeleteConsumptionBatch {
            ids: vec!["a".to_string(), "b".to_string()],
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(
            value,
            json!({ "action": "delete_consumption_batch", "data": { "ids": ["a", "b"] } })
        );
        assert_eq!(action.name(), "delete_consumption_batch");
    }

    #[test]
    fn test_save_employee_wire_format() {
        let action = StoreAction::SaveEmployee(Employee {
            id: "e1".to_string(),
            name: "Asha".to_string(),
            is_active: true,
        });
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(
            value,
            json!({
                "action": "save_employee",
                "data": { "id": "e1", "name": "Asha", "isActive": true },
            })
        );
    }
}
