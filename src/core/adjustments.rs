//! Manual adjustment table - moves snack units from an employee's bill onto
//! the company's bill for a given day.
//!
//! Two wire shapes exist for a single employee's entry on a day:
//!
//! ```json
//! { "2024-03-04": { "emp-1": 2 } }                      // legacy flat count
//! { "2024-03-04": { "emp-1": { "samosa": 1, "chips": 1 } } } // per item
//! ```
//!
//! Both decode into [`EmployeeAdjustment`]. Legacy counts are turned into
//! per-item counts by [`AdjustmentTable::migrate_legacy`] once the consumption
//! log is known, deducting the most expensive snack units first. The engine
//! calls [`EmployeeAdjustment::resolve`] as the single place that looks at
//! the variant.

use std::collections::BTreeMap;

use chrono::{NaiveDate, TimeZone};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::{
    core::{
        billing::day_of,
        units::{self, UnitRun},
    },
    errors::{Error, Result},
    models::{ConsumptionRecord, EmployeeId, ItemId, ItemType},
};

/// One employee's adjustment for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EmployeeAdjustment {
    /// Legacy format: this many snack units of any item
    Units(u32),
    /// This many units per item
    Items(BTreeMap<ItemId, u32>),
}

impl EmployeeAdjustment {
    /// Decodes a wire value. Numbers and numeric strings are flat counts,
    /// objects are per-item maps. Anything else is ignored.
    #[must_use]
    pub fn from_wire(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) => {
                let items = map
                    .iter()
                    .map(|(item, count)| (item.trim().to_string(), coerce_count(count)))
                    .filter(|(_, count)| *count > 0)
                    .collect();
                Some(Self::Items(items))
            }
            Value::Number(_) | Value::String(_) => Some(Self::Units(coerce_count(value))),
            _ => None,
        }
    }

    /// Units requested for `item_id`. Legacy counts are not item specific
    /// and report zero here.
    #[must_use]
    pub fn requested_for(&self, item_id: &str) -> u32 {
        match self {
            Self::Units(_) => 0,
            Self::Items(items) => items.get(item_id).copied().unwrap_or(0),
        }
    }

    /// Total units requested across all items
    #[must_use]
    pub fn requested_total(&self) -> u32 {
        match self {
            Self::Units(count) => *count,
            Self::Items(items) => items
                .values()
                .fold(0, |total, count| total.saturating_add(*count)),
        }
    }

    /// Turns this adjustment into clamped per-item deduction counts against
    /// the snack runs the employee actually consumed that day.
    ///
    /// The result never exceeds the units consumed of any item. Legacy flat
    /// counts take the most expensive units first.
    #[must_use]
    pub fn resolve(&self, snack_runs: &[UnitRun<'_>]) -> BTreeMap<ItemId, u64> {
        match self {
            Self::Items(requested) => units::count_by_item(snack_runs)
                .into_iter()
                .filter_map(|(item, available)| {
                    let wanted = requested.get(item).copied().map_or(0, u64::from);
                    let count = clamp_count(wanted, available);
                    (count > 0).then(|| (item.to_string(), count))
                })
                .collect(),
            Self::Units(requested) => {
                units::take_most_expensive(snack_runs, u64::from(*requested))
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.requested_total() == 0
    }
}

/// Clamps a requested deduction into `[0, consumed]`.
#[inline]
#[must_use]
pub const fn clamp_count(requested: u64, consumed: u64) -> u64 {
    if requested < consumed { requested } else { consumed }
}

/// Counts may arrive as numbers, numeric strings or garbage. Negative,
/// fractional-below-one and unparseable values become zero.
fn coerce_count(value: &Value) -> u32 {
    let raw = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if raw.is_finite() && raw > 0.0 {
        // Counts are small whole numbers; clamp before the cast.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = raw.min(f64::from(u32::MAX)).floor() as u32;
        count
    } else {
        0
    }
}

/// Sparse `date → employee → adjustment` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AdjustmentTable {
    days: BTreeMap<NaiveDate, BTreeMap<EmployeeId, EmployeeAdjustment>>,
}

impl AdjustmentTable {
    /// An empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the `dailyAdjustments` payload.
    ///
    /// `null` decodes to an empty table. Any other non-object payload is
    /// rejected. Inside an object, entries with unparseable dates or
    /// unrecognised shapes are dropped with a warning.
    pub fn from_json(value: &Value) -> Result<Self> {
        let days = match value {
            Value::Null => return Ok(Self::new()),
            Value::Object(days) => days,
            other => {
                return Err(Error::InvalidAdjustments {
                    message: format!("expected an object, got {}", json_kind(other)),
                });
            }
        };

        let mut table = Self::new();
        for (raw_date, employees) in days {
            let Ok(date) = NaiveDate::parse_from_str(raw_date.trim(), "%Y-%m-%d") else {
                warn!("Dropping adjustments for unparseable date {raw_date:?}");
                continue;
            };
            let Value::Object(employees) = employees else {
                warn!("Dropping adjustments for {date}: expected an object");
                continue;
            };
            for (employee_id, raw) in employees {
                match EmployeeAdjustment::from_wire(raw) {
                    Some(adjustment) if !adjustment.is_empty() => {
                        table
                            .days
                            .entry(date)
                            .or_default()
                            .insert(employee_id.trim().to_string(), adjustment);
                    }
                    Some(_) => {}
                    None => warn!("Dropping adjustment for {employee_id} on {date}: bad shape"),
                }
            }
        }
        Ok(table)
    }

    /// Adjustment for an employee on a day, if any
    #[must_use]
    pub fn get(&self, date: NaiveDate, employee_id: &str) -> Option<&EmployeeAdjustment> {
        self.days.get(&date).and_then(|day| day.get(employee_id))
    }

    /// Requested units for an employee, item and day. Missing entries are zero.
    #[must_use]
    pub fn requested(&self, date: NaiveDate, employee_id: &str, item_id: &str) -> u32 {
        self.get(date, employee_id)
            .map_or(0, |adjustment| adjustment.requested_for(item_id))
    }

    /// Sets the per-item count for an employee on a day. A zero count removes
    /// the item. A legacy flat entry is replaced by a per-item entry.
    pub fn set(&mut self, date: NaiveDate, employee_id: &str, item_id: &str, count: u32) {
        let day = self.days.entry(date).or_default();
        let entry = day
            .entry(employee_id.to_string())
            .or_insert_with(|| EmployeeAdjustment::Items(BTreeMap::new()));
        if let EmployeeAdjustment::Units(_) = entry {
            *entry = EmployeeAdjustment::Items(BTreeMap::new());
        }
        if let EmployeeAdjustment::Items(items) = entry {
            if count == 0 {
                items.remove(item_id);
            } else {
                items.insert(item_id.to_string(), count);
            }
        }
        self.prune(date);
    }

    /// Replaces an employee's whole entry for a day.
    pub fn set_entry(
        &mut self,
        date: NaiveDate,
        employee_id: &str,
        adjustment: EmployeeAdjustment,
    ) {
        self.days
            .entry(date)
            .or_default()
            .insert(employee_id.to_string(), adjustment);
        self.prune(date);
    }

    /// Removes an employee's entry for a day.
    pub fn clear(&mut self, date: NaiveDate, employee_id: &str) {
        if let Some(day) = self.days.get_mut(&date) {
            day.remove(employee_id);
        }
        self.prune(date);
    }

    /// True if no adjustments are recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Iterates `(date, employee, adjustment)` in date then employee order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &str, &EmployeeAdjustment)> {
        self.days.iter().flat_map(|(date, employees)| {
            employees
                .iter()
                .map(move |(employee, adjustment)| (*date, employee.as_str(), adjustment))
        })
    }

    /// Rewrites legacy flat counts as per-item counts, resolved against the
    /// snack units each employee consumed that day (day taken in `tz`).
    /// Returns the number of entries rewritten.
    pub fn migrate_legacy<Tz: TimeZone>(
        &mut self,
        consumption: &[ConsumptionRecord],
        tz: &Tz,
    ) -> usize {
        let mut migrated = 0;
        for (date, employees) in &mut self.days {
            for (employee_id, adjustment) in employees.iter_mut() {
                if !matches!(adjustment, EmployeeAdjustment::Units(_)) {
                    continue;
                }
                let snack_runs: Vec<UnitRun<'_>> = units::expand_all(consumption.iter().filter(
                    |r| {
                        r.employee_id == *employee_id
                            && r.item_type == ItemType::Snack
                            && day_of(r, tz) == *date
                    },
                ))
                .collect();
                let items = adjustment
                    .resolve(&snack_runs)
                    .into_iter()
                    .map(|(item, count)| (item, u32::try_from(count).unwrap_or(u32::MAX)))
                    .collect();
                *adjustment = EmployeeAdjustment::Items(items);
                migrated += 1;
            }
        }
        let dates: Vec<NaiveDate> = self.days.keys().copied().collect();
        for date in dates {
            self.prune(date);
        }
        migrated
    }

    fn prune(&mut self, date: NaiveDate) {
        if let Some(day) = self.days.get_mut(&date) {
            day.retain(|_, adjustment| !adjustment.is_empty());
            if day.is_empty() {
                self.days.remove(&date);
            }
        }
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use chrono::Local;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_from_json_null_is_empty() {
        let table = AdjustmentTable::from_json(&Value::Null).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        let result = AdjustmentTable::from_json(&json!([1, 2, 3]));
        assert!(matches!(result, Err(Error::InvalidAdjustments { .. })));
    }

    #[test]
    fn test_from_json_reads_both_shapes() {
        let table = AdjustmentTable::from_json(&json!({
            "2024-03-04": { "e1": 2, "e2": { "samosa": 1, "chips": "2" } },
            "not-a-date": { "e3": 1 },
        }))
        .unwrap();

        let day = date(2024, 3, 4);
        assert_eq!(table.get(day, "e1"), Some(&EmployeeAdjustment::Units(2)));
        assert_eq!(table.requested(day, "e2", "chips"), 2);
        assert_eq!(table.requested(day, "e2", "samosa"), 1);
        assert_eq!(table.requested(day, "e3", "samosa"), 0);
        assert_eq!(table.iter().count(), 2);
    }

    #[test]
    fn test_from_json_coerces_bad_counts_to_zero() {
        let table = AdjustmentTable::from_json(&json!({
            "2024-03-04": { "e1": -3, "e2": { "samosa": "lots" } },
        }))
        .unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_resolve_items_clamps_to_consumed() {
        let day = local_noon(2024, 3, 4);
        let records = [snack("r1", "e1", "samosa", 10, 2, day)];
        let runs: Vec<_> = units::expand_all(&records).collect();

        let adjustment = EmployeeAdjustment::Items(BTreeMap::from([
            ("samosa".to_string(), 5),
            ("chips".to_string(), 1),
        ]));
        let resolved = adjustment.resolve(&runs);

        assert_eq!(resolved.get("samosa"), Some(&2));
        assert_eq!(resolved.get("chips"), None);
    }

    #[test]
    fn test_resolve_units_takes_most_expensive_first() {
        let day = local_noon(2024, 3, 4);
        let records = [
            snack("r1", "e1", "biscuit", 5, 2, day),
            snack("r2", "e1", "samosa", 15, 1, day),
            snack("r3", "e1", "chips", 10, 1, day),
        ];
        let runs: Vec<_> = units::expand_all(&records).collect();

        let resolved = EmployeeAdjustment::Units(2).resolve(&runs);
        assert_eq!(resolved.get("samosa"), Some(&1));
        assert_eq!(resolved.get("chips"), Some(&1));
        assert_eq!(resolved.get("biscuit"), None);

        let everything = EmployeeAdjustment::Units(99).resolve(&runs);
        assert_eq!(everything.values().sum::<u64>(), 4);
    }

    #[test]
    fn test_set_replaces_legacy_and_prunes_zero() {
        let day = date(2024, 3, 4);
        let mut table = AdjustmentTable::new();
        table.set_entry(day, "e1", EmployeeAdjustment::Units(3));

        table.set(day, "e1", "samosa", 1);
        assert_eq!(table.requested(day, "e1", "samosa"), 1);
        assert_eq!(table.get(day, "e1").unwrap().requested_total(), 1);

        table.set(day, "e1", "samosa", 0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_migrate_legacy_resolves_against_consumption() {
        let ts = local_noon(2024, 3, 4);
        let records = vec![
            snack("r1", "e1", "biscuit", 5, 1, ts),
            snack("r2", "e1", "samosa", 15, 1, ts),
        ];
        let mut table = AdjustmentTable::new();
        table.set_entry(date(2024, 3, 4), "e1", EmployeeAdjustment::Units(1));
        table.set_entry(date(2024, 3, 5), "e1", EmployeeAdjustment::Units(2));

        let migrated = table.migrate_legacy(&records, &Local);

        assert_eq!(migrated, 2);
        assert_eq!(table.requested(date(2024, 3, 4), "e1", "samosa"), 1);
        assert_eq!(table.requested(date(2024, 3, 4), "e1", "biscuit"), 0);
        // Nothing consumed on the 5th, so the stale entry is dropped.
        assert!(table.get(date(2024, 3, 5), "e1").is_none());
    }

    #[test]
    fn test_serializes_as_nested_map() {
        let mut table = AdjustmentTable::new();
        table.set(date(2024, 3, 4), "e1", "samosa", 2);
        let value = serde_json::to_value(&table).unwrap();
        assert_eq!(value, json!({ "2024-03-04": { "e1": { "samosa": 2 } } }));
    }
}
