//! Daily tally and gap-fill calculator.
//!
//! The company is billed for drinks per head. When fewer staff took a drink
//! than are active, employees who only had snacks, or who had more than one
//! snack, can be counted as fillers toward the target headcount.
//!
//! The manual adjustment table governs the real bill; this calculator stays
//! an independent advisory figure shown next to it.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{ConsumptionRecord, EmployeeId, ItemType};

/// Default per-head drink rate used for the advisory company cost.
pub const DEFAULT_DRINK_UNIT_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 0);

/// Outcome of a single day's tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyResult {
    /// Distinct employees with at least one drink unit
    pub actual_drink_count: usize,
    /// Drink count after gap filling; exceeds the headcount only when more
    /// staff drank than are active
    pub adjusted_drink_count: usize,
    /// How many heads were filled
    pub gap_filled: usize,
    /// Employees with snacks and no drinks, sorted by id
    pub snack_only_consumer_ids: Vec<EmployeeId>,
    /// Employees with more than one snack unit, sorted by id
    pub extra_snack_consumer_ids: Vec<EmployeeId>,
    /// `adjusted_drink_count × drink_unit_rate`
    pub company_cost: Decimal,
}

impl TallyResult {
    /// Distinct employees qualifying as fillers. An employee on both lists
    /// is one filler.
    #[must_use]
    pub fn available_fillers(&self) -> usize {
        self.snack_only_consumer_ids
            .iter()
            .chain(&self.extra_snack_consumer_ids)
            .collect::<BTreeSet<_>>()
            .len()
    }
}

/// Tally calculator bound to a drink rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TallyCalculator {
    drink_unit_rate: Decimal,
}

impl Default for TallyCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_DRINK_UNIT_RATE)
    }
}

impl TallyCalculator {
    /// Creates a calculator charging `drink_unit_rate` per counted head.
    #[must_use]
    pub const fn new(drink_unit_rate: Decimal) -> Self {
        Self { drink_unit_rate }
    }

    /// Rate charged per counted head
    #[must_use]
    pub const fn drink_unit_rate(&self) -> Decimal {
        self.drink_unit_rate
    }

    /// Computes the tally for one day's records.
    ///
    /// Records are expected to belong to a single day; nothing here checks
    /// dates. Quantities are summed, so a record of quantity 2 is two units.
    #[must_use]
    pub fn compute<'a, I>(&self, day_records: I, active_headcount: usize) -> TallyResult
    where
        I: IntoIterator<Item = &'a ConsumptionRecord>,
    {
        #[derive(Default)]
        struct Counts {
            drinks: u64,
            snacks: u64,
        }

        let mut per_employee: BTreeMap<&str, Counts> = BTreeMap::new();
        for record in day_records {
            let counts = per_employee.entry(record.employee_id.as_str()).or_default();
            let units = u64::from(record.quantity);
            match record.item_type {
                ItemType::Drink => counts.drinks = counts.drinks.saturating_add(units),
                ItemType::Snack => counts.snacks = counts.snacks.saturating_add(units),
            }
        }

        let actual_drink_count = per_employee.values().filter(|c| c.drinks > 0).count();
        let snack_only_consumer_ids: Vec<EmployeeId> = per_employee
            .iter()
            .filter(|(_, c)| c.snacks > 0 && c.drinks == 0)
            .map(|(id, _)| (*id).to_string())
            .collect();
        let extra_snack_consumer_ids: Vec<EmployeeId> = per_employee
            .iter()
            .filter(|(_, c)| c.snacks > 1)
            .map(|(id, _)| (*id).to_string())
            .collect();

        let mut result = TallyResult {
            actual_drink_count,
            adjusted_drink_count: actual_drink_count,
            gap_filled: 0,
            snack_only_consumer_ids,
            extra_snack_consumer_ids,
            company_cost: Decimal::ZERO,
        };

        let gap = active_headcount.saturating_sub(actual_drink_count);
        result.gap_filled = gap.min(result.available_fillers());
        result.adjusted_drink_count = actual_drink_count + result.gap_filled;
        result.company_cost = Decimal::from(result.adjusted_drink_count)
            .checked_mul(self.drink_unit_rate)
            .unwrap_or(Decimal::ZERO);
        result
    }
}

/// Computes a day's tally at [`DEFAULT_DRINK_UNIT_RATE`].
#[must_use]
pub fn compute_tally<'a, I>(day_records: I, active_headcount: usize) -> TallyResult
where
    I: IntoIterator<Item = &'a ConsumptionRecord>,
{
    TallyCalculator::default().compute(day_records, active_headcount)
}
