//! Lazy quantity expansion.
//!
//! A record of quantity N is stored and displayed once, but the allocation
//! logic works per unit. Instead of yielding N separate lines, a record is
//! viewed as one [`UnitRun`]: N identical units sharing a price. Allocation
//! takes whole prefixes of runs, so the work grows with the number of
//! records, not with their quantities.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::models::{ConsumptionRecord, ItemId, ItemType, line_amount};

/// `count` identical units of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitRun<'a> {
    /// Record the units belong to
    pub record: &'a ConsumptionRecord,
    /// Units in the run
    pub count: u64,
}

impl UnitRun<'_> {
    /// Price of a single unit
    #[must_use]
    pub const fn unit_price(&self) -> Decimal {
        self.record.unit_price
    }

    /// Item id of the units
    #[must_use]
    pub fn item_id(&self) -> &str {
        &self.record.item_id
    }

    /// Ledger the units default into
    #[must_use]
    pub const fn item_type(&self) -> ItemType {
        self.record.item_type
    }

    /// Value of the whole run, zero if it does not fit a `Decimal`
    #[must_use]
    pub fn amount(&self) -> Decimal {
        line_amount(self.unit_price(), self.count)
    }
}

/// The run covering every unit of `record`, or `None` for quantity zero.
#[must_use]
pub fn expand(record: &ConsumptionRecord) -> Option<UnitRun<'_>> {
    (record.quantity > 0).then(|| UnitRun {
        record,
        count: u64::from(record.quantity),
    })
}

/// Runs for every record, in record order.
pub fn expand_all<'a, I>(records: I) -> impl Iterator<Item = UnitRun<'a>>
where
    I: IntoIterator<Item = &'a ConsumptionRecord>,
{
    records.into_iter().filter_map(expand)
}

/// Orders runs most expensive first. Ties keep record order.
pub fn sort_most_expensive_first(runs: &mut [UnitRun<'_>]) {
    runs.sort_by(|a, b| b.unit_price().cmp(&a.unit_price()));
}

/// Units available per item across `runs`.
#[must_use]
pub fn count_by_item<'a>(runs: &[UnitRun<'a>]) -> BTreeMap<&'a str, u64> {
    let mut consumed: BTreeMap<&str, u64> = BTreeMap::new();
    for run in runs {
        let total = consumed.entry(run.record.item_id.as_str()).or_default();
        *total = total.saturating_add(run.count);
    }
    consumed
}

/// Takes up to `wanted` units from the most expensive runs and reports how
/// many were taken per item.
#[must_use]
pub fn take_most_expensive(runs: &[UnitRun<'_>], wanted: u64) -> BTreeMap<ItemId, u64> {
    let mut ordered = runs.to_vec();
    sort_most_expensive_first(&mut ordered);

    let mut left = wanted;
    let mut taken: BTreeMap<ItemId, u64> = BTreeMap::new();
    for run in ordered {
        if left == 0 {
            break;
        }
        let take = left.min(run.count);
        let total = taken.entry(run.item_id().to_string()).or_default();
        *total = total.saturating_add(take);
        left -= take;
    }
    taken
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_expand_covers_whole_quantity() {
        let record = snack("r1", "e1", "biscuit", 5, 3, local_noon(2024, 3, 4));
        let run = expand(&record).unwrap();

        assert_eq!(run.count, 3);
        assert_eq!(run.amount(), Decimal::from(15));
    }

    #[test]
    fn test_expand_zero_quantity_yields_nothing() {
        let mut record = snack("r1", "e1", "biscuit", 5, 1, local_noon(2024, 3, 4));
        record.quantity = 0;
        assert!(expand(&record).is_none());
    }

    #[test]
    fn test_sort_most_expensive_first_is_stable() {
        let day = local_noon(2024, 3, 4);
        let records = [
            snack("r1", "e1", "biscuit", 5, 1, day),
            snack("r2", "e1", "samosa", 15, 1, day),
            snack("r3", "e1", "cookie", 5, 1, day),
        ];
        let mut runs: Vec<_> = expand_all(&records).collect();
        sort_most_expensive_first(&mut runs);

        let order: Vec<&str> = runs.iter().map(|r| r.item_id()).collect();
        assert_eq!(order, ["samosa", "biscuit", "cookie"]);
    }

    #[test]
    fn test_take_most_expensive_splits_a_run() {
        let day = local_noon(2024, 3, 4);
        let records = [
            snack("r1", "e1", "biscuit", 5, 4, day),
            snack("r2", "e1", "samosa", 15, 2, day),
        ];
        let runs: Vec<_> = expand_all(&records).collect();

        let taken = take_most_expensive(&runs, 3);
        assert_eq!(taken.get("samosa"), Some(&2));
        assert_eq!(taken.get("biscuit"), Some(&1));
        assert_eq!(take_most_expensive(&runs, 100).values().sum::<u64>(), 6);
    }

    #[test]
    fn test_huge_quantities_stay_one_run() {
        let day = local_noon(2024, 3, 4);
        let records = [
            snack("r1", "e1", "biscuit", 5, u32::MAX, day),
            snack("r2", "e1", "biscuit", 5, u32::MAX, day),
        ];
        let runs: Vec<_> = expand_all(&records).collect();

        assert_eq!(runs.len(), 2);
        assert_eq!(count_by_item(&runs)["biscuit"], 2 * u64::from(u32::MAX));
        assert_eq!(take_most_expensive(&runs, u64::MAX)["biscuit"], 2 * u64::from(u32::MAX));
    }
}
