//! Billing reconciliation engine.
//!
//! Splits a set of consumption records into a per-day company ledger and a
//! per-employee ledger. Drinks go to the company. Snacks go to the employee
//! unless the adjustment table moves some of that day's units onto the
//! company. The two ledgers partition the same units, so
//! `grand_total + employee_total` always equals the sum of
//! `unit_price × quantity` over the input. An amount too large for a
//! `Decimal` counts as zero.
//!
//! Everything here is pure: same inputs, same output, no I/O, no logging.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Local, NaiveDate, TimeZone};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    core::{
        adjustments::AdjustmentTable,
        tally::{TallyCalculator, TallyResult},
        units::{self, UnitRun},
    },
    models::{
        ConsumptionRecord, Employee, EmployeeId, ItemId, ItemType, UNKNOWN, add_amount,
        line_amount,
    },
};

/// Calendar day of a record's timestamp in `tz`.
#[must_use]
pub fn day_of<Tz: TimeZone>(record: &ConsumptionRecord, tz: &Tz) -> NaiveDate {
    record.timestamp.with_timezone(tz).date_naive()
}

/// Records whose day in `tz` falls inside `from..=to`, cloned in input order.
#[must_use]
pub fn records_in_range<Tz: TimeZone>(
    consumptions: &[ConsumptionRecord],
    from: NaiveDate,
    to: NaiveDate,
    tz: &Tz,
) -> Vec<ConsumptionRecord> {
    consumptions
        .iter()
        .filter(|record| (from..=to).contains(&day_of(record, tz)))
        .cloned()
        .collect()
}

/// Units of one item billed to the company on one day, per employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyLine {
    /// Who consumed
    pub employee_id: EmployeeId,
    /// Display name, or `Unknown`
    pub employee_name: String,
    /// Item consumed
    pub item_id: ItemId,
    /// Item name captured on the record
    pub item_name: String,
    /// Drink, or a snack moved by adjustment
    pub item_type: ItemType,
    /// Unit price
    pub unit_price: Decimal,
    /// Units on this line
    pub quantity: u64,
    /// `unit_price × quantity`
    pub amount: Decimal,
}

/// Company ledger for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCompanyBill {
    /// Calendar day
    pub date: NaiveDate,
    /// Distinct employees who took a drink
    pub drink_count: usize,
    /// Drink units billed
    pub drink_units: u64,
    /// Cost of drink units
    pub base_amount: Decimal,
    /// Snack units moved from employees by adjustment
    pub transferred_count: u64,
    /// Cost of the moved snack units
    pub transferred_amount: Decimal,
    /// `base_amount + transferred_amount`
    pub amount: Decimal,
    /// Everything billed to the company that day
    pub lines: Vec<CompanyLine>,
    /// Advisory gap-fill figures for the day
    pub tally: TallyResult,
}

/// Snack units left on an employee's bill, grouped by day, item and price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayableLine {
    /// Calendar day
    pub date: NaiveDate,
    /// Item consumed
    pub item_id: ItemId,
    /// Item name captured on the record
    pub item_name: String,
    /// Unit price
    pub unit_price: Decimal,
    /// Units still payable
    pub quantity: u64,
    /// `unit_price × quantity`
    pub amount: Decimal,
}

/// Employee ledger across the whole range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeBill {
    /// Employee id as found on the records
    pub employee_id: EmployeeId,
    /// Display name, or `Unknown`
    pub employee_name: String,
    /// Snack units consumed
    pub original_item_count: u64,
    /// Cost of all snack units consumed
    pub original_amount: Decimal,
    /// Snack units moved to the company
    pub deducted_count: u64,
    /// Cost of the moved units
    pub deducted_amount: Decimal,
    /// `max(0, original_amount - deducted_amount)`
    pub final_payable_amount: Decimal,
    /// Units the employee still pays for
    pub payable_items: Vec<PayableLine>,
}

/// Output of [`calculate_billing`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingResult {
    /// One row per day with consumption, ascending
    pub company_rows: Vec<DailyCompanyBill>,
    /// One row per employee with snack consumption, by name then id
    pub employee_rows: Vec<EmployeeBill>,
    /// Sum of daily drink costs
    pub total_company_base: Decimal,
    /// Sum of snack costs moved onto the company
    pub total_manual_transfer: Decimal,
    /// Company grand total
    pub grand_total: Decimal,
    /// Sum of employee payable amounts
    pub employee_total: Decimal,
}

impl BillingResult {
    /// Company plus employee totals; equals the value of all input units.
    #[must_use]
    pub fn combined_total(&self) -> Decimal {
        add_amount(self.grand_total, self.employee_total)
    }

    /// Bill for one employee, if they had snacks in range
    #[must_use]
    pub fn employee(&self, employee_id: &str) -> Option<&EmployeeBill> {
        self.employee_rows.iter().find(|row| row.employee_id == employee_id)
    }

    /// Company row for one day, if anything was consumed
    #[must_use]
    pub fn day(&self, date: NaiveDate) -> Option<&DailyCompanyBill> {
        self.company_rows.iter().find(|row| row.date == date)
    }
}

/// Reconciliation engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct BillingEngine<Tz: TimeZone> {
    tz: Tz,
    tally: TallyCalculator,
}

impl Default for BillingEngine<Local> {
    fn default() -> Self {
        Self::new(Local, TallyCalculator::default())
    }
}

#[derive(Default)]
struct EmployeeAccumulator {
    original_count: u64,
    original_amount: Decimal,
    deducted_count: u64,
    deducted_amount: Decimal,
    payable: BTreeMap<(NaiveDate, ItemId, Decimal), (String, u64)>,
}

type LineKey<'a> = (&'a str, &'a str, Decimal);
type Lines<'a> = BTreeMap<LineKey<'a>, (&'a ConsumptionRecord, u64)>;

impl<Tz: TimeZone> BillingEngine<Tz> {
    /// Engine that groups days in `tz` and tallies with `tally`.
    pub const fn new(tz: Tz, tally: TallyCalculator) -> Self {
        Self { tz, tally }
    }

    /// Runs the reconciliation. See the module docs for the rules.
    #[must_use]
    pub fn calculate(
        &self,
        consumptions: &[ConsumptionRecord],
        employees: &[Employee],
        active_headcount: usize,
        adjustments: &AdjustmentTable,
    ) -> BillingResult {
        let names: BTreeMap<&str, &str> = employees
            .iter()
            .map(|e| (e.id.as_str(), e.name.as_str()))
            .collect();
        let name_of = |id: &str| names.get(id).copied().unwrap_or(UNKNOWN).to_string();

        let mut days: BTreeMap<NaiveDate, Vec<&ConsumptionRecord>> = BTreeMap::new();
        for record in consumptions {
            days.entry(day_of(record, &self.tz)).or_default().push(record);
        }

        let mut result = BillingResult::default();
        let mut accumulators: BTreeMap<&str, EmployeeAccumulator> = BTreeMap::new();

        for (date, records) in days {
            let mut drink_consumers = BTreeSet::new();
            let mut drink_units: u64 = 0;
            let mut base_amount = Decimal::ZERO;
            let mut transferred_count: u64 = 0;
            let mut transferred_amount = Decimal::ZERO;
            let mut lines: Lines<'_> = BTreeMap::new();
            let mut snacks: BTreeMap<&str, Vec<UnitRun<'_>>> = BTreeMap::new();

            for run in units::expand_all(records.iter().copied()) {
                match run.item_type() {
                    ItemType::Drink => {
                        drink_consumers.insert(run.record.employee_id.as_str());
                        drink_units = drink_units.saturating_add(run.count);
                        base_amount = add_amount(base_amount, run.amount());
                        add_line(&mut lines, run.record, run.count);
                    }
                    ItemType::Snack => snacks
                        .entry(run.record.employee_id.as_str())
                        .or_default()
                        .push(run),
                }
            }

            for (employee_id, mut employee_runs) in snacks {
                let mut remaining = adjustments
                    .get(date, employee_id)
                    .map(|adjustment| adjustment.resolve(&employee_runs))
                    .unwrap_or_default();
                units::sort_most_expensive_first(&mut employee_runs);

                let acc = accumulators.entry(employee_id).or_default();
                for run in &employee_runs {
                    let price = run.unit_price();
                    acc.original_count = acc.original_count.saturating_add(run.count);
                    acc.original_amount = add_amount(acc.original_amount, run.amount());

                    let moved = remaining
                        .get_mut(run.item_id())
                        .map_or(0, |left| {
                            let moved = (*left).min(run.count);
                            *left -= moved;
                            moved
                        });
                    if moved > 0 {
                        let amount = line_amount(price, moved);
                        acc.deducted_count = acc.deducted_count.saturating_add(moved);
                        acc.deducted_amount = add_amount(acc.deducted_amount, amount);
                        transferred_count = transferred_count.saturating_add(moved);
                        transferred_amount = add_amount(transferred_amount, amount);
                        add_line(&mut lines, run.record, moved);
                    }

                    let kept = run.count - moved;
                    if kept > 0 {
                        let key = (date, run.item_id().to_string(), price);
                        let entry = acc
                            .payable
                            .entry(key)
                            .or_insert_with(|| (run.record.item_name.clone(), 0));
                        entry.1 = entry.1.saturating_add(kept);
                    }
                }
            }

            let lines = lines
                .into_values()
                .map(|(record, quantity)| CompanyLine {
                    employee_id: record.employee_id.clone(),
                    employee_name: name_of(&record.employee_id),
                    item_id: record.item_id.clone(),
                    item_name: record.item_name.clone(),
                    item_type: record.item_type,
                    unit_price: record.unit_price,
                    quantity,
                    amount: line_amount(record.unit_price, quantity),
                })
                .collect();

            result.total_company_base = add_amount(result.total_company_base, base_amount);
            result.total_manual_transfer =
                add_amount(result.total_manual_transfer, transferred_amount);
            result.company_rows.push(DailyCompanyBill {
                date,
                drink_count: drink_consumers.len(),
                drink_units,
                base_amount,
                transferred_count,
                transferred_amount,
                amount: add_amount(base_amount, transferred_amount),
                lines,
                tally: self.tally.compute(records.iter().copied(), active_headcount),
            });
        }

        result.grand_total = add_amount(result.total_company_base, result.total_manual_transfer);

        let mut employee_rows: Vec<EmployeeBill> = accumulators
            .into_iter()
            .filter(|(_, acc)| acc.original_count > 0)
            .map(|(employee_id, acc)| {
                let final_payable_amount = acc
                    .original_amount
                    .checked_sub(acc.deducted_amount)
                    .unwrap_or(Decimal::ZERO)
                    .max(Decimal::ZERO);
                EmployeeBill {
                    employee_id: employee_id.to_string(),
                    employee_name: name_of(employee_id),
                    original_item_count: acc.original_count,
                    original_amount: acc.original_amount,
                    deducted_count: acc.deducted_count,
                    deducted_amount: acc.deducted_amount,
                    final_payable_amount,
                    payable_items: acc
                        .payable
                        .into_iter()
                        .map(|((date, item_id, unit_price), (item_name, quantity))| PayableLine {
                            date,
                            item_id,
                            item_name,
                            unit_price,
                            quantity,
                            amount: line_amount(unit_price, quantity),
                        })
                        .collect(),
                }
            })
            .collect();
        employee_rows.sort_by(|a, b| {
            a.employee_name
                .cmp(&b.employee_name)
                .then_with(|| a.employee_id.cmp(&b.employee_id))
        });

        result.employee_total = employee_rows
            .iter()
            .fold(Decimal::ZERO, |total, row| add_amount(total, row.final_payable_amount));
        result.employee_rows = employee_rows;
        result
    }
}

fn add_line<'a>(lines: &mut Lines<'a>, record: &'a ConsumptionRecord, quantity: u64) {
    let key = (record.employee_id.as_str(), record.item_id.as_str(), record.unit_price);
    let entry = lines.entry(key).or_insert((record, 0));
    entry.1 = entry.1.saturating_add(quantity);
}

/// Reconciles `consumptions` into company and employee ledgers, grouping
/// days in local time and tallying at the default drink rate.
#[must_use]
pub fn calculate_billing(
    consumptions: &[ConsumptionRecord],
    employees: &[Employee],
    active_headcount: usize,
    adjustments: &AdjustmentTable,
) -> BillingResult {
    BillingEngine::default().calculate(consumptions, employees, active_headcount, adjustments)
}
