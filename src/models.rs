//! Domain types shared by the engine, the stores and the repository.
//!
//! Money is held as [`Decimal`] everywhere inside the crate. `f64` only shows
//! up at the storage and wire boundaries, through [`to_decimal`] and
//! [`to_f64`].

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::Serialize;

use crate::core::adjustments::AdjustmentTable;

/// Employee identifier as issued by the store
pub type EmployeeId = String;
/// Item identifier as issued by the store
pub type ItemId = String;

/// Display value used when a lookup misses.
pub const UNKNOWN: &str = "Unknown";

const DECIMAL_PLACES: u32 = 2;

/// Convert f64 to Decimal; NaN and infinities become zero.
#[inline]
#[must_use]
pub fn to_decimal(value: f64) -> Decimal {
    if value.is_finite() {
        Decimal::from_f64(value).unwrap_or_default()
    } else {
        Decimal::ZERO
    }
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
#[must_use]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// `unit_price × quantity`, or zero when the product does not fit a
/// [`Decimal`].
#[inline]
#[must_use]
pub fn line_amount(unit_price: Decimal, quantity: u64) -> Decimal {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .unwrap_or(Decimal::ZERO)
}

/// `total + amount`, or zero when the sum does not fit a [`Decimal`].
#[inline]
#[must_use]
pub fn add_amount(total: Decimal, amount: Decimal) -> Decimal {
    total.checked_add(amount).unwrap_or(Decimal::ZERO)
}

/// Which ledger a unit defaults into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// Billed to the company
    Drink,
    /// Billed to the employee unless adjusted
    Snack,
}

impl ItemType {
    /// Lenient parse used by the store decoders. Anything that is not
    /// recognisably a drink is treated as a snack.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "drink" | "drinks" => Self::Drink,
            _ => Self::Snack,
        }
    }

    /// Lowercase wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Drink => "drink",
            Self::Snack => "snack",
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A member of staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    /// Store identifier
    pub id: EmployeeId,
    /// Display name
    pub name: String,
    /// Only active employees count toward the daily headcount
    pub is_active: bool,
}

/// A purchasable drink or snack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Store identifier
    pub id: ItemId,
    /// Display name
    pub name: String,
    /// Price of one unit
    pub unit_price: Decimal,
    /// Ledger this item defaults into
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// Inactive items are hidden from new entry
    pub is_active: bool,
}

/// One purchase event. `quantity` folds repeated identical purchases into
/// a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionRecord {
    /// Store identifier
    pub id: String,
    /// Who consumed
    pub employee_id: EmployeeId,
    /// What was consumed
    pub item_id: ItemId,
    /// Item name captured at entry time
    pub item_name: String,
    /// Item type captured at entry time
    pub item_type: ItemType,
    /// Unit price captured at entry time
    pub unit_price: Decimal,
    /// When it was consumed
    pub timestamp: DateTime<Utc>,
    /// Number of identical units, at least one
    pub quantity: u32,
}

impl ConsumptionRecord {
    /// `unit_price × quantity`
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        line_amount(self.unit_price, u64::from(self.quantity))
    }
}

/// Entry request for a consumption record, before the repository snapshots
/// the item's name, type and price onto it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConsumption {
    /// Who consumed
    pub employee_id: EmployeeId,
    /// What was consumed
    pub item_id: ItemId,
    /// Number of units
    pub quantity: u32,
    /// When it was consumed
    pub timestamp: DateTime<Utc>,
}

/// Everything the store holds, as one value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Staff list
    pub employees: Vec<Employee>,
    /// Item catalogue
    pub items: Vec<Item>,
    /// Consumption log
    pub consumption: Vec<ConsumptionRecord>,
    /// Manual snack-to-company transfers
    pub daily_adjustments: AdjustmentTable,
}

impl Snapshot {
    /// Number of active employees.
    #[must_use]
    pub fn active_headcount(&self) -> usize {
        self.employees.iter().filter(|e| e.is_active).count()
    }

    /// Looks up an employee by id.
    #[must_use]
    pub fn employee(&self, id: &str) -> Option<&Employee> {
        self.employees.iter().find(|e| e.id == id)
    }

    /// Looks up an item by id.
    #[must_use]
    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }
}
