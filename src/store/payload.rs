//! Tolerant decoding of the store's `GET` payload.
//!
//! The remote store is a spreadsheet-backed script, so field names drift in
//! case and spacing (`employeeId`, `Employee ID`, `employee_id`) and values
//! arrive as numbers or strings. Keys are normalised before lookup and
//! values are coerced. Bad or implausible prices become zero, bad quantities
//! become one and oversized ones are capped. Records with unreadable
//! timestamps are dropped.

use std::collections::BTreeMap;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
    core::adjustments::AdjustmentTable,
    errors::{Error, Result},
    models::{ConsumptionRecord, Employee, Item, ItemType, Snapshot, UNKNOWN, to_decimal},
};

/// Lowercases and strips whitespace, `_` and `-`.
#[must_use]
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// An object with normalised keys.
struct Fields<'a>(BTreeMap<String, &'a Value>);

impl<'a> Fields<'a> {
    fn new(object: &'a Map<String, Value>) -> Self {
        Self(object.iter().map(|(k, v)| (normalize_key(k), v)).collect())
    }

    fn get(&self, names: &[&str]) -> Option<&'a Value> {
        names
            .iter()
            .find_map(|name| self.0.get(*name).copied())
            .filter(|value| !value.is_null())
    }

    fn string(&self, names: &[&str]) -> Option<String> {
        match self.get(names)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn price(&self, names: &[&str]) -> Option<Decimal> {
        self.get(names).map(coerce_price)
    }

    fn flag(&self, names: &[&str], default: bool) -> bool {
        match self.get(names) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(Value::String(s)) => {
                matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1" | "active")
            }
            _ => default,
        }
    }
}

/// Highest unit price taken from the store.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Highest quantity taken from the store for a single record.
pub const MAX_QUANTITY: u32 = 10_000;

/// Numbers and numeric strings become prices; anything else is zero.
/// Negative prices and prices above [`MAX_UNIT_PRICE`] are zero too.
#[must_use]
pub fn coerce_price(value: &Value) -> Decimal {
    let price = match value {
        Value::Number(n) => n.as_f64().map(to_decimal).unwrap_or_default(),
        Value::String(s) => s.trim().parse::<Decimal>().unwrap_or_default(),
        _ => Decimal::ZERO,
    };
    if price.is_sign_negative() || price > MAX_UNIT_PRICE {
        warn!("Implausible price {price}, using 0");
        return Decimal::ZERO;
    }
    price
}

fn coerce_quantity(value: Option<&Value>) -> u32 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(1.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(1.0),
        _ => 1.0,
    };
    if !raw.is_finite() || raw < 1.0 {
        return 1;
    }
    if raw > f64::from(MAX_QUANTITY) {
        warn!("Quantity {raw} exceeds {MAX_QUANTITY}, capping");
        return MAX_QUANTITY;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let quantity = raw.floor() as u32;
    quantity
}

/// Accepts RFC 3339, epoch milliseconds, or a naive local date-time.
#[must_use]
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                return Some(ts.with_timezone(&Utc));
            }
            ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
                .and_then(|naive| Local.from_local_datetime(&naive).earliest())
                .map(|ts| ts.with_timezone(&Utc))
        }
        _ => None,
    }
}

fn objects<'a>(fields: &Fields<'a>, names: &[&str]) -> Vec<&'a Map<String, Value>> {
    match fields.get(names) {
        Some(Value::Array(values)) => values.iter().filter_map(Value::as_object).collect(),
        _ => Vec::new(),
    }
}

fn decode_employee(object: &Map<String, Value>) -> Option<Employee> {
    let fields = Fields::new(object);
    let id = fields.string(&["id", "employeeid"])?;
    Some(Employee {
        name: fields.string(&["name", "employeename"]).unwrap_or_else(|| UNKNOWN.to_string()),
        is_active: fields.flag(&["isactive", "active"], true),
        id,
    })
}

fn decode_item(object: &Map<String, Value>) -> Option<Item> {
    let fields = Fields::new(object);
    let id = fields.string(&["id", "itemid"])?;
    Some(Item {
        name: fields.string(&["name", "itemname"]).unwrap_or_else(|| UNKNOWN.to_string()),
        unit_price: fields.price(&["unitprice", "price"]).unwrap_or_default(),
        item_type: fields
            .string(&["type", "itemtype"])
            .map_or(ItemType::Snack, |raw| ItemType::parse_lenient(&raw)),
        is_active: fields.flag(&["isactive", "active"], true),
        id,
    })
}

fn decode_consumption(object: &Map<String, Value>, items: &[Item]) -> Option<ConsumptionRecord> {
    let fields = Fields::new(object);
    let id = fields.string(&["id"])?;
    let Some(timestamp) = fields.get(&["timestamp", "date", "time"]).and_then(parse_timestamp)
    else {
        warn!("Dropping consumption record {id}: unreadable timestamp");
        return None;
    };
    let item_id = fields.string(&["itemid"]).unwrap_or_default();
    let item = items.iter().find(|item| item.id == item_id);

    Some(ConsumptionRecord {
        employee_id: fields.string(&["employeeid"]).unwrap_or_default(),
        item_name: fields
            .string(&["itemname", "name"])
            .or_else(|| item.map(|i| i.name.clone()))
            .unwrap_or_else(|| UNKNOWN.to_string()),
        item_type: fields
            .string(&["itemtype", "type"])
            .map(|raw| ItemType::parse_lenient(&raw))
            .or_else(|| item.map(|i| i.item_type))
            .unwrap_or(ItemType::Snack),
        unit_price: fields
            .price(&["unitprice", "price"])
            .or_else(|| item.map(|i| i.unit_price))
            .unwrap_or_default(),
        quantity: coerce_quantity(fields.get(&["quantity", "qty"])),
        item_id,
        timestamp,
        id,
    })
}

/// Decodes a parsed `GET` payload into a snapshot.
///
/// Fails only if the payload is not an object or `dailyAdjustments` is
/// present but not an object.
pub fn decode_snapshot(value: &Value) -> Result<Snapshot> {
    let Value::Object(root) = value else {
        return Err(Error::InvalidPayload {
            message: "expected a JSON object at the top level".to_string(),
        });
    };
    let fields = Fields::new(root);

    let employees: Vec<Employee> = objects(&fields, &["employees"])
        .into_iter()
        .filter_map(decode_employee)
        .collect();
    let items: Vec<Item> = objects(&fields, &["items"])
        .into_iter()
        .filter_map(decode_item)
        .collect();
    let consumption: Vec<ConsumptionRecord> = objects(&fields, &["consumption", "consumptions"])
        .into_iter()
        .filter_map(|object| decode_consumption(object, &items))
        .collect();
    let daily_adjustments = AdjustmentTable::from_json(
        fields.get(&["dailyadjustments", "adjustments"]).unwrap_or(&Value::Null),
    )?;

    debug!(
        employees = employees.len(),
        items = items.len(),
        consumption = consumption.len(),
        "Decoded store payload"
    );

    Ok(Snapshot {
        employees,
        items,
        consumption,
        daily_adjustments,
    })
}

/// Parses and decodes a raw `GET` response body.
pub fn decode_snapshot_str(body: &str) -> Result<Snapshot> {
    let value: Value = serde_json::from_str(body)?;
    decode_snapshot(&value)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::calculate_billing;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("Employee ID"), "employeeid");
        assert_eq!(normalize_key(" employee_id "), "employeeid");
        assert_eq!(normalize_key("isActive"), "isactive");
    }

    #[test]
    fn test_decode_snapshot_tolerates_field_drift() {
        let snapshot = decode_snapshot(&json!({
            "Employees": [
                { " ID ": "e1", "Name": "Asha", "Is Active": "TRUE" },
                { "id": 7, "name": "Ravi", "isActive": false },
                { "name": "no id" },
            ],
            "items": [
                { "id": "tea", "name": "Tea", "Price": "10", "Type": "Drink" },
                { "id": "samosa", "name": "Samosa", "price": "n/a", "type": "snack" },
            ],
            "consumption": [
                {
                    "id": "c1",
                    "Employee Id": "e1",
                    "itemId": "tea",
                    "timestamp": "2024-03-04T06:30:00Z",
                    "quantity": "2",
                },
                {
                    "id": "c2",
                    "employeeId": "7",
                    "itemId": "samosa",
                    "price": 15,
                    "timestamp": 1_709_533_800_000_i64,
                },
                { "id": "c3", "employeeId": "e1", "itemId": "tea", "timestamp": "yesterday" },
            ],
            "dailyAdjustments": { "2024-03-04": { "7": { "samosa": 1 } } },
        }))
        .unwrap();

        assert_eq!(snapshot.employees.len(), 2);
        assert!(snapshot.employees[0].is_active);
        assert_eq!(snapshot.employees[1].id, "7");
        assert!(!snapshot.employees[1].is_active);

        assert_eq!(snapshot.items[0].unit_price, Decimal::from(10));
        assert_eq!(snapshot.items[0].item_type, ItemType::Drink);
        assert_eq!(snapshot.items[1].unit_price, Decimal::ZERO);

        assert_eq!(snapshot.consumption.len(), 2);
        let first = &snapshot.consumption[0];
        assert_eq!(first.quantity, 2);
        assert_eq!(first.item_name, "Tea");
        assert_eq!(first.item_type, ItemType::Drink);
        assert_eq!(first.unit_price, Decimal::from(10));
        let second = &snapshot.consumption[1];
        assert_eq!(second.quantity, 1);
        assert_eq!(second.unit_price, Decimal::from(15));
        assert_eq!(second.item_type, ItemType::Snack);

        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(snapshot.daily_adjustments.requested(day, "7", "samosa"), 1);
    }

    #[test]
    fn test_unknown_item_falls_back_to_sentinel() {
        let snapshot = decode_snapshot(&json!({
            "consumption": [
                {
                    "id": "c1",
                    "employeeId": "e1",
                    "itemId": "gone",
                    "timestamp": "2024-03-04T06:30:00Z",
                },
            ],
        }))
        .unwrap();

        let record = &snapshot.consumption[0];
        assert_eq!(record.item_name, UNKNOWN);
        assert_eq!(record.unit_price, Decimal::ZERO);
        assert_eq!(record.item_type, ItemType::Snack);
    }

    #[test]
    fn test_coerce_price_rejects_implausible_values() {
        assert_eq!(coerce_price(&json!("12.50")), Decimal::new(1250, 2));
        assert_eq!(coerce_price(&json!(-3)), Decimal::ZERO);
        assert_eq!(coerce_price(&json!("1000001")), Decimal::ZERO);
        assert_eq!(coerce_price(&json!(1e30)), Decimal::ZERO);
        assert_eq!(coerce_price(&json!("1000000")), MAX_UNIT_PRICE);
    }

    #[test]
    fn test_coerce_quantity_caps_large_values() {
        assert_eq!(coerce_quantity(Some(&json!(3.7))), 3);
        assert_eq!(coerce_quantity(Some(&json!("0"))), 1);
        assert_eq!(coerce_quantity(Some(&json!(1e12))), MAX_QUANTITY);
        assert_eq!(coerce_quantity(Some(&json!("4294967296"))), MAX_QUANTITY);
        assert_eq!(coerce_quantity(None), 1);
    }

    #[test]
    fn test_maximum_decimal_price_bills_without_overflow() {
        let snapshot = decode_snapshot(&json!({
            "consumption": [
                {
                    "id": "c1",
                    "employeeId": "e1",
                    "itemId": "gold",
                    "itemType": "snack",
                    "price": "79228162514264337593543950335",
                    "quantity": 2,
                    "timestamp": "2024-03-04T06:30:00Z",
                },
                {
                    "id": "c2",
                    "employeeId": "e1",
                    "itemId": "biscuit",
                    "itemType": "snack",
                    "price": 5,
                    "quantity": 99_999_999,
                    "timestamp": "2024-03-04T06:30:00Z",
                },
            ],
        }))
        .unwrap();
        assert_eq!(snapshot.consumption[0].unit_price, Decimal::ZERO);
        assert_eq!(snapshot.consumption[1].quantity, MAX_QUANTITY);

        let result = calculate_billing(&snapshot.consumption, &[], 1, &snapshot.daily_adjustments);

        let bill = result.employee("e1").unwrap();
        assert_eq!(bill.original_item_count, 2 + u64::from(MAX_QUANTITY));
        assert_eq!(bill.final_payable_amount, Decimal::from(50_000));
        assert_eq!(result.combined_total(), Decimal::from(50_000));
    }

    #[test]
    fn test_decode_snapshot_rejects_non_object_adjustments() {
        let result = decode_snapshot(&json!({ "dailyAdjustments": "oops" }));
        assert!(matches!(result, Err(Error::InvalidAdjustments { .. })));
    }

    #[test]
    fn test_decode_snapshot_rejects_non_object_root() {
        assert!(matches!(
            decode_snapshot(&json!([])),
            Err(Error::InvalidPayload { .. })
        ));
        assert!(matches!(decode_snapshot_str("<html>"), Err(Error::Json(_))));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp(&json!("2024-03-04T06:30:00+05:30")).unwrap();
        assert_eq!(rfc, Utc.with_ymd_and_hms(2024, 3, 4, 1, 0, 0).unwrap());

        let millis = parse_timestamp(&json!(0)).unwrap();
        assert_eq!(millis.timestamp(), 0);

        assert!(parse_timestamp(&json!("2024-03-04 09:15:00")).is_some());
        assert!(parse_timestamp(&json!(true)).is_none());
    }
}
