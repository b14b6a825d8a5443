//! Report formatting for billing results.
//!
//! Renders company and employee ledgers as plain text and exports them as
//! CSV. All functions are framework-agnostic and work on a finished
//! [`BillingResult`].

use std::{fmt::Write as _, io::Write};

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
    core::{
        billing::{BillingResult, DailyCompanyBill, EmployeeBill},
        tally::TallyResult,
    },
    errors::Result,
};

/// Formats an amount with two decimals, e.g. `₹12.50`.
#[must_use]
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("₹{rounded:.2}")
}

/// One line per day: drinks, moved snacks and the company amount.
#[must_use]
pub fn format_company_bill(rows: &[DailyCompanyBill]) -> String {
    let mut out = String::from("Company bill\n");
    for row in rows {
        // write! to a String cannot fail
        let _ = writeln!(
            out,
            "  {} | drinks: {} ({} units) {} | moved snacks: {} {} | total {}",
            row.date.format("%Y-%m-%d"),
            row.drink_count,
            row.drink_units,
            format_money(row.base_amount),
            row.transferred_count,
            format_money(row.transferred_amount),
            format_money(row.amount),
        );
    }
    out
}

/// One line per employee with original, deducted and payable figures.
#[must_use]
pub fn format_employee_bill(rows: &[EmployeeBill]) -> String {
    let mut out = String::from("Employee bill\n");
    for row in rows {
        let _ = writeln!(
            out,
            "  {} | snacks: {} {} | moved: {} {} | payable {}",
            row.employee_name,
            row.original_item_count,
            format_money(row.original_amount),
            row.deducted_count,
            format_money(row.deducted_amount),
            format_money(row.final_payable_amount),
        );
    }
    out
}

/// Both ledgers followed by the totals.
#[must_use]
pub fn format_billing_summary(result: &BillingResult) -> String {
    let mut out = format_company_bill(&result.company_rows);
    out.push('\n');
    out.push_str(&format_employee_bill(&result.employee_rows));
    let _ = write!(
        out,
        "\nCompany: {} (drinks {} + moved snacks {})\nEmployees: {}\nTotal: {}\n",
        format_money(result.grand_total),
        format_money(result.total_company_base),
        format_money(result.total_manual_transfer),
        format_money(result.employee_total),
        format_money(result.combined_total()),
    );
    out
}

/// One day's tally: counted heads, gap fill and the advisory cost.
#[must_use]
pub fn format_tally(date: NaiveDate, tally: &TallyResult) -> String {
    let mut out = format!(
        "Tally for {}\n  drinkers: {} | filled: {} | counted: {} | cost: {}\n",
        date.format("%Y-%m-%d"),
        tally.actual_drink_count,
        tally.gap_filled,
        tally.adjusted_drink_count,
        format_money(tally.company_cost),
    );
    if !tally.snack_only_consumer_ids.is_empty() {
        let _ = writeln!(out, "  snacks only: {}", tally.snack_only_consumer_ids.join(", "));
    }
    if !tally.extra_snack_consumer_ids.is_empty() {
        let _ = writeln!(out, "  extra snacks: {}", tally.extra_snack_consumer_ids.join(", "));
    }
    out
}

/// Writes both ledgers as CSV: one section per ledger, tagged in the first
/// column so the file stays a single rectangular table.
pub fn write_billing_csv<W: Write>(result: &BillingResult, writer: W) -> Result<()> {
    let mut csv = csv::WriterBuilder::new().flexible(false).from_writer(writer);
    csv.write_record([
        "ledger", "date", "employee", "item", "quantity", "unit_price", "amount",
    ])?;

    for row in &result.company_rows {
        let date = row.date.format("%Y-%m-%d").to_string();
        for line in &row.lines {
            csv.write_record(&[
                "company".to_string(),
                date.clone(),
                line.employee_name.clone(),
                line.item_name.clone(),
                line.quantity.to_string(),
                line.unit_price.to_string(),
                line.amount.to_string(),
            ])?;
        }
    }

    for bill in &result.employee_rows {
        for line in &bill.payable_items {
            csv.write_record(&[
                "employee".to_string(),
                line.date.format("%Y-%m-%d").to_string(),
                bill.employee_name.clone(),
                line.item_name.clone(),
                line.quantity.to_string(),
                line.unit_price.to_string(),
                line.amount.to_string(),
            ])?;
        }
    }

    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        core::{adjustments::AdjustmentTable, billing::calculate_billing},
        test_utils::*,
    };

    fn sample_result() -> BillingResult {
        let ts = local_noon(2024, 3, 4);
        let records = vec![
            drink("r1", "e1", "tea", 10, 1, ts),
            snack("r2", "e1", "biscuit", 10, 2, ts),
        ];
        let mut adjustments = AdjustmentTable::new();
        adjustments.set(ts.with_timezone(&chrono::Local).date_naive(), "e1", "biscuit", 1);
        calculate_billing(&records, &[employee("e1", "Asha", true)], 1, &adjustments)
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(Decimal::from(10)), "₹10.00");
        assert_eq!(format_money(Decimal::new(12_345, 3)), "₹12.35");
    }

    #[test]
    fn test_format_billing_summary_contains_totals() {
        let summary = format_billing_summary(&sample_result());

        assert!(summary.contains("2024-03-04"));
        assert!(summary.contains("Asha"));
        assert!(summary.contains("Company: ₹20.00"));
        assert!(summary.contains("Employees: ₹10.00"));
        assert!(summary.contains("Total: ₹30.00"));
    }

    #[test]
    fn test_format_tally_lists_fillers() {
        let ts = local_noon(2024, 3, 4);
        let records = vec![
            drink("r1", "e1", "tea", 10, 1, ts),
            snack("r2", "e2", "biscuit", 5, 2, ts),
        ];
        let tally = crate::core::compute_tally(&records, 3);
        let text = format_tally(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(), &tally);

        assert!(text.starts_with("Tally for 2024-03-04"));
        assert!(text.contains("drinkers: 1 | filled: 1 | counted: 2 | cost: ₹20.00"));
        assert!(text.contains("snacks only: e2"));
        assert!(text.contains("extra snacks: e2"));
    }

    #[test]
    fn test_write_billing_csv() -> Result<()> {
        let mut buffer = Vec::new();
        write_billing_csv(&sample_result(), &mut buffer)?;
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "ledger,date,employee,item,quantity,unit_price,amount");
        assert_eq!(lines.len(), 4);
        assert!(lines.contains(&"company,2024-03-04,Asha,tea,1,10,10"));
        assert!(lines.contains(&"company,2024-03-04,Asha,biscuit,1,10,10"));
        assert!(lines.contains(&"employee,2024-03-04,Asha,biscuit,1,10,10"));
        Ok(())
    }
}
