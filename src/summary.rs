//! Natural-language summary of a billing period.
//!
//! [`SummaryStats`] condenses a range into a few figures, and
//! [`SummaryClient`] asks an external text-generation endpoint to describe
//! them. The client never fails: any problem yields [`FALLBACK_SUMMARY`].

use std::{collections::BTreeMap, fmt::Write as _, time::Duration};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::{
    core::{billing::BillingResult, report::format_money},
    errors::{Error, Result},
    models::{ConsumptionRecord, Employee, EmployeeId, ItemType, UNKNOWN, add_amount},
};

/// Returned whenever a summary cannot be generated.
pub const FALLBACK_SUMMARY: &str =
    "Summary unavailable right now. The figures above are complete and exact.";

const TOP_CONSUMERS: usize = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One of the heaviest consumers in the range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopConsumer {
    /// Employee id
    pub employee_id: EmployeeId,
    /// Display name, or `Unknown`
    pub name: String,
    /// Units of anything consumed
    pub units: u64,
    /// Value of those units
    pub amount: Decimal,
}

/// Aggregate figures for a billing range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    /// First day, inclusive
    pub from: NaiveDate,
    /// Last day, inclusive
    pub to: NaiveDate,
    /// Consumption records in range
    pub total_records: usize,
    /// Drink units in range
    pub drink_units: u64,
    /// Snack units in range
    pub snack_units: u64,
    /// Company grand total
    pub company_total: Decimal,
    /// Snack value moved onto the company
    pub manual_transfer: Decimal,
    /// Sum of employee payable amounts
    pub employee_total: Decimal,
    /// Heads filled by the daily tally, summed over days
    pub gap_filled_total: usize,
    /// Heaviest consumers by units, then name
    pub top_consumers: Vec<TopConsumer>,
}

impl SummaryStats {
    /// Collects figures from the range's records and their billing result.
    /// `records` should be the same records that were billed.
    #[must_use]
    pub fn from_billing(
        from: NaiveDate,
        to: NaiveDate,
        records: &[ConsumptionRecord],
        result: &BillingResult,
        employees: &[Employee],
    ) -> Self {
        let mut drink_units: u64 = 0;
        let mut snack_units: u64 = 0;
        let mut per_employee: BTreeMap<&str, (u64, Decimal)> = BTreeMap::new();
        for record in records {
            let units = u64::from(record.quantity);
            match record.item_type {
                ItemType::Drink => drink_units = drink_units.saturating_add(units),
                ItemType::Snack => snack_units = snack_units.saturating_add(units),
            }
            let totals = per_employee.entry(record.employee_id.as_str()).or_default();
            totals.0 = totals.0.saturating_add(units);
            totals.1 = add_amount(totals.1, record.line_total());
        }

        let mut top_consumers: Vec<TopConsumer> = per_employee
            .into_iter()
            .map(|(id, (units, amount))| TopConsumer {
                employee_id: id.to_string(),
                name: employees
                    .iter()
                    .find(|e| e.id == id)
                    .map_or_else(|| UNKNOWN.to_string(), |e| e.name.clone()),
                units,
                amount,
            })
            .collect();
        top_consumers.sort_by(|a, b| b.units.cmp(&a.units).then_with(|| a.name.cmp(&b.name)));
        top_consumers.truncate(TOP_CONSUMERS);

        Self {
            from,
            to,
            total_records: records.len(),
            drink_units,
            snack_units,
            company_total: result.grand_total,
            manual_transfer: result.total_manual_transfer,
            employee_total: result.employee_total,
            gap_filled_total: result.company_rows.iter().map(|row| row.tally.gap_filled).sum(),
            top_consumers,
        }
    }
}

/// Builds the prompt sent to the summary endpoint.
#[must_use]
pub fn build_prompt(stats: &SummaryStats) -> String {
    let mut prompt = format!(
        "Write a short, friendly two-sentence summary of office tea and snack \
         consumption from {} to {}.\n",
        stats.from, stats.to
    );
    let _ = writeln!(
        prompt,
        "Records: {}. Drink units: {}. Snack units: {}.",
        stats.total_records, stats.drink_units, stats.snack_units
    );
    let _ = writeln!(
        prompt,
        "Company total: {} (including {} of snacks moved onto the company). Employee total: {}.",
        format_money(stats.company_total),
        format_money(stats.manual_transfer),
        format_money(stats.employee_total)
    );
    let _ = writeln!(prompt, "Tally heads filled: {}.", stats.gap_filled_total);
    if !stats.top_consumers.is_empty() {
        let top: Vec<String> = stats
            .top_consumers
            .iter()
            .map(|c| format!("{} ({} units, {})", c.name, c.units, format_money(c.amount)))
            .collect();
        let _ = writeln!(prompt, "Top consumers: {}.", top.join(", "));
    }
    prompt
}

/// Pulls the generated text out of a response body. Accepts a top-level
/// `text` or `summary` string, or the first candidate's first part.
#[must_use]
pub fn extract_text(body: &Value) -> Option<String> {
    let text = body
        .get("text")
        .or_else(|| body.get("summary"))
        .or_else(|| body.pointer("/candidates/0/content/parts/0/text"))
        .and_then(Value::as_str)?
        .trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Client for the summary endpoint.
#[derive(Debug, Clone)]
pub struct SummaryClient {
    client: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<String>,
}

impl SummaryClient {
    /// Creates a client. Without an endpoint every summary is the fallback.
    pub fn new(endpoint: Option<String>, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    /// Summarizes `stats`, or returns [`FALLBACK_SUMMARY`].
    #[instrument(skip(self, stats), fields(from = %stats.from, to = %stats.to))]
    pub async fn summarize(&self, stats: &SummaryStats) -> String {
        match self.request(stats).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Summary generation failed: {e}");
                FALLBACK_SUMMARY.to_string()
            }
        }
    }

    async fn request(&self, stats: &SummaryStats) -> Result<String> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| Error::Config {
            message: "no summary endpoint configured".to_string(),
        })?;

        let mut request = self
            .client
            .post(endpoint)
            .json(&json!({ "prompt": build_prompt(stats) }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let body: Value = request.send().await?.error_for_status()?.json().await?;
        debug!("Summary endpoint responded");
        extract_text(&body).ok_or_else(|| Error::InvalidPayload {
            message: "summary response has no text".to_string(),
        })
    }
}
