//! Core business logic - the pure billing engine and its helpers.
//!
//! Nothing under `core` performs I/O; the store and repository layers feed
//! it snapshots and render what it returns.

/// Manual snack-to-company adjustments
pub mod adjustments;
/// Billing reconciliation engine
pub mod billing;
/// Text and CSV rendering of billing results
pub mod report;
/// Daily gap-fill tally
pub mod tally;
/// Lazy per-unit expansion of consumption records
pub mod units;

pub use adjustments::{AdjustmentTable, EmployeeAdjustment};
pub use billing::{BillingEngine, BillingResult, calculate_billing};
pub use tally::{TallyCalculator, TallyResult, compute_tally};
