//! Unified error types for `tea-ledger`.
//!
//! The billing engine itself never fails; these errors come from the
//! boundaries around it: configuration, payload decoding, storage and HTTP.

use thiserror::Error;

/// Every error the crate can surface.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Adjustment payload rejected before it reaches the engine
    #[error("Invalid adjustment payload: {message}")]
    InvalidAdjustments {
        /// Why the payload was rejected
        message: String,
    },

    /// Store payload has the wrong overall shape
    #[error("Invalid store payload: {message}")]
    InvalidPayload {
        /// What was wrong with it
        message: String,
    },

    /// Consumption quantity must be at least one
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity {
        /// The offending quantity
        quantity: u32,
    },

    /// Employee id is unknown to the repository
    #[error("Employee not found: {id}")]
    EmployeeNotFound {
        /// Requested employee id
        id: String,
    },

    /// Item id is unknown to the repository
    #[error("Item not found: {id}")]
    ItemNotFound {
        /// Requested item id
        id: String,
    },

    /// Consumption record id is unknown to the repository
    #[error("Consumption record not found: {id}")]
    ConsumptionNotFound {
        /// Requested record id
        id: String,
    },

    /// Local database failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Remote store or summary endpoint failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding or decoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV export failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
