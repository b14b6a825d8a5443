//! Consumption entity - One purchase event in the append-only log.
//!
//! Item name, type and price are copied onto the row at entry time so later
//! catalogue edits do not rewrite history. Rows are never updated: an edit
//! deletes the old batch and inserts a new one.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Consumption database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consumption")]
pub struct Model {
    /// Identifier issued at entry time
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Who consumed
    pub employee_id: String,
    /// What was consumed
    pub item_id: String,
    /// Item name at entry time
    pub item_name: String,
    /// `"drink"` or `"snack"` at entry time
    pub item_type: String,
    /// Unit price at entry time
    pub unit_price: f64,
    /// When it was consumed
    pub timestamp: DateTimeUtc,
    /// Number of identical units
    pub quantity: i64,
}

/// `Consumption` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
