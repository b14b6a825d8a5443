//! Adjustment entity - One row of the manual adjustment table.
//!
//! A row with an `item_id` is a per-item count; a row without one is a
//! legacy flat count for the whole day. The table is always replaced as a
//! whole.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Adjustment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "adjustments")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Calendar day the adjustment applies to
    pub date: Date,
    /// Employee whose snacks are moved
    pub employee_id: String,
    /// Item, or `None` for a legacy flat count
    pub item_id: Option<String>,
    /// Units moved to the company
    pub count: i64,
}

/// `Adjustment` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
