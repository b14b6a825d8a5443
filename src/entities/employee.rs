//! Employee entity - Represents a member of staff.
//!
//! Inactive employees are kept so historical bills still resolve their names.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Employee database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "employees")]
pub struct Model {
    /// Identifier issued by the store
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Display name
    pub name: String,
    /// Whether the employee counts toward the daily headcount
    pub is_active: bool,
}

/// Employees are referenced by consumption rows without a foreign key, so
/// records for removed staff still load.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
