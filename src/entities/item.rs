//! Item entity - Represents a drink or snack in the catalogue.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Item database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "items")]
pub struct Model {
    /// Identifier issued by the store
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Display name
    pub name: String,
    /// Price per unit
    pub unit_price: f64,
    /// `"drink"` or `"snack"`
    pub item_type: String,
    /// Inactive items are hidden from new entry
    pub is_active: bool,
}

/// `Item` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
