//! Entity module - Contains all SeaORM entity definitions for the local store.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod adjustment;
pub mod consumption;
pub mod employee;
pub mod item;

// Re-export specific types to avoid conflicts
pub use adjustment::{Column as AdjustmentColumn, Entity as Adjustment, Model as AdjustmentModel};
pub use consumption::{
    Column as ConsumptionColumn, Entity as Consumption, Model as ConsumptionModel,
};
pub use employee::{Column as EmployeeColumn, Entity as Employee, Model as EmployeeModel};
pub use item::{Column as ItemColumn, Entity as Item, Model as ItemModel};
