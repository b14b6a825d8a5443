//! Database configuration module for the local `SQLite` store.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs without hand-written SQL.

use crate::entities::{Adjustment, Consumption, Employee, Item};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::info;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/tea_ledger.sqlite?mode=rwc";

/// Resolves the database URL: `DATABASE_URL` from the environment, then the
/// configured value, then a local default file.
#[must_use]
pub fn get_database_url(configured: Option<&str>) -> String {
    std::env::var("DATABASE_URL")
        .ok()
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
}

/// Connects to `database_url` and makes sure every table exists.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    ensure_parent_dir(database_url)?;
    let db = Database::connect(database_url).await?;
    create_tables(&db).await?;
    info!("Connected to local store at {database_url}");
    Ok(db)
}

/// File-backed `SQLite` URLs need their directory to exist before connecting.
fn ensure_parent_dir(database_url: &str) -> Result<()> {
    let Some(path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or_default();
    match std::path::Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)?,
        _ => {}
    }
    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all tables if they do not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, Employee).await?;
    create_table(db, &schema, Item).await?;
    create_table(db, &schema, Consumption).await?;
    create_table(db, &schema, Adjustment).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AdjustmentModel, ConsumptionModel, EmployeeModel, ItemModel};
    use sea_orm::QuerySelect;

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<EmployeeModel> = Employee::find().limit(1).all(&db).await?;
        let _: Vec<ItemModel> = Item::find().limit(1).all(&db).await?;
        let _: Vec<ConsumptionModel> = Consumption::find().limit(1).all(&db).await?;
        let _: Vec<AdjustmentModel> = Adjustment::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }

    #[test]
    fn test_get_database_url_prefers_configured_over_default() {
        if std::env::var("DATABASE_URL").is_err() {
            assert_eq!(get_database_url(Some("sqlite::memory:")), "sqlite::memory:");
            assert_eq!(get_database_url(None), DEFAULT_DATABASE_URL);
        }
    }
}
