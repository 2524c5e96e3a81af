//! Database configuration module.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs. The two uniqueness rules the ledger relies on, one redemption row per
//! (user card, benefit, period) and one preference row per (user card, benefit),
//! are added as unique indexes afterwards.

use crate::entities::{
    Benefit, BenefitPreference, BenefitRedemption, Card, UserCard, benefit_preference,
    benefit_redemption,
};
use crate::errors::Result;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema, sea_query::Index,
};
use std::path::Path;
use tracing::{debug, info, instrument};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/card_perks.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable, falling
/// back to a local `SQLite` file.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// The file path of a `sqlite://` URL, or `None` for in-memory databases.
fn sqlite_file_path(database_url: &str) -> Option<&Path> {
    let rest = database_url.strip_prefix("sqlite:")?;
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.contains(":memory:") {
        return None;
    }
    Some(Path::new(path))
}

/// Connects to the database named by [`get_database_url`], creating the
/// parent directory of a `SQLite` file first.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    if let Some(parent) = sqlite_file_path(&database_url).and_then(Path::parent)
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    debug!("Connecting to database at {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

async fn create_table_for<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all tables and unique indexes if they do not exist yet.
#[instrument(skip(db))]
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table_for(db, &schema, Card).await?;
    create_table_for(db, &schema, Benefit).await?;
    create_table_for(db, &schema, UserCard).await?;
    create_table_for(db, &schema, BenefitRedemption).await?;
    create_table_for(db, &schema, BenefitPreference).await?;

    let ledger_period_index = Index::create()
        .name("idx_unique_redemption_period")
        .table(BenefitRedemption)
        .col(benefit_redemption::Column::UserCardId)
        .col(benefit_redemption::Column::BenefitId)
        .col(benefit_redemption::Column::PeriodKey)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&ledger_period_index)).await?;

    let preference_index = Index::create()
        .name("idx_unique_benefit_preference")
        .table(BenefitPreference)
        .col(benefit_preference::Column::UserCardId)
        .col(benefit_preference::Column::BenefitId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&preference_index)).await?;

    info!("Database tables and unique indexes ensured");
    Ok(())
}
