//! Shared test utilities for the benefit engine.
//!
//! This module provides common helper functions for setting up test databases
//! and creating catalog rows and user cards with sensible defaults.

use crate::{
    entities::{benefit, card, user_card},
    errors::Result,
    models,
};
use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Shorthand for a calendar date.
///
/// # Panics
/// If the date does not exist.
#[allow(clippy::unwrap_used)]
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Creates a test card with no annual fee.
pub async fn create_test_card(db: &DatabaseConnection, name: &str) -> Result<models::Card> {
    create_custom_card(db, name, "0").await
}

/// Creates a test card with a custom annual fee.
pub async fn create_custom_card(
    db: &DatabaseConnection,
    name: &str,
    annual_fee: &str,
) -> Result<models::Card> {
    card::ActiveModel {
        name: Set(name.to_string()),
        issuer: Set("Test Bank".to_string()),
        image_url: Set(None),
        annual_fee: Set(annual_fee.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?
    .try_into()
}

/// Creates a benefit on `card_id`.
///
/// # Arguments
/// * `value` - Value per period as decimal text, e.g. `"10"` or `"12.50"`
/// * `schedule` - Stored schedule name, e.g. `"monthly"`
pub async fn create_test_benefit(
    db: &DatabaseConnection,
    card_id: i64,
    name: &str,
    value: &str,
    schedule: &str,
) -> Result<models::Benefit> {
    benefit::ActiveModel {
        card_id: Set(card_id),
        name: Set(name.to_string()),
        description: Set(None),
        value: Set(value.to_string()),
        schedule: Set(schedule.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?
    .try_into()
}

/// Adds `card_id` to the profile of `user_id`.
pub async fn create_test_user_card(
    db: &DatabaseConnection,
    user_id: &str,
    card_id: i64,
    card_open_date: NaiveDate,
) -> Result<models::UserCard> {
    let now = Utc::now();
    let model = user_card::ActiveModel {
        user_id: Set(user_id.to_string()),
        card_id: Set(card_id),
        card_open_date: Set(card_open_date),
        nickname: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(model.into())
}

/// Sets up a complete test environment: a card "Gold" with one benefit, held
/// by user "alice" since 2020-01-01.
/// Returns (db, card, benefit, `user_card`) for ledger and summary tests.
pub async fn setup_with_user_card(
    value: &str,
    schedule: &str,
) -> Result<(
    DatabaseConnection,
    models::Card,
    models::Benefit,
    models::UserCard,
)> {
    let db = setup_test_db().await?;
    let card = create_test_card(&db, "Gold").await?;
    let benefit = create_test_benefit(&db, card.id, "Dining", value, schedule).await?;
    let user_card = create_test_user_card(&db, "alice", card.id, date(2020, 1, 1)).await?;
    Ok((db, card, benefit, user_card))
}
