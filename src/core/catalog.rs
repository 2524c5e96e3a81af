//! Catalog business logic - read access to cards and benefits, plus seeding.
//!
//! The catalog is owned elsewhere; the engine only reads it. Seeding inserts
//! cards and benefits from [`CatalogConfig`] that are not present yet (matched
//! by name) and never modifies existing rows.

use crate::{
    config::catalog::CatalogConfig,
    entities::{Benefit, Card, benefit, card},
    errors::{Error, Result},
    models::{self, convert_all},
};
use chrono::Utc;
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr};
use std::collections::HashMap;
use tracing::{info, instrument};

/// A catalog card with the number of benefits it offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardListing {
    /// The card
    pub card: models::Card,
    /// Number of benefits it offers
    pub benefits_count: u64,
}

/// A catalog card with all of its benefits, ordered by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardWithBenefits {
    /// The card
    pub card: models::Card,
    /// Its benefits, ordered by name
    pub benefits: Vec<models::Benefit>,
}

/// Counts of rows created by [`seed_catalog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Cards inserted
    pub cards_created: usize,
    /// Benefits inserted, on new or existing cards
    pub benefits_created: usize,
}

/// Converts a `COUNT(*)` result, which is never negative for a sound database.
fn benefit_count(raw: i64) -> Result<u64> {
    u64::try_from(raw).map_err(|_| Error::InvalidStoredValue {
        field: "benefits_count",
        value: raw.to_string(),
    })
}

/// Lists every card ordered by name, with its benefit count.
pub async fn list_cards<C>(db: &C) -> Result<Vec<CardListing>>
where
    C: ConnectionTrait,
{
    let cards = Card::find().order_by_asc(card::Column::Name).all(db).await?;

    let counts: HashMap<i64, i64> = Benefit::find()
        .select_only()
        .column(benefit::Column::CardId)
        .column_as(Expr::col(benefit::Column::Id).count(), "benefits_count")
        .group_by(benefit::Column::CardId)
        .into_tuple::<(i64, i64)>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    cards
        .into_iter()
        .map(|model| {
            let benefits_count = benefit_count(counts.get(&model.id).copied().unwrap_or(0))?;
            Ok(CardListing {
                card: models::Card::try_from(model)?,
                benefits_count,
            })
        })
        .collect()
}

/// Finds a card by ID.
pub async fn get_card<C>(db: &C, card_id: i64) -> Result<models::Card>
where
    C: ConnectionTrait,
{
    Card::find_by_id(card_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("card", card_id))?
        .try_into()
}

/// Finds a card and its benefits ordered by name.
pub async fn get_card_with_benefits<C>(db: &C, card_id: i64) -> Result<CardWithBenefits>
where
    C: ConnectionTrait,
{
    let card = get_card(db, card_id).await?;
    let benefits = Benefit::find()
        .filter(benefit::Column::CardId.eq(card_id))
        .order_by_asc(benefit::Column::Name)
        .all(db)
        .await?;

    Ok(CardWithBenefits {
        card,
        benefits: convert_all(benefits)?,
    })
}

/// Finds a benefit that is offered by `card_id`.
///
/// A benefit of another card is reported as not found.
pub async fn get_benefit_for_card<C>(db: &C, card_id: i64, benefit_id: i64) -> Result<models::Benefit>
where
    C: ConnectionTrait,
{
    Benefit::find_by_id(benefit_id)
        .filter(benefit::Column::CardId.eq(card_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("benefit", benefit_id))?
        .try_into()
}

/// Inserts the cards and benefits of `catalog` that are missing from the database.
///
/// Cards are matched by name, benefits by name within their card. Everything
/// runs in one transaction.
#[instrument(skip(db, catalog))]
pub async fn seed_catalog(db: &DatabaseConnection, catalog: &CatalogConfig) -> Result<SeedReport> {
    catalog.validate()?;

    let txn = db.begin().await?;
    let mut report = SeedReport::default();
    let now = Utc::now();

    for card_config in &catalog.cards {
        let name = card_config.name.trim();
        let existing = Card::find()
            .filter(card::Column::Name.eq(name))
            .one(&txn)
            .await?;

        let card_id = if let Some(existing) = existing {
            existing.id
        } else {
            let inserted = card::ActiveModel {
                name: Set(name.to_string()),
                issuer: Set(card_config.issuer.clone()),
                image_url: Set(card_config.image_url.clone()),
                annual_fee: Set(models::money_text(card_config.annual_fee)),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            report.cards_created += 1;
            inserted.id
        };

        let existing_names: Vec<String> = Benefit::find()
            .filter(benefit::Column::CardId.eq(card_id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|b| b.name)
            .collect();

        for benefit_config in &card_config.benefits {
            let benefit_name = benefit_config.name.trim();
            if existing_names.iter().any(|n| n == benefit_name) {
                continue;
            }

            benefit::ActiveModel {
                card_id: Set(card_id),
                name: Set(benefit_name.to_string()),
                description: Set(benefit_config.description.clone()),
                value: Set(models::money_text(benefit_config.value)),
                schedule: Set(benefit_config.schedule.as_str().to_string()),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            report.benefits_created += 1;
        }
    }

    txn.commit().await?;

    info!(
        "Catalog seeded: {} cards and {} benefits created",
        report.cards_created, report.benefits_created
    );
    Ok(report)
}
