//! Batch loading of everything the summary views need for one user.

use crate::{
    entities::{
        Benefit, BenefitPreference, BenefitRedemption, Card, UserCard, benefit, benefit_preference,
        benefit_redemption, card, user_card,
    },
    errors::Result,
    models::{self, convert_all},
};
use sea_orm::{QueryOrder, prelude::*};
use tracing::debug;

/// All rows belonging to one user's profile, plus the catalog rows they reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Catalog cards held by the user
    pub cards: Vec<models::Card>,
    /// Benefits of those cards
    pub benefits: Vec<models::Benefit>,
    /// The user's cards
    pub user_cards: Vec<models::UserCard>,
    /// Ledger rows of the user's cards, every period
    pub redemptions: Vec<models::Redemption>,
    /// Stored preferences of the user's cards
    pub preferences: Vec<models::Preference>,
}

/// Loads a user's snapshot with one query per table.
pub async fn load_user_snapshot<C>(db: &C, user_id: &str) -> Result<Snapshot>
where
    C: ConnectionTrait,
{
    let user_cards: Vec<models::UserCard> = UserCard::find()
        .filter(user_card::Column::UserId.eq(user_id))
        .order_by_asc(user_card::Column::CreatedAt)
        .order_by_asc(user_card::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    if user_cards.is_empty() {
        return Ok(Snapshot::default());
    }

    let mut card_ids: Vec<i64> = user_cards.iter().map(|uc| uc.card_id).collect();
    card_ids.sort_unstable();
    card_ids.dedup();
    let user_card_ids: Vec<i64> = user_cards.iter().map(|uc| uc.id).collect();

    let cards = Card::find()
        .filter(card::Column::Id.is_in(card_ids.clone()))
        .all(db)
        .await?;
    let benefits = Benefit::find()
        .filter(benefit::Column::CardId.is_in(card_ids))
        .order_by_asc(benefit::Column::Name)
        .all(db)
        .await?;
    let redemptions = BenefitRedemption::find()
        .filter(benefit_redemption::Column::UserCardId.is_in(user_card_ids.clone()))
        .all(db)
        .await?;
    let preferences = BenefitPreference::find()
        .filter(benefit_preference::Column::UserCardId.is_in(user_card_ids))
        .all(db)
        .await?;

    debug!(
        "Loaded snapshot for {}: {} user cards, {} benefits, {} redemptions",
        user_id,
        user_cards.len(),
        benefits.len(),
        redemptions.len()
    );

    Ok(Snapshot {
        cards: convert_all(cards)?,
        benefits: convert_all(benefits)?,
        user_cards,
        redemptions: convert_all(redemptions)?,
        preferences: preferences.into_iter().map(Into::into).collect(),
    })
}
