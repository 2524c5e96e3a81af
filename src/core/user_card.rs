//! User card business logic - Adding, editing and removing cards in a user's profile.
//!
//! Every operation is scoped to the calling user. A user card that belongs to
//! someone else is reported as not found.

use crate::{
    core::{catalog, clock::Clock, ledger},
    entities::{
        BenefitPreference, BenefitRedemption, UserCard, benefit_preference, benefit_redemption,
        user_card,
    },
    errors::{Error, Result},
    models,
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// A card to add to a user's profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUserCard {
    /// Catalog card to add
    pub card_id: i64,
    /// Account open date, the card-year anchor
    pub card_open_date: NaiveDate,
    /// Optional nickname, trimmed
    pub nickname: Option<String>,
    /// Benefits to mark fully redeemed for their current period right away
    pub redeemed_benefit_ids: Vec<i64>,
}

/// Changes to a user card. `None` keeps the current value; an empty or
/// whitespace nickname clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserCardChanges {
    /// New open date
    pub card_open_date: Option<NaiveDate>,
    /// New nickname
    pub nickname: Option<String>,
}

fn normalize_nickname(nickname: Option<String>) -> Option<String> {
    nickname
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

async fn find_owned<C>(db: &C, user_id: &str, user_card_id: i64) -> Result<user_card::Model>
where
    C: ConnectionTrait,
{
    UserCard::find_by_id(user_card_id)
        .filter(user_card::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user card", user_card_id))
}

/// Gets a user card owned by `user_id`.
pub async fn get_owned_user_card<C>(
    db: &C,
    user_id: &str,
    user_card_id: i64,
) -> Result<models::UserCard>
where
    C: ConnectionTrait,
{
    find_owned(db, user_id, user_card_id).await.map(Into::into)
}

/// Lists a user's cards in the order they were added.
pub async fn list_user_cards<C>(db: &C, user_id: &str) -> Result<Vec<models::UserCard>>
where
    C: ConnectionTrait,
{
    let cards = UserCard::find()
        .filter(user_card::Column::UserId.eq(user_id))
        .order_by_asc(user_card::Column::CreatedAt)
        .order_by_asc(user_card::Column::Id)
        .all(db)
        .await?;
    Ok(cards.into_iter().map(Into::into).collect())
}

/// Adds a catalog card to a user's profile.
///
/// The benefits in [`NewUserCard::redeemed_benefit_ids`] are marked fully
/// redeemed for the period containing today, in the same transaction.
///
/// # Errors
/// [`Error::NotFound`] if the card, or one of the listed benefits on it, does
/// not exist. Nothing is written in that case.
#[instrument(skip(db, clock, new_card), fields(card_id = new_card.card_id))]
pub async fn add_user_card(
    db: &DatabaseConnection,
    clock: &impl Clock,
    user_id: &str,
    new_card: NewUserCard,
) -> Result<models::UserCard> {
    let card = catalog::get_card(db, new_card.card_id).await?;
    let now = clock.now();

    let txn = db.begin().await?;
    let inserted: models::UserCard = user_card::ActiveModel {
        user_id: Set(user_id.to_string()),
        card_id: Set(card.id),
        card_open_date: Set(new_card.card_open_date),
        nickname: Set(normalize_nickname(new_card.nickname)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?
    .into();

    let mut benefit_ids = new_card.redeemed_benefit_ids;
    benefit_ids.sort_unstable();
    benefit_ids.dedup();

    for benefit_id in benefit_ids {
        let benefit = catalog::get_benefit_for_card(&txn, card.id, benefit_id).await?;
        if ledger::try_redeem(&txn, clock, &benefit, &inserted, None)
            .await?
            .is_none()
        {
            return Err(Error::RedemptionConflict {
                user_card_id: inserted.id,
                benefit_id,
                attempts: 1,
            });
        }
    }

    txn.commit().await?;

    info!(
        "Added card {:?} as user card {} for user {}",
        card.name, inserted.id, user_id
    );
    Ok(inserted)
}

/// Updates the open date and/or nickname of a user's card.
#[instrument(skip(db))]
pub async fn update_user_card<C>(
    db: &C,
    user_id: &str,
    user_card_id: i64,
    changes: UserCardChanges,
) -> Result<models::UserCard>
where
    C: ConnectionTrait,
{
    let existing = find_owned(db, user_id, user_card_id).await?;
    if changes == UserCardChanges::default() {
        return Ok(existing.into());
    }

    let mut active: user_card::ActiveModel = existing.into();
    if let Some(open_date) = changes.card_open_date {
        active.card_open_date = Set(open_date);
    }
    if changes.nickname.is_some() {
        active.nickname = Set(normalize_nickname(changes.nickname));
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(db).await?;
    info!("Updated user card {} for user {}", updated.id, user_id);
    Ok(updated.into())
}

/// Removes a user's card together with its redemptions and preferences.
#[instrument(skip(db))]
pub async fn remove_user_card(
    db: &DatabaseConnection,
    user_id: &str,
    user_card_id: i64,
) -> Result<()> {
    let txn = db.begin().await?;
    let existing = find_owned(&txn, user_id, user_card_id).await?;

    let redemptions = BenefitRedemption::delete_many()
        .filter(benefit_redemption::Column::UserCardId.eq(existing.id))
        .exec(&txn)
        .await?;
    BenefitPreference::delete_many()
        .filter(benefit_preference::Column::UserCardId.eq(existing.id))
        .exec(&txn)
        .await?;
    UserCard::delete_by_id(existing.id).exec(&txn).await?;

    txn.commit().await?;

    info!(
        "Removed user card {} for user {} ({} redemption rows)",
        existing.id, user_id, redemptions.rows_affected
    );
    Ok(())
}
