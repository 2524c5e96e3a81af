//! Preference overlay - Per (user card, benefit) display flags.
//!
//! Preferences never touch the ledger. They only change how a benefit is
//! presented and counted: `auto_redeem` reports the benefit as fully used
//! every period, `hidden` drops it from availability lists and annual totals.
//! A missing row means both flags are off, and rows are created lazily on the
//! first update.

use crate::{
    core::{catalog, user_card},
    entities::{BenefitPreference, benefit_preference},
    errors::Result,
    models::{Benefit, Preference},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{Set, prelude::*};
use tracing::{info, instrument};

/// The flags in effect for one benefit after applying any stored preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedPreference {
    /// Report the benefit as fully used every period
    pub auto_redeem: bool,
    /// Leave the benefit out of lists and annual totals
    pub hidden: bool,
}

/// Resolves the flags for `benefit`. A preference stored for a different
/// benefit is ignored.
#[must_use]
pub fn resolve(benefit: &Benefit, preference: Option<&Preference>) -> ResolvedPreference {
    preference
        .filter(|p| p.benefit_id == benefit.id)
        .map_or_else(ResolvedPreference::default, |p| ResolvedPreference {
            auto_redeem: p.auto_redeem,
            hidden: p.hidden,
        })
}

/// Applies `auto_redeem` to computed `(redeemed, remaining)` amounts.
#[must_use]
pub fn apply_auto_redeem(
    benefit: &Benefit,
    redeemed: Decimal,
    remaining: Decimal,
    auto_redeem: bool,
) -> (Decimal, Decimal) {
    if auto_redeem {
        (benefit.value, Decimal::ZERO)
    } else {
        (redeemed, remaining)
    }
}

/// A partial preference change. Flags left as `None` keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreferenceUpdate {
    /// New auto-redeem flag
    pub auto_redeem: Option<bool>,
    /// New hidden flag
    pub hidden: Option<bool>,
}

async fn find_stored<C>(
    db: &C,
    user_card_id: i64,
    benefit_id: i64,
) -> Result<Option<benefit_preference::Model>>
where
    C: ConnectionTrait,
{
    BenefitPreference::find()
        .filter(benefit_preference::Column::UserCardId.eq(user_card_id))
        .filter(benefit_preference::Column::BenefitId.eq(benefit_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Gets the preference for a benefit on a user's card, or the defaults if
/// none has been stored.
pub async fn get_preference<C>(
    db: &C,
    user_id: &str,
    user_card_id: i64,
    benefit_id: i64,
) -> Result<Preference>
where
    C: ConnectionTrait,
{
    let user_card = user_card::get_owned_user_card(db, user_id, user_card_id).await?;
    let stored = find_stored(db, user_card.id, benefit_id).await?;
    Ok(stored.map_or_else(
        || Preference::default_for(user_card.id, benefit_id),
        Preference::from,
    ))
}

/// Updates the supplied flags of a preference, creating the row if needed.
///
/// # Errors
/// [`crate::errors::Error::NotFound`] if the user card is not the user's, or the
/// benefit is not offered by that card.
#[instrument(skip(db))]
pub async fn update_preference<C>(
    db: &C,
    user_id: &str,
    user_card_id: i64,
    benefit_id: i64,
    update: PreferenceUpdate,
) -> Result<Preference>
where
    C: ConnectionTrait,
{
    let user_card = user_card::get_owned_user_card(db, user_id, user_card_id).await?;
    let benefit = catalog::get_benefit_for_card(db, user_card.card_id, benefit_id).await?;
    let now = Utc::now();

    let saved = match find_stored(db, user_card.id, benefit.id).await? {
        Some(existing) => {
            let mut active: benefit_preference::ActiveModel = existing.into();
            if let Some(auto_redeem) = update.auto_redeem {
                active.auto_redeem = Set(auto_redeem);
            }
            if let Some(hidden) = update.hidden {
                active.hidden = Set(hidden);
            }
            active.updated_at = Set(now);
            active.update(db).await?
        }
        None => {
            benefit_preference::ActiveModel {
                user_card_id: Set(user_card.id),
                benefit_id: Set(benefit.id),
                auto_redeem: Set(update.auto_redeem.unwrap_or(false)),
                hidden: Set(update.hidden.unwrap_or(false)),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };

    info!(
        "Preference for benefit {} on user card {}: auto_redeem={}, hidden={}",
        benefit.id, user_card.id, saved.auto_redeem, saved.hidden
    );
    Ok(saved.into())
}
