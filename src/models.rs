//! Domain value objects.
//!
//! These are the typed views of the stored rows that the engine works with.
//! Conversion from the SeaORM models parses money and schedule text and fails
//! fast on anything that does not decode.

use crate::{
    core::period::{PeriodKey, Schedule},
    entities::{benefit, benefit_preference, benefit_redemption, card, user_card},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Parses a stored money column.
pub(crate) fn parse_money(field: &'static str, raw: &str) -> Result<Decimal> {
    raw.trim()
        .parse::<Decimal>()
        .map_err(|_| Error::InvalidStoredValue {
            field,
            value: raw.to_string(),
        })
}

/// Canonical text used to store a money amount.
pub(crate) fn money_text(amount: Decimal) -> String {
    amount.normalize().to_string()
}

/// A card from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Catalog ID
    pub id: i64,
    /// Display name, unique in the catalog
    pub name: String,
    /// Issuing bank
    pub issuer: String,
    /// Optional card art
    pub image_url: Option<String>,
    /// Yearly fee charged for the card
    pub annual_fee: Decimal,
}

impl TryFrom<card::Model> for Card {
    type Error = Error;

    fn try_from(model: card::Model) -> Result<Self> {
        Ok(Self {
            annual_fee: parse_money("cards.annual_fee", &model.annual_fee)?,
            id: model.id,
            name: model.name,
            issuer: model.issuer,
            image_url: model.image_url,
        })
    }
}

/// A monetary allowance attached to a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Benefit {
    /// Catalog ID
    pub id: i64,
    /// Card offering the benefit
    pub card_id: i64,
    /// Display name
    pub name: String,
    /// Optional details
    pub description: Option<String>,
    /// Value per period, always positive
    pub value: Decimal,
    /// How often the value resets
    pub schedule: Schedule,
}

impl TryFrom<benefit::Model> for Benefit {
    type Error = Error;

    fn try_from(model: benefit::Model) -> Result<Self> {
        let value = parse_money("benefits.value", &model.value)?;
        if value <= Decimal::ZERO {
            return Err(Error::InvalidStoredValue {
                field: "benefits.value",
                value: model.value,
            });
        }

        Ok(Self {
            schedule: model.schedule.parse()?,
            value,
            id: model.id,
            card_id: model.card_id,
            name: model.name,
            description: model.description,
        })
    }
}

/// A catalog card held by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCard {
    /// Profile entry ID
    pub id: i64,
    /// Owner
    pub user_id: String,
    /// Catalog card held
    pub card_id: i64,
    /// Anchor for card-year periods
    pub card_open_date: NaiveDate,
    /// Optional user-chosen name
    pub nickname: Option<String>,
}

impl From<user_card::Model> for UserCard {
    fn from(model: user_card::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            card_id: model.card_id,
            card_open_date: model.card_open_date,
            nickname: model.nickname,
        }
    }
}

/// Accumulated redemption of one benefit on one user card within one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    /// Ledger row ID
    pub id: i64,
    /// User card the benefit was redeemed on
    pub user_card_id: i64,
    /// Redeemed benefit
    pub benefit_id: i64,
    /// Period the row accumulates
    pub period: PeriodKey,
    /// Total redeemed in the period so far
    pub amount_redeemed: Decimal,
    /// When the period was first redeemed
    pub redeemed_at: DateTime<Utc>,
}

impl TryFrom<benefit_redemption::Model> for Redemption {
    type Error = Error;

    fn try_from(model: benefit_redemption::Model) -> Result<Self> {
        Ok(Self {
            period: PeriodKey::from_columns(
                &model.period_key,
                model.period_year,
                model.period_month,
                model.period_quarter,
                model.period_half,
            )?,
            amount_redeemed: parse_money(
                "benefit_redemptions.amount_redeemed",
                &model.amount_redeemed,
            )?,
            id: model.id,
            user_card_id: model.user_card_id,
            benefit_id: model.benefit_id,
            redeemed_at: model.redeemed_at,
        })
    }
}

/// Display flags for one benefit on one user card.
///
/// `id` is `None` for the defaults returned when nothing has been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    /// Stored row ID, `None` when not yet persisted
    pub id: Option<i64>,
    /// User card the flags apply to
    pub user_card_id: i64,
    /// Benefit the flags apply to
    pub benefit_id: i64,
    /// Report the benefit as fully used every period
    pub auto_redeem: bool,
    /// Leave the benefit out of lists and annual totals
    pub hidden: bool,
}

impl Preference {
    /// The unsaved default: both flags off.
    #[must_use]
    pub const fn default_for(user_card_id: i64, benefit_id: i64) -> Self {
        Self {
            id: None,
            user_card_id,
            benefit_id,
            auto_redeem: false,
            hidden: false,
        }
    }
}

impl From<benefit_preference::Model> for Preference {
    fn from(model: benefit_preference::Model) -> Self {
        Self {
            id: Some(model.id),
            user_card_id: model.user_card_id,
            benefit_id: model.benefit_id,
            auto_redeem: model.auto_redeem,
            hidden: model.hidden,
        }
    }
}

/// Converts a list of stored rows, failing on the first row that does not decode.
pub(crate) fn convert_all<M, T>(models: Vec<M>) -> Result<Vec<T>>
where
    T: TryFrom<M, Error = Error>,
{
    models.into_iter().map(T::try_from).collect()
}
