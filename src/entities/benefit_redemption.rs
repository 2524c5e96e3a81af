//! Benefit redemption entity - The ledger row for one (user card, benefit, period).
//!
//! `period_key` is the canonical text form of the period and is covered by the
//! unique index `(user_card_id, benefit_id, period_key)`. The `period_*` columns
//! repeat its components for querying; at most one of month, quarter and half is
//! set.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Benefit redemption database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "benefit_redemptions")]
pub struct Model {
    /// Unique identifier for the ledger row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the user card the benefit was redeemed on
    pub user_card_id: i64,
    /// ID of the redeemed benefit
    pub benefit_id: i64,
    /// Canonical period text (`2024`, `2024-03`, `2024-Q1`, `2024-H2`, `one-time`)
    pub period_key: String,
    /// Calendar year, or anniversary index for card-year benefits
    pub period_year: i32,
    /// Month 1-12 for monthly benefits
    pub period_month: Option<i32>,
    /// Quarter 1-4 for quarterly benefits
    pub period_quarter: Option<i32>,
    /// Half 1-2 for biannual benefits
    pub period_half: Option<i32>,
    /// Accumulated amount redeemed in the period, as canonical decimal text
    pub amount_redeemed: String,
    /// When the period was first redeemed
    pub redeemed_at: DateTimeUtc,
}

/// Defines relationships between `BenefitRedemption` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each ledger row belongs to one user card
    #[sea_orm(
        belongs_to = "super::user_card::Entity",
        from = "Column::UserCardId",
        to = "super::user_card::Column::Id",
        on_delete = "Cascade"
    )]
    UserCard,
    /// Each ledger row belongs to one benefit
    #[sea_orm(
        belongs_to = "super::benefit::Entity",
        from = "Column::BenefitId",
        to = "super::benefit::Column::Id",
        on_delete = "Cascade"
    )]
    Benefit,
}

impl Related<super::user_card::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserCard.def()
    }
}

impl Related<super::benefit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Benefit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
