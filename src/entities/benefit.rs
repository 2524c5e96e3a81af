//! Benefit entity - A monetary allowance attached to a card.
//!
//! The `schedule` column holds one of `calendar_year`, `card_year`, `monthly`,
//! `quarterly`, `biannual` or `one_time`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Benefit database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "benefits")]
pub struct Model {
    /// Unique identifier for the benefit
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the card offering this benefit
    pub card_id: i64,
    /// Human-readable name (e.g., "Dining credit")
    pub name: String,
    /// Optional longer description
    pub description: Option<String>,
    /// Value per period as canonical decimal text
    pub value: String,
    /// Recurrence schedule name
    pub schedule: String,
    /// When the benefit was added to the catalog
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Benefit and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each benefit belongs to one card
    #[sea_orm(
        belongs_to = "super::card::Entity",
        from = "Column::CardId",
        to = "super::card::Column::Id",
        on_delete = "Cascade"
    )]
    Card,
    /// One benefit has many ledger rows
    #[sea_orm(has_many = "super::benefit_redemption::Entity")]
    Redemptions,
}

impl Related<super::card::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Card.def()
    }
}

impl Related<super::benefit_redemption::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Redemptions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
