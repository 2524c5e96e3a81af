//! User card entity - A catalog card held by a user.
//!
//! The `card_open_date` anchors card-year benefit periods.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User card database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_cards")]
pub struct Model {
    /// Unique identifier for the user card
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of this card
    pub user_id: String,
    /// ID of the catalog card
    pub card_id: i64,
    /// Date the account was opened
    pub card_open_date: Date,
    /// Optional user-chosen nickname
    pub nickname: Option<String>,
    /// When the card was added to the profile
    pub created_at: DateTimeUtc,
    /// When the card was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `UserCard` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each user card refers to one catalog card
    #[sea_orm(
        belongs_to = "super::card::Entity",
        from = "Column::CardId",
        to = "super::card::Column::Id"
    )]
    Card,
    /// One user card has many ledger rows
    #[sea_orm(has_many = "super::benefit_redemption::Entity")]
    Redemptions,
    /// One user card has many benefit preferences
    #[sea_orm(has_many = "super::benefit_preference::Entity")]
    Preferences,
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

impl Related<super::benefit_preference::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Preferences.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
