//! Benefit preference entity - Per (user card, benefit) display flags.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Benefit preference database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_benefit_preferences")]
pub struct Model {
    /// Unique identifier for the preference row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the user card the preference applies to
    pub user_card_id: i64,
    /// ID of the benefit the preference applies to
    pub benefit_id: i64,
    /// Treat the benefit as fully used every period
    pub auto_redeem: bool,
    /// Hide the benefit from availability lists and totals
    pub hidden: bool,
    /// When the preference was first written
    pub created_at: DateTimeUtc,
    /// When the preference was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `BenefitPreference` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each preference belongs to one user card
    #[sea_orm(
        belongs_to = "super::user_card::Entity",
        from = "Column::UserCardId",
        to = "super::user_card::Column::Id",
        on_delete = "Cascade"
    )]
    UserCard,
}

impl Related<super::user_card::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserCard.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
