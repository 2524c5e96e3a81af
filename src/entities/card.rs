//! Card entity - A financial card in the catalog.
//!
//! Cards are read-only to the engine apart from catalog seeding. Each card owns
//! a set of benefits and can be added to many user profiles.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Card database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cards")]
pub struct Model {
    /// Unique identifier for the card
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name of the card (e.g., "Sapphire Reserve")
    #[sea_orm(unique)]
    pub name: String,
    /// Issuing bank
    pub issuer: String,
    /// Optional image reference
    pub image_url: Option<String>,
    /// Annual fee as canonical decimal text
    pub annual_fee: String,
    /// When the card was added to the catalog
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Card and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One card has many benefits
    #[sea_orm(has_many = "super::benefit::Entity")]
    Benefits,
    /// One card is held by many users
    #[sea_orm(has_many = "super::user_card::Entity")]
    UserCards,
}

impl Related<super::benefit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Benefits.def()
    }
}

impl Related<super::user_card::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserCards.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
