//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the stored rows the benefit engine reads and writes.
//! Money columns are stored as canonical decimal text and parsed into
//! [`rust_decimal::Decimal`] by the domain models in [`crate::models`].

/// Benefits offered by a catalog card
pub mod benefit;
/// Per user card display flags for a benefit
pub mod benefit_preference;
/// Ledger rows, one per benefit period
pub mod benefit_redemption;
/// Catalog cards
pub mod card;
/// Cards held by users
pub mod user_card;

// Re-export specific types to avoid conflicts
pub use benefit::{Column as BenefitColumn, Entity as Benefit, Model as BenefitModel};
pub use benefit_preference::{
    Column as BenefitPreferenceColumn, Entity as BenefitPreference,
    Model as BenefitPreferenceModel,
};
pub use benefit_redemption::{
    Column as BenefitRedemptionColumn, Entity as BenefitRedemption,
    Model as BenefitRedemptionModel,
};
pub use card::{Column as CardColumn, Entity as Card, Model as CardModel};
pub use user_card::{Column as UserCardColumn, Entity as UserCard, Model as UserCardModel};
