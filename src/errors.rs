//! Unified error type for the benefit engine.

use rust_decimal::Decimal;
use thiserror::Error;

/// Every failure the engine reports.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid catalog file or environment
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong
        message: String,
    },

    /// Repository failure, passed through unchanged
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The row does not exist, or exists but belongs to another user.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of row, e.g. `"user card"`
        entity: &'static str,
        /// Requested ID
        id: String,
    },

    /// A redemption amount that is not positive or exceeds what is left
    #[error("Invalid amount {amount}: must be greater than 0 and at most the remaining {remaining}")]
    InvalidAmount {
        /// Requested amount
        amount: Decimal,
        /// What was left in the period
        remaining: Decimal,
    },

    /// Unknown schedule or a period key that does not fit any schedule
    #[error("Inconsistent schedule state: {message}")]
    InconsistentSchedule {
        /// What was inconsistent
        message: String,
    },

    /// A stored column that does not decode or breaks a row invariant
    #[error("Invalid stored value for {field}: {value:?}")]
    InvalidStoredValue {
        /// Table and column
        field: &'static str,
        /// Offending value
        value: String,
    },

    /// Concurrent writers kept changing the ledger row
    #[error(
        "Redemption of benefit {benefit_id} on user card {user_card_id} kept conflicting after {attempts} attempts"
    )]
    RedemptionConflict {
        /// User card being redeemed on
        user_card_id: i64,
        /// Benefit being redeemed
        benefit_id: i64,
        /// Attempts made before giving up
        attempts: u32,
    },
}

impl Error {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
