//! Core business logic - framework-agnostic benefit period and redemption operations.

/// Catalog reads and seeding
pub mod catalog;

/// Source of the current date
pub mod clock;

/// Redemption ledger: redeem and un-redeem within the current period
pub mod ledger;

/// Period keys, reset dates and periodicity per schedule
pub mod period;

/// Auto-redeem and hidden flags per user card benefit
pub mod preference;

/// Batch loading of a user's rows
pub mod snapshot;

/// Dashboard and yearly summaries
pub mod summary;

/// User card profile management
pub mod user_card;
