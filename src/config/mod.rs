/// Card catalog loading from catalog.toml
pub mod catalog;

/// Database configuration and connection management
pub mod database;
