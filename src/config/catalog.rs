//! Card catalog loading from catalog.toml
//!
//! The catalog file lists the cards and their benefits used to seed the
//! database on first run, or when new cards are added to the file.

use crate::core::period::Schedule;
use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

const DEFAULT_CATALOG_PATH: &str = "catalog.toml";

/// Configuration structure representing the entire catalog.toml file
#[derive(Debug, Deserialize)]
pub struct CatalogConfig {
    /// Cards to seed
    #[serde(default)]
    pub cards: Vec<CardConfig>,
}

/// Configuration for a single card
#[derive(Debug, Deserialize, Clone)]
pub struct CardConfig {
    /// Card name, used to match existing rows
    pub name: String,
    /// Issuing bank
    pub issuer: String,
    /// Optional card art
    #[serde(default)]
    pub image_url: Option<String>,
    /// Yearly fee, zero when omitted
    #[serde(default)]
    pub annual_fee: Decimal,
    /// Benefits offered by the card
    #[serde(default)]
    pub benefits: Vec<BenefitConfig>,
}

/// Configuration for a single benefit of a card
#[derive(Debug, Deserialize, Clone)]
pub struct BenefitConfig {
    /// Benefit name, unique within its card
    pub name: String,
    /// Optional details
    #[serde(default)]
    pub description: Option<String>,
    /// Value per period, must be positive
    pub value: Decimal,
    /// Recurrence, e.g. `"monthly"`
    pub schedule: Schedule,
}

impl CatalogConfig {
    /// Checks the rules the engine relies on: non-empty names, positive benefit
    /// values and non-negative fees.
    pub fn validate(&self) -> Result<()> {
        for card in &self.cards {
            if card.name.trim().is_empty() {
                return Err(Error::Config {
                    message: "Card name cannot be empty".to_string(),
                });
            }
            if card.annual_fee < Decimal::ZERO {
                return Err(Error::Config {
                    message: format!("Card {:?} has a negative annual fee", card.name),
                });
            }
            for benefit in &card.benefits {
                if benefit.name.trim().is_empty() {
                    return Err(Error::Config {
                        message: format!("Card {:?} has a benefit without a name", card.name),
                    });
                }
                if benefit.value <= Decimal::ZERO {
                    return Err(Error::Config {
                        message: format!(
                            "Benefit {:?} on card {:?} must have a positive value",
                            benefit.name, card.name
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Loads and validates the catalog from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid or a schedule name is unknown
/// - A card or benefit breaks the rules in [`CatalogConfig::validate`]
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<CatalogConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Loading catalog from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read catalog file {}: {e}", path_ref.display()),
    })?;
    parse_catalog(&contents)
}

/// Parses and validates catalog TOML.
pub fn parse_catalog(contents: &str) -> Result<CatalogConfig> {
    let catalog: CatalogConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse catalog.toml: {e}"),
    })?;
    catalog.validate()?;
    Ok(catalog)
}

/// Loads the catalog from `CATALOG_PATH`, or ./catalog.toml when unset.
pub fn load_default_catalog() -> Result<CatalogConfig> {
    let path =
        std::env::var("CATALOG_PATH").unwrap_or_else(|_| DEFAULT_CATALOG_PATH.to_string());
    load_catalog(path)
}
