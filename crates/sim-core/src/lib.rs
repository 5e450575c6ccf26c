#![deny(warnings)]

//! Core domain model for the barony economy.
//!
//! This crate defines the serializable types shared by the ledger and the
//! tick runtime: resources, actor models, catalogs, configuration, and the
//! validation errors that guard them.

pub mod actors;
pub mod catalog;
pub mod resources;

pub use actors::{
    ActorId, ActorKind, Creature, DomesticIndex, Estate, Homeward, Needs, Npc, NpcTier,
    Settlement, SettlementKind, Structure,
};
pub use catalog::{
    Catalog, SettlementTemplate, StructureRequirement, StructureTemplate, UpgradeRequirements,
};
pub use resources::{Resource, ResourceBundle, ResourceDelta};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors: fatal to the operation that hit them, not the process.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// No catalog template for the `(name, level)` pair.
    #[error("no {catalog} entry for {name} level {level}")]
    MissingCatalogEntry {
        catalog: &'static str,
        name: String,
        level: u32,
    },
    /// Two actors rendered to the same namespaced id.
    #[error("duplicate actor id: {0}")]
    DuplicateActor(String),
    /// Overpopulation unrest divides by the critical population.
    #[error("settlement {0} has zero critical population")]
    ZeroPopulationCritical(String),
    /// No actor with this name in the roster.
    #[error("unknown {0}")]
    UnknownActor(String),
    /// Catalog forbids this structure in this settlement kind.
    #[error("{structure} cannot be built in a {settlement_kind}")]
    NotBuildable {
        structure: String,
        settlement_kind: String,
    },
    /// Operation input that is out of range or empty.
    #[error("malformed input: {0}")]
    MalformedInput(String),
    /// Configuration value outside its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors loading catalogs or configuration text.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("failed to parse: {0}")]
    Parse(String),
    #[error("duplicate {catalog} entry {name} level {level}")]
    DuplicateEntry {
        catalog: &'static str,
        name: String,
        level: u32,
    },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Tunable constants of the monthly economy.
///
/// Defaults reproduce the tabletop rules: 10% tax on subtotals of 10 or more,
/// five unrest per 100% overpopulation, two turns for characters, seven
/// creature levels per homeward level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Fraction of a taxable subtotal paid as tax.
    pub tax_rate: Decimal,
    /// Subtotals below this are never taxed.
    pub tax_threshold: i64,
    /// Unrest per unit of overpopulation ratio.
    pub overpopulation_unrest_factor: Decimal,
    pub character_turns: u32,
    pub npc_base_turns: u32,
    pub npc_tier2_turns: u32,
    /// Base turns of a City or Fortress.
    pub settlement_seat_turns: u32,
    /// Stability must exceed this (with no unrest) for the bonus turn.
    pub stability_bonus_threshold: Decimal,
    /// Creature levels needed per homeward level.
    pub homeward_levels_per_turn: u32,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(10, 2),
            tax_threshold: 10,
            overpopulation_unrest_factor: Decimal::from(5),
            character_turns: 2,
            npc_base_turns: 1,
            npc_tier2_turns: 2,
            settlement_seat_turns: 2,
            stability_bonus_threshold: Decimal::from(10),
            homeward_levels_per_turn: 7,
        }
    }
}

impl EconomyConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigurationError> {
        let cfg: EconomyConfig =
            serde_yaml::from_str(text).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.tax_rate < Decimal::ZERO || self.tax_rate > Decimal::ONE {
            return Err(ValidationError::InvalidConfig(format!(
                "tax_rate {} outside [0,1]",
                self.tax_rate
            )));
        }
        if self.tax_threshold < 0 {
            return Err(ValidationError::InvalidConfig(
                "tax_threshold must be >= 0".to_string(),
            ));
        }
        if self.overpopulation_unrest_factor < Decimal::ZERO {
            return Err(ValidationError::InvalidConfig(
                "overpopulation_unrest_factor must be >= 0".to_string(),
            ));
        }
        if self.homeward_levels_per_turn == 0 {
            return Err(ValidationError::InvalidConfig(
                "homeward_levels_per_turn must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = EconomyConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.tax_rate, Decimal::new(1, 1));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg = EconomyConfig::from_yaml_str("tax_threshold: 20\ncharacter_turns: 3\n").unwrap();
        assert_eq!(cfg.tax_threshold, 20);
        assert_eq!(cfg.character_turns, 3);
        assert_eq!(cfg.homeward_levels_per_turn, 7);
    }

    #[test]
    fn bad_yaml_reports_parse_error() {
        assert!(matches!(
            EconomyConfig::from_yaml_str("tax_threshold: [oops"),
            Err(ConfigurationError::Parse(_))
        ));
    }

    #[test]
    fn zero_homeward_divisor_rejected() {
        let cfg = EconomyConfig {
            homeward_levels_per_turn: 0,
            ..EconomyConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ValidationError::InvalidConfig(_))));
    }

    #[test]
    fn config_snapshot_roundtrip() {
        let cfg = EconomyConfig::default();
        let s = serde_json::to_string_pretty(&cfg).unwrap();
        let back: EconomyConfig = serde_json::from_str(&s).unwrap();
        assert_eq!(back, cfg);
    }

    proptest! {
        #[test]
        fn tax_rate_in_unit_interval_is_valid(pct in 0i64..=100) {
            let cfg = EconomyConfig { tax_rate: Decimal::new(pct, 2), ..EconomyConfig::default() };
            prop_assert!(cfg.validate().is_ok());
        }

        #[test]
        fn tax_rate_above_one_is_invalid(pct in 101i64..1000) {
            let cfg = EconomyConfig { tax_rate: Decimal::new(pct, 2), ..EconomyConfig::default() };
            prop_assert!(cfg.validate().is_err());
        }
    }
}
