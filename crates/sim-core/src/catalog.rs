//! Structure and settlement catalogs keyed by `(name, level)`.
//!
//! A [`Catalog`] is built explicitly (from YAML or JSON text) and handed to
//! whatever needs it. There is no process-wide registry.

use crate::actors::{Needs, SettlementKind};
use crate::resources::ResourceDelta;
use crate::{ConfigurationError, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One `{name, level}` entry of an upgrade OR-group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureRequirement {
    pub name: String,
    pub level: u32,
}

/// Conditions a settlement must meet before upgrading.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeRequirements {
    #[serde(default)]
    pub needs_required: Needs,
    /// Every group must be satisfied by at least one of its entries.
    #[serde(default)]
    pub structures_required: Vec<Vec<StructureRequirement>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StructureTemplate {
    pub name: String,
    pub level: u32,
    #[serde(default)]
    pub build_cost: ResourceDelta,
    #[serde(default)]
    pub production: ResourceDelta,
    #[serde(default)]
    pub upkeep: ResourceDelta,
    /// Added to the host settlement's needs once built.
    #[serde(default)]
    pub settlement_needs: Needs,
    /// Settlement kind name -> whether this structure may be built there.
    #[serde(default)]
    pub buildable_in: BTreeMap<String, bool>,
}

impl StructureTemplate {
    pub fn is_buildable_in(&self, kind: &SettlementKind) -> bool {
        self.buildable_in.get(&kind.0).copied().unwrap_or(false)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SettlementTemplate {
    pub name: String,
    pub level: u32,
    #[serde(default)]
    pub build_cost: ResourceDelta,
    pub population_base: u64,
    pub population_critical: u64,
    #[serde(default)]
    pub upgrade_requirements: UpgradeRequirements,
}

/// Read-only catalog of templates.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub structures: Vec<StructureTemplate>,
    #[serde(default)]
    pub settlements: Vec<SettlementTemplate>,
}

impl Catalog {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigurationError> {
        let catalog: Catalog =
            serde_yaml::from_str(text).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        catalog.check()?;
        Ok(catalog)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigurationError> {
        let catalog: Catalog =
            serde_json::from_str(text).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        catalog.check()?;
        Ok(catalog)
    }

    /// Reject duplicate `(name, level)` keys and settlements that could never
    /// be rated (zero critical population).
    fn check(&self) -> Result<(), ConfigurationError> {
        let mut seen = BTreeSet::new();
        for s in &self.structures {
            if !seen.insert((s.name.to_lowercase(), s.level)) {
                return Err(ConfigurationError::DuplicateEntry {
                    catalog: "structure",
                    name: s.name.clone(),
                    level: s.level,
                });
            }
        }
        let mut seen = BTreeSet::new();
        for s in &self.settlements {
            if !seen.insert((s.name.to_lowercase(), s.level)) {
                return Err(ConfigurationError::DuplicateEntry {
                    catalog: "settlement",
                    name: s.name.clone(),
                    level: s.level,
                });
            }
            if s.population_critical == 0 {
                return Err(ValidationError::ZeroPopulationCritical(s.name.clone()).into());
            }
        }
        Ok(())
    }

    /// Structure template by case-insensitive name and exact level.
    pub fn structure(&self, name: &str, level: u32) -> Result<&StructureTemplate, ValidationError> {
        self.structures
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name) && s.level == level)
            .ok_or_else(|| ValidationError::MissingCatalogEntry {
                catalog: "structure",
                name: name.to_string(),
                level,
            })
    }

    pub fn settlement(&self, name: &str, level: u32) -> Result<&SettlementTemplate, ValidationError> {
        self.settlements
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name) && s.level == level)
            .ok_or_else(|| ValidationError::MissingCatalogEntry {
                catalog: "settlement",
                name: name.to_string(),
                level,
            })
    }
}
