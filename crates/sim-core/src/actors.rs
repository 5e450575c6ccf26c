//! Actor models: the things that receive turns each tick.
//!
//! These are plain data with the predicates the turn policy needs
//! (`is_active`, `creature_total`, upgrade checks). The policy itself lives
//! in the runtime crate.

use crate::catalog::{SettlementTemplate, StructureTemplate, UpgradeRequirements};
use crate::resources::{ResourceBundle, ResourceDelta};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Actor kinds. Each kind owns a separate id namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActorKind {
    Character,
    Npc,
    Settlement,
    Structure,
    Homeward,
}

impl ActorKind {
    pub const ALL: [ActorKind; 5] = [
        ActorKind::Character,
        ActorKind::Npc,
        ActorKind::Settlement,
        ActorKind::Structure,
        ActorKind::Homeward,
    ];

    /// Id prefix used in the rendered form `prefix:name`.
    pub fn prefix(self) -> &'static str {
        match self {
            ActorKind::Character => "pc",
            ActorKind::Npc => "npc",
            ActorKind::Settlement => "settlement",
            ActorKind::Structure => "structure",
            ActorKind::Homeward => "homeward",
        }
    }
}

/// Globally unique actor id, namespaced by kind.
///
/// Serialized as `"kind:name"` so it can key JSON maps.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ActorId {
    pub kind: ActorKind,
    pub name: String,
}

impl ActorId {
    pub fn new(kind: ActorKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.prefix(), self.name)
    }
}

impl FromStr for ActorId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, name) = s
            .split_once(':')
            .ok_or_else(|| format!("actor id `{s}` has no kind prefix"))?;
        let kind = ActorKind::ALL
            .into_iter()
            .find(|k| k.prefix() == prefix)
            .ok_or_else(|| format!("unknown actor kind `{prefix}`"))?;
        Ok(ActorId::new(kind, name))
    }
}

impl From<ActorId> for String {
    fn from(id: ActorId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ActorId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Settlement needs on a common scale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Needs {
    #[serde(rename = "Medical", default)]
    pub medical: u32,
    #[serde(rename = "Education", default)]
    pub education: u32,
    #[serde(rename = "Morale", default)]
    pub morale: u32,
}

impl Needs {
    /// Mean of the three needs.
    pub fn mean(&self) -> Decimal {
        let total = Decimal::from(self.medical) + Decimal::from(self.education) + Decimal::from(self.morale);
        total / Decimal::from(3)
    }

    /// Add `other` to each need, saturating.
    pub fn raise(&mut self, other: &Needs) {
        self.medical = self.medical.saturating_add(other.medical);
        self.education = self.education.saturating_add(other.education);
        self.morale = self.morale.saturating_add(other.morale);
    }

    /// True when every need is at least the corresponding `required` value.
    pub fn satisfies(&self, required: &Needs) -> bool {
        self.medical >= required.medical
            && self.education >= required.education
            && self.morale >= required.morale
    }
}

/// Four-part domestic health rating of a settlement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomesticIndex {
    pub stability: Decimal,
    pub economy: Decimal,
    pub loyalty: Decimal,
    pub unrest: i64,
}

impl fmt::Display for DomesticIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stability: {}, Economy: {}, Loyalty: {}, Unrest: {}",
            self.stability, self.economy, self.loyalty, self.unrest
        )
    }
}

/// Settlement type name from the catalog, e.g. "Village", "City".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettlementKind(pub String);

impl SettlementKind {
    /// Cities and fortresses are seats of power and get base turns.
    pub fn is_seat_of_power(&self) -> bool {
        matches!(self.0.as_str(), "City" | "Fortress")
    }
}

/// A founded settlement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settlement {
    /// Unique name within the barony.
    pub name: String,
    pub kind: SettlementKind,
    pub level: u32,
    pub population_base: u64,
    pub population_critical: u64,
    /// Current population; drives overpopulation unrest.
    pub population: u64,
    pub needs: Needs,
    /// Levels of DI contributors (Towers, Markets, Monuments, TradeRoutes, ...).
    pub structure_levels: BTreeMap<String, u32>,
    pub base_unrest: i64,
    pub upgrade_requirements: UpgradeRequirements,
    /// Latest rating; replaced every tick.
    #[serde(default)]
    pub domestic_index: Option<DomesticIndex>,
}

impl Settlement {
    /// Found a settlement from a catalog template. Population starts at base.
    pub fn from_template(name: impl Into<String>, template: &SettlementTemplate) -> Self {
        Self {
            name: name.into(),
            kind: SettlementKind(template.name.clone()),
            level: template.level,
            population_base: template.population_base,
            population_critical: template.population_critical,
            population: template.population_base,
            needs: Needs::default(),
            structure_levels: BTreeMap::new(),
            base_unrest: 0,
            upgrade_requirements: template.upgrade_requirements.clone(),
            domestic_index: None,
        }
    }

    pub fn actor_id(&self) -> ActorId {
        ActorId::new(ActorKind::Settlement, self.name.clone())
    }

    pub fn structure_level(&self, name: &str) -> u32 {
        self.structure_levels.get(name).copied().unwrap_or(0)
    }

    /// Raise a contributor's level; never lowers it.
    pub fn raise_structure_level(&mut self, name: &str, level: u32) {
        let slot = self.structure_levels.entry(name.to_string()).or_insert(0);
        if *slot < level {
            *slot = level;
        }
    }

    /// Needs are all met and every OR-group has at least one structure at level.
    pub fn meets_upgrade_requirements(&self) -> bool {
        let reqs = &self.upgrade_requirements;
        if !self.needs.satisfies(&reqs.needs_required) {
            return false;
        }
        reqs.structures_required.iter().all(|group| {
            group
                .iter()
                .any(|req| self.structure_level(&req.name) >= req.level)
        })
    }
}

/// A built structure.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Structure {
    /// Unique name within the barony, e.g. "Ravenholm Sawmill".
    pub name: String,
    /// Catalog name, e.g. "Sawmill".
    pub kind: String,
    pub level: u32,
    #[serde(default)]
    pub production: ResourceDelta,
    #[serde(default)]
    pub upkeep: ResourceDelta,
    /// Settlement this structure stands in, if any.
    #[serde(default)]
    pub settlement: Option<String>,
}

impl Structure {
    pub fn from_template(name: impl Into<String>, template: &StructureTemplate) -> Self {
        Self {
            name: name.into(),
            kind: template.name.clone(),
            level: template.level,
            production: template.production.clone(),
            upkeep: template.upkeep.clone(),
            settlement: None,
        }
    }

    pub fn actor_id(&self) -> ActorId {
        ActorId::new(ActorKind::Structure, self.name.clone())
    }

    /// Whether `available` covers this structure's upkeep.
    pub fn is_active(&self, available: &ResourceBundle) -> bool {
        available.covers(&self.upkeep)
    }

    /// Purely passive structures produce nothing.
    pub fn has_production(&self) -> bool {
        self.production.iter().any(|(_, v)| v != 0)
    }
}

/// NPC rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NpcTier {
    Tier1,
    Tier2,
}

/// Housing estate of an NPC.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Estate {
    pub level: u32,
    #[serde(default)]
    pub upkeep: ResourceDelta,
}

impl Estate {
    pub fn is_active(&self, available: &ResourceBundle) -> bool {
        available.covers(&self.upkeep)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Npc {
    pub name: String,
    pub tier: NpcTier,
    /// NPCs without an estate need no housing upkeep.
    #[serde(default)]
    pub estate: Option<Estate>,
}

impl Npc {
    pub fn actor_id(&self) -> ActorId {
        ActorId::new(ActorKind::Npc, self.name.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creature {
    pub name: String,
    pub level: u32,
}

/// Creature-housing entity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Homeward {
    pub name: String,
    pub level: u32,
    #[serde(default)]
    pub creatures: Vec<Creature>,
}

impl Homeward {
    pub fn new(name: impl Into<String>, level: u32) -> Self {
        Self {
            name: name.into(),
            level,
            creatures: Vec::new(),
        }
    }

    pub fn actor_id(&self) -> ActorId {
        ActorId::new(ActorKind::Homeward, self.name.clone())
    }

    pub fn assign_creature(&mut self, name: impl Into<String>, level: u32) {
        self.creatures.push(Creature {
            name: name.into(),
            level,
        });
    }

    /// Sum of assigned creature levels.
    pub fn creature_total(&self) -> u64 {
        self.creatures.iter().map(|c| u64::from(c.level)).sum()
    }
}
