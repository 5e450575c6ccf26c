//! Barony, its members and the actor roster it owns.

use serde::{Deserialize, Serialize};
use sim_core::{
    ActorId, ActorKind, Catalog, EconomyConfig, Homeward, Npc, ResourceDelta, Settlement,
    SettlementKind, Structure, StructureTemplate, ValidationError,
};
use sim_econ::{BaronyLedger, LedgerAccount, LedgerInputs, MonthlyInputs};

/// Standing of a character within a barony.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Baron,
    Steward,
    CourtNoble,
    Member,
}

/// A player character with a personal ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerCharacter {
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub skills: Vec<String>,
    /// Name of the barony this character belongs to. Non-owning.
    #[serde(default)]
    pub barony: Option<String>,
    /// Personal resources; never merged with the barony ledger.
    #[serde(default)]
    pub ledger: LedgerAccount,
}

impl PlayerCharacter {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            skills: Vec::new(),
            barony: None,
            ledger: LedgerAccount::new(),
        }
    }

    pub fn actor_id(&self) -> ActorId {
        ActorId::new(ActorKind::Character, self.name.clone())
    }

    pub fn is_in_barony(&self) -> bool {
        self.barony.is_some()
    }

    /// Every barony role may draw on shared resources; outsiders may not.
    pub fn can_spend_from_barony(&self) -> bool {
        self.is_in_barony()
            && matches!(
                self.role,
                Role::Baron | Role::Steward | Role::CourtNoble | Role::Member
            )
    }
}

/// Everyone and everything that receives turns.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Roster {
    #[serde(default)]
    pub characters: Vec<PlayerCharacter>,
    #[serde(default)]
    pub npcs: Vec<Npc>,
    #[serde(default)]
    pub settlements: Vec<Settlement>,
    #[serde(default)]
    pub structures: Vec<Structure>,
    #[serde(default)]
    pub homewards: Vec<Homeward>,
}

impl Roster {
    pub fn settlement(&self, name: &str) -> Option<&Settlement> {
        self.settlements.iter().find(|s| s.name == name)
    }

    pub fn settlement_mut(&mut self, name: &str) -> Option<&mut Settlement> {
        self.settlements.iter_mut().find(|s| s.name == name)
    }

    pub fn character(&self, name: &str) -> Option<&PlayerCharacter> {
        self.characters.iter().find(|c| c.name == name)
    }

    /// Refuse a name already taken within `kind`'s namespace.
    pub fn check_name_free(&self, kind: ActorKind, name: &str) -> Result<(), ValidationError> {
        let taken = match kind {
            ActorKind::Character => self.characters.iter().any(|c| c.name == name),
            ActorKind::Npc => self.npcs.iter().any(|n| n.name == name),
            ActorKind::Settlement => self.settlement(name).is_some(),
            ActorKind::Structure => self.structures.iter().any(|s| s.name == name),
            ActorKind::Homeward => self.homewards.iter().any(|h| h.name == name),
        };
        if taken {
            return Err(ValidationError::DuplicateActor(ActorId::new(kind, name).to_string()));
        }
        Ok(())
    }

    /// Check that `template` may stand in `settlement` under a fresh `name`.
    pub fn check_structure_site(
        &self,
        template: &StructureTemplate,
        name: &str,
        settlement: &str,
    ) -> Result<(), ValidationError> {
        let site = self
            .settlement(settlement)
            .ok_or_else(|| ValidationError::UnknownActor(format!("settlement {settlement}")))?;
        if !template.is_buildable_in(&site.kind) {
            let SettlementKind(settlement_kind) = site.kind.clone();
            return Err(ValidationError::NotBuildable {
                structure: template.name.clone(),
                settlement_kind,
            });
        }
        self.check_name_free(ActorKind::Structure, name)
    }

    /// Add a structure whose site was already checked. The host settlement's
    /// contributor level and needs rise with it.
    pub(crate) fn attach_structure(
        &mut self,
        template: &StructureTemplate,
        name: &str,
        settlement: &str,
    ) -> &Structure {
        if let Some(site) = self.settlement_mut(settlement) {
            site.raise_structure_level(&template.name, template.level);
            site.needs.raise(&template.settlement_needs);
        }
        let mut structure = Structure::from_template(name, template);
        structure.settlement = Some(settlement.to_string());
        self.structures.push(structure);
        let idx = self.structures.len() - 1;
        &self.structures[idx]
    }

    /// Place a settlement from the catalog as part of the starting state.
    ///
    /// Nothing is charged. Founding during play goes through
    /// [`ActionExecutor::found_settlement`](crate::ActionExecutor::found_settlement).
    pub fn place_settlement(
        &mut self,
        catalog: &Catalog,
        kind: &str,
        level: u32,
        name: &str,
    ) -> Result<&mut Settlement, ValidationError> {
        let template = catalog.settlement(kind, level)?;
        self.check_name_free(ActorKind::Settlement, name)?;
        self.settlements.push(Settlement::from_template(name, template));
        let idx = self.settlements.len() - 1;
        Ok(&mut self.settlements[idx])
    }

    /// Place a structure in `settlement` as part of the starting state.
    ///
    /// Nothing is charged. Building during play goes through
    /// [`ActionExecutor::build_structure`](crate::ActionExecutor::build_structure).
    pub fn place_structure(
        &mut self,
        catalog: &Catalog,
        kind: &str,
        level: u32,
        name: &str,
        settlement: &str,
    ) -> Result<&Structure, ValidationError> {
        let template = catalog.structure(kind, level)?;
        self.check_structure_site(template, name, settlement)?;
        Ok(self.attach_structure(template, name, settlement))
    }
}

/// Top-level player group: shared ledger plus the roster it owns.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Barony {
    pub name: String,
    pub baron: Option<String>,
    pub ledger: BaronyLedger,
    pub roster: Roster,
    /// Coin spent in place of a shortfall in another resource, per month.
    #[serde(default)]
    pub coin_substitutions: ResourceDelta,
    /// Road network maintenance, computed by the map layer.
    #[serde(default)]
    pub road_upkeep: ResourceDelta,
}

impl Barony {
    pub fn new(name: impl Into<String>, tax_exempt: bool, config: &EconomyConfig) -> Self {
        let name = name.into();
        Self {
            ledger: BaronyLedger::new(name.clone(), tax_exempt, config),
            name,
            baron: None,
            roster: Roster::default(),
            coin_substitutions: ResourceDelta::new(),
            road_upkeep: ResourceDelta::new(),
        }
    }

    /// Attach a character; a Baron also becomes the barony's baron.
    pub fn add_member(&mut self, mut character: PlayerCharacter) {
        character.barony = Some(self.name.clone());
        if character.role == Role::Baron {
            self.baron = Some(character.name.clone());
        }
        self.roster.characters.push(character);
    }

    /// Snapshot of this month's ledger inputs.
    pub fn monthly_inputs(&self) -> MonthlyInputs {
        MonthlyInputs {
            production: self.production(),
            upkeep: self.upkeep(),
            coin_substitutions: self.coin_substitutions(),
            road_upkeep: self.road_upkeep(),
        }
    }
}

impl LedgerInputs for Barony {
    fn production(&self) -> ResourceDelta {
        let mut total = ResourceDelta::new();
        for s in &self.roster.structures {
            total.accumulate(&s.production);
        }
        total
    }

    /// Structure upkeep plus NPC estate upkeep.
    fn upkeep(&self) -> ResourceDelta {
        let mut total = ResourceDelta::new();
        for s in &self.roster.structures {
            total.accumulate(&s.upkeep);
        }
        for estate in self.roster.npcs.iter().filter_map(|n| n.estate.as_ref()) {
            total.accumulate(&estate.upkeep);
        }
        total
    }

    fn coin_substitutions(&self) -> ResourceDelta {
        self.coin_substitutions.clone()
    }

    fn road_upkeep(&self) -> ResourceDelta {
        self.road_upkeep.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::{Estate, NpcTier, Resource};

    const CATALOG: &str = r#"
structures:
  - name: Sawmill
    level: 1
    production: { L: 6 }
    upkeep: { C: 1 }
    settlement_needs: { Morale: 1 }
    buildable_in: { Village: true }
  - name: Towers
    level: 2
    upkeep: { S: 1 }
    buildable_in: { City: true }
settlements:
  - name: Village
    level: 1
    population_base: 80
    population_critical: 120
"#;

    #[test]
    fn members_get_back_reference() {
        let mut b = Barony::new("Ashford", false, &EconomyConfig::default());
        b.add_member(PlayerCharacter::new("Ada", Role::Baron));
        b.add_member(PlayerCharacter::new("Bram", Role::Member));
        assert_eq!(b.baron.as_deref(), Some("Ada"));
        let bram = b.roster.character("Bram").unwrap();
        assert_eq!(bram.barony.as_deref(), Some("Ashford"));
        assert!(bram.can_spend_from_barony());
        assert!(!PlayerCharacter::new("Wanderer", Role::Member).can_spend_from_barony());
    }

    #[test]
    fn placement_checks_catalog_site_and_names() {
        let catalog = Catalog::from_yaml_str(CATALOG).unwrap();
        let mut r = Roster::default();
        r.place_settlement(&catalog, "Village", 1, "Oakford").unwrap();
        assert!(matches!(
            r.place_settlement(&catalog, "City", 1, "Nowhere"),
            Err(ValidationError::MissingCatalogEntry { .. })
        ));
        assert_eq!(
            r.place_settlement(&catalog, "Village", 1, "Oakford").unwrap_err(),
            ValidationError::DuplicateActor("settlement:Oakford".into())
        );
        r.place_structure(&catalog, "Sawmill", 1, "Oakford Mill", "Oakford").unwrap();
        let oakford = r.settlement("Oakford").unwrap();
        assert_eq!(oakford.structure_level("Sawmill"), 1);
        assert_eq!(oakford.needs.morale, 1);
        assert!(matches!(
            r.place_structure(&catalog, "Towers", 2, "Watch", "Oakford"),
            Err(ValidationError::NotBuildable { .. })
        ));
        assert!(matches!(
            r.place_structure(&catalog, "Sawmill", 1, "Mill 2", "Elsewhere"),
            Err(ValidationError::UnknownActor(_))
        ));
        assert!(matches!(
            r.place_structure(&catalog, "Sawmill", 1, "Oakford Mill", "Oakford"),
            Err(ValidationError::DuplicateActor(_))
        ));
        assert_eq!(r.structures.len(), 1);
    }

    #[test]
    fn inputs_aggregate_structures_and_estates() {
        let catalog = Catalog::from_yaml_str(CATALOG).unwrap();
        let mut b = Barony::new("Ashford", false, &EconomyConfig::default());
        b.roster.place_settlement(&catalog, "Village", 1, "Oakford").unwrap();
        b.roster.place_structure(&catalog, "Sawmill", 1, "Mill A", "Oakford").unwrap();
        b.roster.place_structure(&catalog, "Sawmill", 1, "Mill B", "Oakford").unwrap();
        b.roster.npcs.push(Npc {
            name: "Steward Hal".into(),
            tier: NpcTier::Tier2,
            estate: Some(Estate {
                level: 1,
                upkeep: ResourceDelta::from([(Resource::Food, 2)]),
            }),
        });
        b.road_upkeep = ResourceDelta::from([(Resource::Coin, 3)]);
        let inputs = b.monthly_inputs();
        assert_eq!(inputs.production, ResourceDelta::from([(Resource::Lumber, 12)]));
        assert_eq!(
            inputs.upkeep,
            ResourceDelta::from([(Resource::Food, 2), (Resource::Coin, 2)])
        );
        assert_eq!(inputs.road_upkeep.get(Resource::Coin), 3);
    }
}
