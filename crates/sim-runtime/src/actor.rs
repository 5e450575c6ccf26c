//! Turn capability shared by every actor kind.

use crate::roster::PlayerCharacter;
use serde::{Deserialize, Serialize};
use sim_core::{
    ActorId, ActorKind, DomesticIndex, EconomyConfig, Homeward, Npc, ResourceBundle, Settlement,
    Structure,
};
use std::collections::BTreeMap;
use std::fmt;

/// Latest Domestic Index per settlement id.
pub type DomesticIndexMap = BTreeMap<ActorId, DomesticIndex>;

/// Actions an external handler may ask the executor to perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActionType {
    FoundSettlement,
    BuildRoad,
    StartCaravan,
    ManageEstate,
    BuildStructure,
    UpgradeStructure,
    UpgradeSettlement,
    ResearchTechnology,
    Operate,
    AssignCreature,
}

impl ActionType {
    /// Actions that add to or alter the roster rather than only spending.
    pub fn changes_roster(self) -> bool {
        matches!(
            self,
            ActionType::FoundSettlement | ActionType::BuildStructure | ActionType::UpgradeSettlement
        )
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Actions offered by every actor of `kind`.
pub fn actions_for(kind: ActorKind) -> &'static [ActionType] {
    match kind {
        ActorKind::Character => &[
            ActionType::FoundSettlement,
            ActionType::BuildRoad,
            ActionType::StartCaravan,
        ],
        ActorKind::Npc => &[ActionType::ManageEstate],
        ActorKind::Settlement => &[
            ActionType::BuildStructure,
            ActionType::UpgradeStructure,
            ActionType::UpgradeSettlement,
            ActionType::ResearchTechnology,
        ],
        ActorKind::Structure => &[ActionType::Operate],
        ActorKind::Homeward => &[ActionType::AssignCreature],
    }
}

/// Read-only state an actor's turn rule may consult.
#[derive(Clone, Copy, Debug)]
pub struct TurnContext<'a> {
    pub domestic_index: &'a DomesticIndexMap,
    /// Barony balance after month-end settlement.
    pub available: &'a ResourceBundle,
    pub config: &'a EconomyConfig,
}

/// One implementation per actor kind.
///
/// A rule may only look at its own actor and the context, never at other
/// actors' allocations, so allocation order cannot change the result.
pub trait Actor {
    fn id(&self) -> ActorId;

    fn monthly_turns(&self, ctx: &TurnContext<'_>) -> u32;

    fn available_actions(&self) -> &'static [ActionType] {
        actions_for(self.id().kind)
    }
}

impl Actor for PlayerCharacter {
    fn id(&self) -> ActorId {
        self.actor_id()
    }

    fn monthly_turns(&self, ctx: &TurnContext<'_>) -> u32 {
        ctx.config.character_turns
    }
}

impl Actor for Npc {
    fn id(&self) -> ActorId {
        self.actor_id()
    }

    /// Zero while the NPC's estate cannot pay its upkeep.
    fn monthly_turns(&self, ctx: &TurnContext<'_>) -> u32 {
        let base = match self.tier {
            sim_core::NpcTier::Tier2 => ctx.config.npc_tier2_turns,
            sim_core::NpcTier::Tier1 => ctx.config.npc_base_turns,
        };
        match &self.estate {
            Some(estate) if !estate.is_active(ctx.available) => 0,
            _ => base,
        }
    }
}

impl Actor for Settlement {
    fn id(&self) -> ActorId {
        self.actor_id()
    }

    fn monthly_turns(&self, ctx: &TurnContext<'_>) -> u32 {
        let mut turns = if self.kind.is_seat_of_power() {
            ctx.config.settlement_seat_turns
        } else {
            0
        };
        if let Some(di) = ctx.domestic_index.get(&self.actor_id()) {
            if di.stability > ctx.config.stability_bonus_threshold && di.unrest <= 0 {
                turns += 1;
            }
        }
        // `>=` here, while unrest only counts the ratio above critical.
        if self.population_base >= self.population_critical {
            turns += 1;
        }
        turns
    }
}

impl Actor for Structure {
    fn id(&self) -> ActorId {
        self.actor_id()
    }

    fn monthly_turns(&self, ctx: &TurnContext<'_>) -> u32 {
        if self.has_production() && self.is_active(ctx.available) {
            1
        } else {
            0
        }
    }
}

impl Actor for Homeward {
    fn id(&self) -> ActorId {
        self.actor_id()
    }

    fn monthly_turns(&self, ctx: &TurnContext<'_>) -> u32 {
        let threshold = u64::from(self.level) * u64::from(ctx.config.homeward_levels_per_turn);
        if self.creature_total() >= threshold {
            self.level
        } else {
            0
        }
    }
}
