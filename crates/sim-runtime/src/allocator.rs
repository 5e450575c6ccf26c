//! Per-tick turn budgets.

use crate::actor::{Actor, DomesticIndexMap, TurnContext};
use crate::roster::Roster;
use serde::{Deserialize, Serialize};
use sim_core::{ActorId, EconomyConfig, ResourceBundle, ValidationError};
use std::collections::BTreeMap;
use tracing::debug;

/// Remaining turns per actor. Unsigned, so never negative.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnBudget(BTreeMap<ActorId, u32>);

impl TurnBudget {
    /// Remaining turns; zero for actors not in the budget.
    pub fn remaining(&self, actor: &ActorId) -> u32 {
        self.0.get(actor).copied().unwrap_or(0)
    }

    pub fn contains(&self, actor: &ActorId) -> bool {
        self.0.contains_key(actor)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ActorId, u32)> + '_ {
        self.0.iter().map(|(id, t)| (id, *t))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.0.values().map(|t| u64::from(*t)).sum()
    }

    /// Deduct `turns` if the actor has them; otherwise leave the budget as is.
    pub(crate) fn try_deduct(&mut self, actor: &ActorId, turns: u32) -> bool {
        match self.0.get_mut(actor) {
            Some(left) if *left >= turns => {
                *left -= turns;
                true
            }
            _ => turns == 0,
        }
    }
}

/// Builds a fresh budget from the roster each tick.
#[derive(Clone, Copy, Debug)]
pub struct TurnAllocator<'a> {
    config: &'a EconomyConfig,
}

impl<'a> TurnAllocator<'a> {
    pub fn new(config: &'a EconomyConfig) -> Self {
        Self { config }
    }

    /// Allocate turns for every actor in `roster`.
    ///
    /// Fails when two actors share a namespaced id.
    pub fn allocate(
        &self,
        roster: &Roster,
        domestic_index: &DomesticIndexMap,
        available: &ResourceBundle,
    ) -> Result<TurnBudget, ValidationError> {
        let ctx = TurnContext {
            domestic_index,
            available,
            config: self.config,
        };
        let actors = roster
            .characters
            .iter()
            .map(|a| a as &dyn Actor)
            .chain(roster.npcs.iter().map(|a| a as &dyn Actor))
            .chain(roster.settlements.iter().map(|a| a as &dyn Actor))
            .chain(roster.structures.iter().map(|a| a as &dyn Actor))
            .chain(roster.homewards.iter().map(|a| a as &dyn Actor));

        let mut budget = BTreeMap::new();
        for actor in actors {
            let id = actor.id();
            let turns = actor.monthly_turns(&ctx);
            debug!(actor = %id, turns, "turns allocated");
            if budget.insert(id.clone(), turns).is_some() {
                return Err(ValidationError::DuplicateActor(id.to_string()));
            }
        }
        Ok(TurnBudget(budget))
    }
}
