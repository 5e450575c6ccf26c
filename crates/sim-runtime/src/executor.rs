//! Single gateway for spending turns and resources.

use crate::actor::{actions_for, ActionType};
use crate::allocator::TurnBudget;
use crate::roster::Roster;
use serde::{Deserialize, Serialize};
use sim_core::{
    ActorId, ActorKind, Catalog, ResourceBundle, ResourceDelta, Settlement, ValidationError,
};
use sim_econ::{EconError, LedgerAccount};
use thiserror::Error;
use tracing::{info, warn};

/// Immutable record of a committed action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub actor: ActorId,
    pub action: ActionType,
    pub details: String,
    pub cost: ResourceDelta,
    pub turns_spent: u32,
}

/// Why an action was refused. Refusals never mutate anything.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActionError {
    #[error("{actor} cannot perform {action}")]
    ActionNotAvailable { actor: ActorId, action: ActionType },
    #[error("{actor} may not spend barony resources on {action}")]
    NotPermitted { actor: ActorId, action: ActionType },
    #[error("{actor} cannot {action}: {source}")]
    Invalid {
        actor: ActorId,
        action: ActionType,
        source: ValidationError,
    },
    #[error("{actor} does not meet its upgrade requirements")]
    RequirementsNotMet { actor: ActorId },
    #[error("{actor} has {remaining} turns remaining, {action} needs {needed}")]
    InsufficientTurns {
        actor: ActorId,
        action: ActionType,
        needed: u32,
        remaining: u32,
    },
    #[error("{actor} lacks resources for {action}: {source}")]
    InsufficientResources {
        actor: ActorId,
        action: ActionType,
        source: EconError,
    },
}

fn invalid(actor: &ActorId, action: ActionType, source: ValidationError) -> ActionError {
    warn!(%actor, %action, %source, "invalid action");
    ActionError::Invalid {
        actor: actor.clone(),
        action,
        source,
    }
}

/// Spends against one ledger and one turn budget, logging every commit.
///
/// Holding `&mut` to the ledger, roster and budget for its whole lifetime
/// makes the executor the only writer while actions are processed. Actions
/// that change the world validate everything first, so nothing can fail
/// once the spend is committed.
#[derive(Debug)]
pub struct ActionExecutor<'a> {
    ledger: &'a mut LedgerAccount,
    roster: &'a mut Roster,
    catalog: &'a Catalog,
    budget: &'a mut TurnBudget,
    log: Vec<ActionRecord>,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(
        ledger: &'a mut LedgerAccount,
        roster: &'a mut Roster,
        catalog: &'a Catalog,
        budget: &'a mut TurnBudget,
    ) -> Self {
        Self {
            ledger,
            roster,
            catalog,
            budget,
            log: Vec::new(),
        }
    }

    /// Perform `action` for `actor`, all or nothing.
    ///
    /// Founding, building and upgrading change the roster and have their own
    /// entry points; asking for them here is refused.
    pub fn perform_action(
        &mut self,
        actor: &ActorId,
        action: ActionType,
        details: &str,
        cost: Option<&ResourceDelta>,
        turn_cost: u32,
    ) -> Result<&ActionRecord, ActionError> {
        self.check_available(actor, action)?;
        if action.changes_roster() {
            return Err(invalid(
                actor,
                action,
                ValidationError::MalformedInput(format!("{action} needs a target")),
            ));
        }
        self.commit(actor, action, details, cost, turn_cost)?;
        Ok(self.last())
    }

    /// Found a settlement from the catalog, paying its build cost and a turn.
    pub fn found_settlement(
        &mut self,
        founder: &ActorId,
        kind: &str,
        level: u32,
        name: &str,
    ) -> Result<&ActionRecord, ActionError> {
        let action = ActionType::FoundSettlement;
        self.check_available(founder, action)?;
        let catalog = self.catalog;
        let template = catalog
            .settlement(kind, level)
            .map_err(|e| invalid(founder, action, e))?;
        self.roster
            .check_name_free(ActorKind::Settlement, name)
            .map_err(|e| invalid(founder, action, e))?;
        let details = format!("{} {name}", template.name);
        self.commit(founder, action, &details, Some(&template.build_cost), 1)?;
        self.roster
            .settlements
            .push(Settlement::from_template(name, template));
        Ok(self.last())
    }

    /// Build a structure in the acting settlement, paying its build cost and
    /// a turn.
    pub fn build_structure(
        &mut self,
        site: &ActorId,
        kind: &str,
        level: u32,
        name: &str,
    ) -> Result<&ActionRecord, ActionError> {
        let action = ActionType::BuildStructure;
        self.check_available(site, action)?;
        let catalog = self.catalog;
        let template = catalog
            .structure(kind, level)
            .map_err(|e| invalid(site, action, e))?;
        self.roster
            .check_structure_site(template, name, &site.name)
            .map_err(|e| invalid(site, action, e))?;
        let details = format!("{} {name}", template.name);
        self.commit(site, action, &details, Some(&template.build_cost), 1)?;
        self.roster.attach_structure(template, name, &site.name);
        Ok(self.last())
    }

    /// Raise the acting settlement one level and clear its base unrest.
    ///
    /// Costs a turn and no resources. The new rating shows up at the next
    /// Domestic Index recompute.
    pub fn upgrade_settlement(&mut self, site: &ActorId) -> Result<&ActionRecord, ActionError> {
        let action = ActionType::UpgradeSettlement;
        self.check_available(site, action)?;
        let settlement = self.roster.settlement(&site.name).ok_or_else(|| {
            invalid(site, action, ValidationError::UnknownActor(site.to_string()))
        })?;
        if !settlement.meets_upgrade_requirements() {
            warn!(actor = %site, "upgrade requirements not met");
            return Err(ActionError::RequirementsNotMet { actor: site.clone() });
        }
        let details = format!("level {}", settlement.level + 1);
        self.commit(site, action, &details, None, 1)?;
        if let Some(settlement) = self.roster.settlement_mut(&site.name) {
            settlement.level += 1;
            settlement.base_unrest = 0;
        }
        Ok(self.last())
    }

    fn check_available(&self, actor: &ActorId, action: ActionType) -> Result<(), ActionError> {
        if actions_for(actor.kind).contains(&action) {
            return Ok(());
        }
        warn!(%actor, %action, "action not available");
        Err(ActionError::ActionNotAvailable {
            actor: actor.clone(),
            action,
        })
    }

    /// Characters draw on the barony ledger only as members in good standing.
    fn check_may_spend(&self, actor: &ActorId, action: ActionType) -> Result<(), ActionError> {
        if actor.kind != ActorKind::Character {
            return Ok(());
        }
        let permitted = self
            .roster
            .character(&actor.name)
            .is_some_and(|c| c.can_spend_from_barony());
        if permitted {
            return Ok(());
        }
        warn!(%actor, %action, "not permitted to spend barony resources");
        Err(ActionError::NotPermitted {
            actor: actor.clone(),
            action,
        })
    }

    /// Checks, in order: cost has no negative entry, a character may spend
    /// barony resources, the actor has `turn_cost` turns, the ledger covers
    /// `cost`. Turns are deducted only after the resource spend succeeded.
    fn commit(
        &mut self,
        actor: &ActorId,
        action: ActionType,
        details: &str,
        cost: Option<&ResourceDelta>,
        turn_cost: u32,
    ) -> Result<(), ActionError> {
        if let Some(cost) = cost {
            if cost.has_negative() {
                return Err(invalid(
                    actor,
                    action,
                    ValidationError::MalformedInput(format!("negative cost {cost}")),
                ));
            }
            self.check_may_spend(actor, action)?;
        }
        let remaining = self.budget.remaining(actor);
        if remaining < turn_cost {
            warn!(%actor, %action, remaining, needed = turn_cost, "insufficient turns");
            return Err(ActionError::InsufficientTurns {
                actor: actor.clone(),
                action,
                needed: turn_cost,
                remaining,
            });
        }
        if let Some(cost) = cost {
            let purpose = action.to_string();
            let by = actor.to_string();
            self.ledger.spend(cost, &purpose, &by).map_err(|source| {
                warn!(%actor, %action, %source, "insufficient resources");
                ActionError::InsufficientResources {
                    actor: actor.clone(),
                    action,
                    source,
                }
            })?;
        }
        // Turns were checked above and nothing else can touch the budget.
        self.budget.try_deduct(actor, turn_cost);
        info!(%actor, %action, details, turn_cost, "action performed");
        self.log.push(ActionRecord {
            actor: actor.clone(),
            action,
            details: details.to_string(),
            cost: cost.cloned().unwrap_or_default(),
            turns_spent: turn_cost,
        });
        Ok(())
    }

    fn last(&self) -> &ActionRecord {
        &self.log[self.log.len() - 1]
    }

    pub fn remaining_turns(&self, actor: &ActorId) -> u32 {
        self.budget.remaining(actor)
    }

    pub fn balance(&self) -> ResourceBundle {
        self.ledger.balance()
    }

    /// Current roster, including anything founded or built this tick.
    pub fn roster(&self) -> &Roster {
        self.roster
    }

    pub fn log(&self) -> &[ActionRecord] {
        &self.log
    }

    pub fn into_log(self) -> Vec<ActionRecord> {
        self.log
    }
}
