//! Monthly tick state machine.
//!
//! A tick runs five phases in order: settle the ledger, recompute every
//! settlement's Domestic Index, allocate a fresh turn budget, let an
//! [`ActionHandler`] spend turns through the [`ActionExecutor`], then assemble
//! the [`TickReport`]. A failure in any phase restores the barony and the
//! engine to their pre-tick state.

use crate::actor::{ActionType, DomesticIndexMap};
use crate::allocator::{TurnAllocator, TurnBudget};
use crate::executor::{ActionError, ActionExecutor, ActionRecord};
use crate::roster::Barony;
use serde::{Deserialize, Serialize};
use sim_core::{ActorId, Catalog, EconomyConfig, ResourceBundle, ResourceDelta, ValidationError};
use sim_econ::{calculate_domestic_index, DomesticInputs, EconError, MonthlyStatement};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickPhase {
    Idle,
    ApplyLedger,
    RecomputeDomesticIndex,
    AllocateTurns,
    ProcessTurns,
    Finalize,
}

/// Failures that abort a whole tick.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TickError {
    /// A previous tick was interrupted and left the engine mid-phase.
    #[error("tick already in progress ({0:?})")]
    InProgress(TickPhase),
    #[error("ledger settlement failed: {0}")]
    Ledger(EconError),
    #[error("domestic index for {settlement} failed: {source}")]
    DomesticIndex { settlement: String, source: EconError },
    #[error("turn allocation failed: {0}")]
    Allocation(ValidationError),
}

/// External driver of the ProcessTurns phase.
///
/// Handlers decide what to do with refused actions; the executor guarantees
/// a refusal changed nothing. The roster is read through
/// [`ActionExecutor::roster`] and changed only by its actions.
pub trait ActionHandler {
    fn process_turns(&mut self, domestic_index: &DomesticIndexMap, executor: &mut ActionExecutor<'_>);
}

/// Leaves every turn unspent.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoActions;

impl ActionHandler for NoActions {
    fn process_turns(&mut self, _: &DomesticIndexMap, _: &mut ActionExecutor<'_>) {}
}

/// One action a [`ScriptedActions`] handler attempts every tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub actor: ActorId,
    pub action: ActionType,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub cost: Option<ResourceDelta>,
    #[serde(default = "one_turn")]
    pub turn_cost: u32,
    /// Catalog entry and name for FoundSettlement and BuildStructure. Those
    /// charge the catalog build cost and one turn; `cost` and `turn_cost`
    /// are ignored for them and for UpgradeSettlement.
    #[serde(default)]
    pub build: Option<BuildOrder>,
}

/// What a founding or building action creates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOrder {
    pub template: String,
    pub level: u32,
    pub name: String,
}

fn one_turn() -> u32 {
    1
}

/// Attempts a fixed plan in order each tick and keeps the last tick's refusals.
#[derive(Clone, Debug, Default)]
pub struct ScriptedActions {
    pub plan: Vec<PlannedAction>,
    rejected: Vec<ActionError>,
}

impl ScriptedActions {
    pub fn new(plan: Vec<PlannedAction>) -> Self {
        Self {
            plan,
            rejected: Vec::new(),
        }
    }

    pub fn rejected(&self) -> &[ActionError] {
        &self.rejected
    }
}

impl PlannedAction {
    fn attempt(&self, executor: &mut ActionExecutor<'_>) -> Result<(), ActionError> {
        match (self.action, &self.build) {
            (ActionType::FoundSettlement, Some(order)) => {
                executor.found_settlement(&self.actor, &order.template, order.level, &order.name)?;
            }
            (ActionType::BuildStructure, Some(order)) => {
                executor.build_structure(&self.actor, &order.template, order.level, &order.name)?;
            }
            (ActionType::UpgradeSettlement, _) => {
                executor.upgrade_settlement(&self.actor)?;
            }
            _ => {
                executor.perform_action(
                    &self.actor,
                    self.action,
                    &self.details,
                    self.cost.as_ref(),
                    self.turn_cost,
                )?;
            }
        }
        Ok(())
    }
}

impl ActionHandler for ScriptedActions {
    fn process_turns(&mut self, _: &DomesticIndexMap, executor: &mut ActionExecutor<'_>) {
        self.rejected.clear();
        for step in &self.plan {
            if let Err(err) = step.attempt(executor) {
                self.rejected.push(err);
            }
        }
    }
}

/// Externally visible result of one tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub month_key: String,
    pub statement: MonthlyStatement,
    /// Barony balance after all actions.
    pub resources: ResourceBundle,
    /// Budget as allocated, before any action.
    pub allocated: TurnBudget,
    /// Turns left unspent; they do not carry over.
    pub turn_budget: TurnBudget,
    pub domestic_index: DomesticIndexMap,
    pub action_log: Vec<ActionRecord>,
}

/// Runs ticks for one barony at a time.
///
/// Holds the catalog that founding and building draw on, plus the latest
/// Domestic Index map and turn budget, both replaced wholesale every tick.
#[derive(Clone, Debug)]
pub struct TurnEngine {
    config: EconomyConfig,
    catalog: Catalog,
    domestic_index: DomesticIndexMap,
    budget: TurnBudget,
    phase: TickPhase,
}

impl TurnEngine {
    pub fn new(config: EconomyConfig, catalog: Catalog) -> Self {
        Self {
            config,
            catalog,
            domestic_index: DomesticIndexMap::new(),
            budget: TurnBudget::default(),
            phase: TickPhase::Idle,
        }
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    pub fn phase(&self) -> TickPhase {
        self.phase
    }

    pub fn domestic_index(&self) -> &DomesticIndexMap {
        &self.domestic_index
    }

    pub fn turn_budget(&self) -> &TurnBudget {
        &self.budget
    }

    /// Run one full tick for `barony` under `month_key`.
    ///
    /// On error the barony, Domestic Index map and turn budget are restored
    /// from a snapshot taken before the first phase.
    pub fn run_tick(
        &mut self,
        barony: &mut Barony,
        month_key: &str,
        handler: &mut dyn ActionHandler,
    ) -> Result<TickReport, TickError> {
        if self.phase != TickPhase::Idle {
            return Err(TickError::InProgress(self.phase));
        }
        let snapshot = (barony.clone(), self.domestic_index.clone(), self.budget.clone());
        let result = self.run_phases(barony, month_key, handler);
        if let Err(err) = &result {
            warn!(barony = %barony.name, month = month_key, %err, "tick aborted, state restored");
            let (saved_barony, saved_index, saved_budget) = snapshot;
            *barony = saved_barony;
            self.domestic_index = saved_index;
            self.budget = saved_budget;
        }
        self.phase = TickPhase::Idle;
        result
    }

    fn enter(&mut self, phase: TickPhase) {
        debug!(?phase, "tick phase");
        self.phase = phase;
    }

    fn run_phases(
        &mut self,
        barony: &mut Barony,
        month_key: &str,
        handler: &mut dyn ActionHandler,
    ) -> Result<TickReport, TickError> {
        self.enter(TickPhase::ApplyLedger);
        let statement = apply_ledger(barony, month_key)?;

        self.enter(TickPhase::RecomputeDomesticIndex);
        self.recompute_domestic_index(barony)?;

        self.enter(TickPhase::AllocateTurns);
        let available = barony.ledger.account().balance();
        self.budget = TurnAllocator::new(&self.config)
            .allocate(&barony.roster, &self.domestic_index, &available)
            .map_err(TickError::Allocation)?;
        let allocated = self.budget.clone();

        self.enter(TickPhase::ProcessTurns);
        let action_log = {
            let mut executor = ActionExecutor::new(
                barony.ledger.account_mut(),
                &mut barony.roster,
                &self.catalog,
                &mut self.budget,
            );
            handler.process_turns(&self.domestic_index, &mut executor);
            executor.into_log()
        };

        self.enter(TickPhase::Finalize);
        let report = TickReport {
            month_key: month_key.to_string(),
            statement,
            resources: barony.ledger.account().balance(),
            allocated,
            turn_budget: self.budget.clone(),
            domestic_index: self.domestic_index.clone(),
            action_log,
        };
        info!(
            barony = %barony.name,
            month = month_key,
            actions = report.action_log.len(),
            turns_left = report.turn_budget.total(),
            balance = %report.resources,
            "tick complete"
        );
        Ok(report)
    }

    fn recompute_domestic_index(&mut self, barony: &mut Barony) -> Result<(), TickError> {
        let mut fresh = DomesticIndexMap::new();
        for settlement in &barony.roster.settlements {
            let index = calculate_domestic_index(&DomesticInputs::from(settlement), &self.config)
                .map_err(|source| TickError::DomesticIndex {
                    settlement: settlement.name.clone(),
                    source,
                })?;
            debug!(settlement = %settlement.name, %index, "domestic index");
            fresh.insert(settlement.actor_id(), index);
        }
        for settlement in &mut barony.roster.settlements {
            settlement.domestic_index = fresh.get(&settlement.actor_id()).copied();
        }
        self.domestic_index = fresh;
        Ok(())
    }
}

fn apply_ledger(barony: &mut Barony, month_key: &str) -> Result<MonthlyStatement, TickError> {
    let inputs = barony.monthly_inputs();
    barony
        .ledger
        .submit_from(month_key, &inputs)
        .cloned()
        .map_err(TickError::Ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{PlayerCharacter, Role};
    use sim_core::{ActorKind, Resource};

    const CATALOG: &str = r#"
structures:
  - name: Sawmill
    level: 1
    build_cost: { L: 10, C: 1 }
    production: { L: 20 }
    upkeep: { C: 1 }
    buildable_in: { City: true }
settlements:
  - name: City
    level: 1
    build_cost: { L: 400, S: 400, C: 400 }
    population_base: 100
    population_critical: 100
"#;

    fn catalog() -> Catalog {
        Catalog::from_yaml_str(CATALOG).unwrap()
    }

    fn engine() -> TurnEngine {
        TurnEngine::new(EconomyConfig::default(), catalog())
    }

    fn barony(name: &str) -> Barony {
        let catalog = catalog();
        let mut b = Barony::new(name, false, &EconomyConfig::default());
        b.add_member(PlayerCharacter::new("Ada", Role::Baron));
        b.roster.place_settlement(&catalog, "City", 1, "Ashcroft").unwrap();
        b.roster
            .place_structure(&catalog, "Sawmill", 1, "Ashcroft Mill", "Ashcroft")
            .unwrap();
        b.ledger
            .account_mut()
            .add(&ResourceDelta::from([(Resource::Coin, 5)]), "treasury", "test");
        b
    }

    fn ada() -> ActorId {
        ActorId::new(ActorKind::Character, "Ada")
    }

    fn city() -> ActorId {
        ActorId::new(ActorKind::Settlement, "Ashcroft")
    }

    #[test]
    fn full_tick_runs_every_phase() {
        let mut b = barony("Ashford");
        let mut engine = engine();
        let mut handler = ScriptedActions::new(vec![
            PlannedAction {
                actor: ada(),
                action: ActionType::BuildRoad,
                details: "to the quarry".into(),
                cost: Some(ResourceDelta::from([(Resource::Coin, 3)])),
                turn_cost: 1,
                build: None,
            },
            PlannedAction {
                actor: ada(),
                action: ActionType::StartCaravan,
                details: "spices".into(),
                cost: Some(ResourceDelta::from([(Resource::Coin, 5)])),
                turn_cost: 1,
                build: None,
            },
            PlannedAction {
                actor: city(),
                action: ActionType::UpgradeSettlement,
                details: String::new(),
                cost: None,
                turn_cost: 1,
                build: None,
            },
        ]);
        let report = engine.run_tick(&mut b, "0001", &mut handler).unwrap();

        assert_eq!(report.statement.taxes.get(Resource::Lumber), 2);
        assert_eq!(report.statement.net.get(Resource::Lumber), 18);
        assert_eq!(report.resources.get(Resource::Lumber), 18);
        assert_eq!(report.resources.get(Resource::Coin), 2);

        // City: 2 seat + 1 population; no stability bonus at 0.
        assert_eq!(report.allocated.remaining(&city()), 3);
        assert_eq!(report.allocated.remaining(&ada()), 2);
        let mill = ActorId::new(ActorKind::Structure, "Ashcroft Mill");
        assert_eq!(report.allocated.remaining(&mill), 1);
        assert_eq!(report.allocated.total(), 6);

        assert_eq!(report.action_log.len(), 2);
        assert_eq!(handler.rejected().len(), 1);
        assert!(matches!(
            handler.rejected()[0],
            ActionError::InsufficientResources { .. }
        ));
        assert_eq!(report.turn_budget.remaining(&ada()), 1);
        assert_eq!(report.turn_budget.remaining(&city()), 2);

        assert_eq!(b.roster.settlement("Ashcroft").unwrap().level, 2);
        assert_eq!(report.action_log[1].action, ActionType::UpgradeSettlement);
        assert!(report.domestic_index.contains_key(&city()));
        assert_eq!(
            b.roster.settlement("Ashcroft").unwrap().domestic_index,
            report.domestic_index.get(&city()).copied()
        );
        assert_eq!(engine.phase(), TickPhase::Idle);
        assert_eq!(engine.turn_budget(), &report.turn_budget);
        assert_eq!(b.ledger.get_ledger_report().months_recorded, vec!["0001"]);
    }

    fn order(template: &str, name: &str) -> Option<BuildOrder> {
        Some(BuildOrder {
            template: template.into(),
            level: 1,
            name: name.into(),
        })
    }

    #[test]
    fn scripted_founding_and_building_pay_through_the_ledger() {
        let mut b = barony("Ashford");
        let mut engine = engine();
        let mut handler = ScriptedActions::new(vec![
            PlannedAction {
                actor: ada(),
                action: ActionType::FoundSettlement,
                details: String::new(),
                cost: None,
                turn_cost: 1,
                build: order("City", "Highmoor"),
            },
            PlannedAction {
                actor: city(),
                action: ActionType::BuildStructure,
                details: String::new(),
                cost: Some(ResourceDelta::new()),
                turn_cost: 1,
                build: order("Sawmill", "Ashcroft Mill II"),
            },
            PlannedAction {
                actor: ada(),
                action: ActionType::FoundSettlement,
                details: "no order".into(),
                cost: None,
                turn_cost: 1,
                build: None,
            },
        ]);
        let report = engine.run_tick(&mut b, "0001", &mut handler).unwrap();

        // Founding a City needs 400 of L, S and C; only the mill is affordable.
        assert_eq!(handler.rejected().len(), 2);
        assert!(matches!(
            handler.rejected()[0],
            ActionError::InsufficientResources { .. }
        ));
        assert!(matches!(handler.rejected()[1], ActionError::Invalid { .. }));
        assert!(b.roster.settlement("Highmoor").is_none());
        assert_eq!(report.action_log.len(), 1);
        assert_eq!(
            report.action_log[0].cost,
            ResourceDelta::from([(Resource::Lumber, 10), (Resource::Coin, 1)])
        );
        assert_eq!(report.resources.get(Resource::Lumber), 8);
        assert_eq!(report.resources.get(Resource::Coin), 4);
        assert_eq!(report.turn_budget.remaining(&city()), 2);
        assert_eq!(report.turn_budget.remaining(&ada()), 2);
        assert_eq!(b.roster.structures.len(), 2);
        assert_eq!(b.roster.settlement("Ashcroft").unwrap().structure_level("Sawmill"), 1);

        // The new mill produces and pays upkeep from the next month on.
        let next = engine.run_tick(&mut b, "0002", &mut NoActions).unwrap();
        assert_eq!(next.statement.production.get(Resource::Lumber), 40);
    }

    #[test]
    fn unspent_turns_do_not_carry_over() {
        let mut b = barony("Ashford");
        let mut engine = engine();
        let mut spend_all = ScriptedActions::new(vec![PlannedAction {
            actor: ada(),
            action: ActionType::BuildRoad,
            details: String::new(),
            cost: None,
            turn_cost: 2,
            build: None,
        }]);
        let first = engine.run_tick(&mut b, "0001", &mut spend_all).unwrap();
        assert_eq!(first.turn_budget.remaining(&ada()), 0);
        let second = engine.run_tick(&mut b, "0002", &mut NoActions).unwrap();
        assert_eq!(second.turn_budget.remaining(&ada()), 2);
        assert_eq!(second.allocated, second.turn_budget);
        assert_eq!(second.resources.get(Resource::Lumber), 36);
    }

    #[test]
    fn zero_critical_population_rolls_back_the_tick() {
        let mut b = barony("Ashford");
        let mut engine = engine();
        engine.run_tick(&mut b, "0001", &mut NoActions).unwrap();
        let index_before = engine.domestic_index().clone();
        let budget_before = engine.turn_budget().clone();

        let mut ghost = b.roster.settlements[0].clone();
        ghost.name = "Ghost".into();
        ghost.population_critical = 0;
        b.roster.settlements.push(ghost);
        let balance_before = b.ledger.account().balance();
        let log_before = b.ledger.account().log(None).len();

        let err = engine.run_tick(&mut b, "0002", &mut NoActions).unwrap_err();
        assert!(matches!(
            err,
            TickError::DomesticIndex { ref settlement, .. } if settlement == "Ghost"
        ));
        assert_eq!(b.ledger.account().balance(), balance_before);
        assert_eq!(b.ledger.account().log(None).len(), log_before);
        assert_eq!(b.ledger.get_ledger_report().months_recorded, vec!["0001"]);
        assert_eq!(engine.domestic_index(), &index_before);
        assert_eq!(engine.turn_budget(), &budget_before);
        assert_eq!(engine.phase(), TickPhase::Idle);
    }

    #[test]
    fn empty_month_key_is_rejected() {
        let mut b = barony("Ashford");
        let mut engine = engine();
        let err = engine.run_tick(&mut b, "  ", &mut NoActions).unwrap_err();
        assert!(matches!(
            err,
            TickError::Ledger(EconError::Validation(ValidationError::MalformedInput(_)))
        ));
        assert!(b.ledger.get_ledger_report().months_recorded.is_empty());
    }

    #[test]
    fn independent_baronies_tick_in_parallel() {
        let mut baronies: Vec<Barony> = (0..4).map(|i| barony(&format!("B{i}"))).collect();
        std::thread::scope(|scope| {
            for b in baronies.iter_mut() {
                scope.spawn(move || {
                    let mut engine = engine();
                    engine.run_tick(b, "0001", &mut NoActions).unwrap();
                });
            }
        });
        for b in &baronies {
            assert_eq!(b.ledger.account().balance().get(Resource::Lumber), 18);
        }
    }

    #[test]
    fn report_serializes_with_actor_keys() {
        let mut b = barony("Ashford");
        let mut engine = engine();
        let report = engine.run_tick(&mut b, "0001", &mut NoActions).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["turn_budget"]["pc:Ada"], 2);
        assert!(json["domestic_index"]["settlement:Ashcroft"].is_object());
        let back: TickReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
