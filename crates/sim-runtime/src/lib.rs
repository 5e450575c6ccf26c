#![deny(warnings)]

//! Tick runtime for a barony.
//!
//! Owns the roster of actors, allocates their monthly turns, gates every
//! spend through [`ActionExecutor`] and sequences the monthly phases in
//! [`TurnEngine`].

pub mod actor;
pub mod allocator;
pub mod engine;
pub mod executor;
pub mod roster;

pub use actor::{actions_for, ActionType, Actor, DomesticIndexMap, TurnContext};
pub use allocator::{TurnAllocator, TurnBudget};
pub use engine::{
    ActionHandler, BuildOrder, NoActions, PlannedAction, ScriptedActions, TickError, TickPhase,
    TickReport, TurnEngine,
};
pub use executor::{ActionError, ActionExecutor, ActionRecord};
pub use roster::{Barony, PlayerCharacter, Role, Roster};
