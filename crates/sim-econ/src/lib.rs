#![deny(warnings)]

//! Economic models for a barony: ledgers, month-end settlement and the
//! Domestic Index.
//!
//! This crate provides:
//! - [`LedgerAccount`]: balance plus append-only transaction log with atomic spends
//! - [`BaronyLedger`] / [`MonthlyLedgerEngine`]: subtotal, tax, net, carry-forward
//! - [`calculate_domestic_index`]: stability, economy, loyalty and unrest ratings

pub mod account;
pub mod domestic;
pub mod monthly;

pub use account::{LedgerAccount, Transaction, TransactionKind};
pub use domestic::{calculate_domestic_index, DomesticInputs};
pub use monthly::{BaronyLedger, LedgerReport, MonthSummary, MonthlyLedgerEngine, MonthlyStatement};

use serde::{Deserialize, Serialize};
use sim_core::{ResourceDelta, ValidationError};
use thiserror::Error;

/// Errors produced by ledgers and ratings.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EconError {
    /// A checked spend could not be covered. Nothing was deducted.
    #[error("insufficient resources, short by {shortfall}")]
    InsufficientResources { shortfall: ResourceDelta },
    /// No statement was recorded under this month key.
    #[error("no data for month {0}")]
    MissingMonthData(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Accessors a barony-like source exposes for month-end settlement.
pub trait LedgerInputs {
    fn production(&self) -> ResourceDelta;
    fn upkeep(&self) -> ResourceDelta;
    fn coin_substitutions(&self) -> ResourceDelta;
    fn road_upkeep(&self) -> ResourceDelta;
}

/// Month inputs gathered ahead of time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyInputs {
    #[serde(default)]
    pub production: ResourceDelta,
    #[serde(default)]
    pub upkeep: ResourceDelta,
    #[serde(default)]
    pub coin_substitutions: ResourceDelta,
    #[serde(default)]
    pub road_upkeep: ResourceDelta,
}

impl LedgerInputs for MonthlyInputs {
    fn production(&self) -> ResourceDelta {
        self.production.clone()
    }

    fn upkeep(&self) -> ResourceDelta {
        self.upkeep.clone()
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
    use sim_core::{EconomyConfig, Resource};

    #[test]
    fn submit_from_prepared_inputs() {
        let inputs = MonthlyInputs {
            production: ResourceDelta::from([(Resource::Food, 30), (Resource::Coin, 10)]),
            upkeep: ResourceDelta::from([(Resource::Food, 5)]),
            coin_substitutions: ResourceDelta::new(),
            road_upkeep: ResourceDelta::from([(Resource::Coin, 2)]),
        };
        let mut ledger = BaronyLedger::new("Ashford", false, &EconomyConfig::default());
        let s = ledger.submit_from("0001", &inputs).unwrap();
        assert_eq!(s.subtotal.get(Resource::Food), 25);
        assert_eq!(s.taxes.get(Resource::Food), 2);
        assert_eq!(s.subtotal.get(Resource::Coin), 8);
        assert_eq!(s.taxes.get(Resource::Coin), 0);
        assert_eq!(ledger.account().balance().get(Resource::Food), 23);
    }

    #[test]
    fn error_messages_render() {
        let e = EconError::InsufficientResources {
            shortfall: ResourceDelta::from([(Resource::Stone, 2)]),
        };
        assert_eq!(e.to_string(), "insufficient resources, short by {S:2}");
        assert_eq!(
            EconError::MissingMonthData("0007".into()).to_string(),
            "no data for month 0007"
        );
    }
}
