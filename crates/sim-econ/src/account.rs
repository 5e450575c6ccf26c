//! Resource balance with an append-only transaction log.

use crate::EconError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sim_core::{ResourceBundle, ResourceDelta, ValidationError};
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Add,
    Spend,
    /// Month-end settlement; delta is `final - previous` and may be signed.
    MonthClose,
}

/// Immutable log entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub kind: TransactionKind,
    pub delta: ResourceDelta,
    pub context: String,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

/// A resource balance and the log it is folded from.
///
/// The balance is cached; [`LedgerAccount::replay`] recomputes it from the
/// log. Every mutation takes `&mut self`, so a checked spend is a single
/// critical section: the check and the commit cannot be interleaved with
/// another caller.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LedgerAccount {
    balance: ResourceBundle,
    log: Vec<Transaction>,
}

impl LedgerAccount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditionally increase the balance.
    pub fn add(&mut self, delta: &ResourceDelta, source: &str, actor: &str) {
        self.balance.add(delta);
        debug!(%delta, source, actor, "ledger add");
        self.record(TransactionKind::Add, delta.clone(), source, actor);
    }

    /// Checked spend: either every key is deducted or nothing changes.
    ///
    /// A negative entry would credit the balance, so it is refused as
    /// malformed input.
    pub fn spend(&mut self, cost: &ResourceDelta, purpose: &str, actor: &str) -> Result<(), EconError> {
        if cost.has_negative() {
            debug!(%cost, purpose, actor, "negative cost refused");
            return Err(ValidationError::MalformedInput(format!("negative cost {cost} for {purpose}")).into());
        }
        let shortfall = self.balance.shortfall(cost);
        if !shortfall.is_empty() {
            debug!(%cost, %shortfall, purpose, actor, "ledger spend refused");
            return Err(EconError::InsufficientResources { shortfall });
        }
        self.commit_spend(cost, purpose, actor);
        Ok(())
    }

    /// Spend without the balance check; the balance may go negative.
    ///
    /// `reason` documents why the caller bypasses the check and is logged.
    pub fn spend_unchecked(&mut self, cost: &ResourceDelta, purpose: &str, actor: &str, reason: &str) {
        warn!(%cost, purpose, actor, reason, "unchecked ledger spend");
        self.commit_spend(cost, purpose, actor);
    }

    fn commit_spend(&mut self, cost: &ResourceDelta, purpose: &str, actor: &str) {
        self.balance.subtract(cost);
        debug!(%cost, purpose, actor, "ledger spend");
        self.record(TransactionKind::Spend, cost.clone(), purpose, actor);
    }

    /// Move the balance to `final_balance`, logging the signed difference.
    pub(crate) fn close_month(&mut self, final_balance: ResourceBundle, month_key: &str) {
        let delta: ResourceDelta = final_balance
            .difference(&self.balance)
            .iter()
            .filter(|(_, v)| *v != 0)
            .collect();
        self.balance = final_balance;
        self.record(TransactionKind::MonthClose, delta, month_key, "SYSTEM");
    }

    fn record(&mut self, kind: TransactionKind, delta: ResourceDelta, context: &str, actor: &str) {
        self.log.push(Transaction {
            kind,
            delta,
            context: context.to_string(),
            actor: actor.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Snapshot copy of the balance.
    pub fn balance(&self) -> ResourceBundle {
        self.balance
    }

    /// The most recent `last_n` entries, or the whole log.
    pub fn log(&self, last_n: Option<usize>) -> &[Transaction] {
        match last_n {
            Some(n) => &self.log[self.log.len().saturating_sub(n)..],
            None => &self.log,
        }
    }

    /// Recompute the balance by folding the log.
    pub fn replay(&self) -> ResourceBundle {
        let mut balance = ResourceBundle::zero();
        for tx in &self.log {
            match tx.kind {
                TransactionKind::Add | TransactionKind::MonthClose => balance.add(&tx.delta),
                TransactionKind::Spend => balance.subtract(&tx.delta),
            }
        }
        balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sim_core::Resource;

    fn funded(stone: i64, coin: i64) -> LedgerAccount {
        let mut acct = LedgerAccount::new();
        acct.add(
            &ResourceDelta::from([(Resource::Stone, stone), (Resource::Coin, coin)]),
            "seed",
            "test",
        );
        acct
    }

    #[test]
    fn partially_affordable_spend_mutates_nothing() {
        let mut acct = funded(5, 100);
        let before = acct.balance();
        let cost = ResourceDelta::from([(Resource::Stone, 6), (Resource::Coin, 10)]);
        let err = acct.spend(&cost, "wall", "pc:Ada").unwrap_err();
        assert_eq!(
            err,
            EconError::InsufficientResources {
                shortfall: ResourceDelta::from([(Resource::Stone, 1)])
            }
        );
        assert_eq!(acct.balance(), before);
        assert_eq!(acct.log(None).len(), 1);
    }

    #[test]
    fn spend_deducts_and_logs() {
        let mut acct = funded(5, 100);
        acct.spend(&ResourceDelta::from([(Resource::Stone, 5)]), "wall", "pc:Ada")
            .unwrap();
        assert_eq!(acct.balance().get(Resource::Stone), 0);
        let last = &acct.log(Some(1))[0];
        assert_eq!(last.kind, TransactionKind::Spend);
        assert_eq!(last.context, "wall");
        assert_eq!(last.actor, "pc:Ada");
    }

    #[test]
    fn negative_cost_cannot_credit_the_balance() {
        let mut acct = funded(0, 0);
        let cost = ResourceDelta::from([(Resource::Stone, 2), (Resource::Coin, -1000)]);
        let err = acct.spend(&cost, "caravan", "pc:Ada").unwrap_err();
        assert!(matches!(
            err,
            EconError::Validation(ValidationError::MalformedInput(_))
        ));
        assert_eq!(acct.balance(), ResourceBundle::zero());
        assert_eq!(acct.log(None).len(), 1);
    }

    #[test]
    fn unchecked_spend_can_go_negative() {
        let mut acct = funded(0, 1);
        acct.spend_unchecked(
            &ResourceDelta::from([(Resource::Coin, 3)]),
            "road repair",
            "SYSTEM",
            "roads are maintained on credit",
        );
        assert_eq!(acct.balance().get(Resource::Coin), -2);
    }

    #[test]
    fn log_tail_is_bounded() {
        let acct = funded(1, 1);
        assert_eq!(acct.log(Some(10)).len(), 1);
        assert_eq!(acct.log(Some(0)).len(), 0);
    }

    #[test]
    fn balance_is_a_copy() {
        let acct = funded(3, 0);
        let mut snap = acct.balance();
        snap.set(Resource::Stone, 99);
        assert_eq!(acct.balance().get(Resource::Stone), 3);
    }

    proptest! {
        #[test]
        fn spend_is_all_or_nothing(have_s in 0i64..50, have_c in 0i64..50,
                                   cost_s in 0i64..50, cost_c in 0i64..50) {
            let mut acct = funded(have_s, have_c);
            let before = acct.balance();
            let cost = ResourceDelta::from([(Resource::Stone, cost_s), (Resource::Coin, cost_c)]);
            match acct.spend(&cost, "p", "a") {
                Ok(()) => {
                    prop_assert_eq!(acct.balance().get(Resource::Stone), have_s - cost_s);
                    prop_assert_eq!(acct.balance().get(Resource::Coin), have_c - cost_c);
                }
                Err(_) => prop_assert_eq!(acct.balance(), before),
            }
            prop_assert_eq!(acct.replay(), acct.balance());
        }
    }
}
