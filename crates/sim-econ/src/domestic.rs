//! Domestic Index ratings of a settlement.
//!
//! Ratings are pure functions of the settlement's level, population, needs
//! and contributor levels. Fractional ratings are rounded to two decimals.

use crate::EconError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sim_core::{DomesticIndex, EconomyConfig, Needs, Settlement, ValidationError};
use std::collections::BTreeMap;

pub const STABILITY_CONTRIBUTORS: [&str; 4] = ["Towers", "Garrisons", "Troops", "Defenses"];
pub const ECONOMY_CONTRIBUTORS: [&str; 3] = ["Markets", "Harbors", "TradeRoutes"];
pub const LOYALTY_CONTRIBUTOR: &str = "Monuments";

/// Borrowed view of everything the ratings depend on.
#[derive(Clone, Copy, Debug)]
pub struct DomesticInputs<'a> {
    pub name: &'a str,
    pub level: u32,
    pub population: u64,
    pub population_critical: u64,
    pub needs: Needs,
    pub structure_levels: &'a BTreeMap<String, u32>,
    pub base_unrest: i64,
}

impl<'a> From<&'a Settlement> for DomesticInputs<'a> {
    fn from(s: &'a Settlement) -> Self {
        Self {
            name: &s.name,
            level: s.level,
            population: s.population,
            population_critical: s.population_critical,
            needs: s.needs,
            structure_levels: &s.structure_levels,
            base_unrest: s.base_unrest,
        }
    }
}

fn level_divisor(level: u32) -> Decimal {
    Decimal::from(level.max(1))
}

fn contributor_points(levels: &BTreeMap<String, u32>, keys: &[&str]) -> Decimal {
    keys.iter()
        .map(|k| Decimal::from(levels.get(*k).copied().unwrap_or(0)))
        .sum()
}

/// Two decimals, half away from zero: 0.025 -> 0.03, not banker's 0.02.
fn two_places(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn stability_rating(level: u32, levels: &BTreeMap<String, u32>) -> Decimal {
    two_places(contributor_points(levels, &STABILITY_CONTRIBUTORS) / level_divisor(level))
}

pub fn economy_rating(level: u32, levels: &BTreeMap<String, u32>) -> Decimal {
    two_places(contributor_points(levels, &ECONOMY_CONTRIBUTORS) / level_divisor(level))
}

pub fn loyalty_rating(level: u32, needs: &Needs, levels: &BTreeMap<String, u32>) -> Decimal {
    let monuments = contributor_points(levels, &[LOYALTY_CONTRIBUTOR]);
    two_places((needs.mean() + monuments) / level_divisor(level))
}

/// Base unrest plus `floor(max((pop - critical) / critical, 0) * factor)`.
///
/// Fails when `critical` is zero.
pub fn unrest_rating(
    name: &str,
    base_unrest: i64,
    population: u64,
    critical: u64,
    factor: Decimal,
) -> Result<i64, EconError> {
    if critical == 0 {
        return Err(ValidationError::ZeroPopulationCritical(name.to_string()).into());
    }
    let critical = Decimal::from(critical);
    let ratio = ((Decimal::from(population) - critical) / critical).max(Decimal::ZERO);
    let overpop = (ratio * factor).floor().to_i64().unwrap_or(i64::MAX);
    Ok(base_unrest.saturating_add(overpop))
}

/// All four ratings for one settlement.
pub fn calculate_domestic_index(
    inputs: &DomesticInputs<'_>,
    config: &EconomyConfig,
) -> Result<DomesticIndex, EconError> {
    Ok(DomesticIndex {
        stability: stability_rating(inputs.level, inputs.structure_levels),
        economy: economy_rating(inputs.level, inputs.structure_levels),
        loyalty: loyalty_rating(inputs.level, &inputs.needs, inputs.structure_levels),
        unrest: unrest_rating(
            inputs.name,
            inputs.base_unrest,
            inputs.population,
            inputs.population_critical,
            config.overpopulation_unrest_factor,
        )?,
    })
}
