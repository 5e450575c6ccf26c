//! Resource codes and the two containers built on them.
//!
//! [`ResourceBundle`] is dense: every resource is always present, zero-seeded.
//! Balances use it so nothing is silently dropped from carry-forward.
//! [`ResourceDelta`] is sparse: only the resources a caller mentions are
//! present. Production, upkeep, costs and per-month statement lines use it,
//! because which keys are present matters to the monthly arithmetic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

/// The six tracked resources. Serialized by their one-letter codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Resource {
    /// Lumber (L)
    #[serde(rename = "L", alias = "Lumber")]
    Lumber,
    /// Stone (S)
    #[serde(rename = "S", alias = "Stone")]
    Stone,
    /// Metal (M)
    #[serde(rename = "M", alias = "Metal")]
    Metal,
    /// Food (F)
    #[serde(rename = "F", alias = "Food")]
    Food,
    /// Raw materials (R)
    #[serde(rename = "R", alias = "Raw")]
    Raw,
    /// Coin (C)
    #[serde(rename = "C", alias = "Coin")]
    Coin,
}

impl Resource {
    /// All resources in canonical order.
    pub const ALL: [Resource; 6] = [
        Resource::Lumber,
        Resource::Stone,
        Resource::Metal,
        Resource::Food,
        Resource::Raw,
        Resource::Coin,
    ];

    /// One-letter ledger code.
    pub fn code(self) -> &'static str {
        match self {
            Resource::Lumber => "L",
            Resource::Stone => "S",
            Resource::Metal => "M",
            Resource::Food => "F",
            Resource::Raw => "R",
            Resource::Coin => "C",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Sparse resource amounts. Absent keys read as zero but stay absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceDelta(BTreeMap<Resource, i64>);

impl ResourceDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Amount for `resource`, zero when absent.
    pub fn get(&self, resource: Resource) -> i64 {
        self.0.get(&resource).copied().unwrap_or(0)
    }

    pub fn contains(&self, resource: Resource) -> bool {
        self.0.contains_key(&resource)
    }

    pub fn insert(&mut self, resource: Resource, amount: i64) {
        self.0.insert(resource, amount);
    }

    /// Mutable slot for `resource`, inserted as zero when absent.
    pub fn entry(&mut self, resource: Resource) -> &mut i64 {
        self.0.entry(resource).or_insert(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Resource, i64)> + '_ {
        self.0.iter().map(|(r, v)| (*r, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Adds every entry of `other` into `self`, inserting keys as needed.
    pub fn accumulate(&mut self, other: &ResourceDelta) {
        for (r, v) in other.iter() {
            *self.entry(r) += v;
        }
    }

    /// True when any entry is negative.
    pub fn has_negative(&self) -> bool {
        self.0.values().any(|v| *v < 0)
    }
}

impl FromIterator<(Resource, i64)> for ResourceDelta {
    fn from_iter<I: IntoIterator<Item = (Resource, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ResourceDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(r, v)| format!("{r}:{v}")).collect();
        write!(f, "{{{}}}", parts.join(" "))
    }
}

impl<const N: usize> From<[(Resource, i64); N]> for ResourceDelta {
    fn from(pairs: [(Resource, i64); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// Dense resource balance: all six resources are always present.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Resource, i64>", into = "BTreeMap<Resource, i64>")]
pub struct ResourceBundle {
    amounts: [i64; 6],
}

impl ResourceBundle {
    /// Zero-seeded bundle.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn get(&self, resource: Resource) -> i64 {
        self.amounts[resource.slot()]
    }

    pub fn set(&mut self, resource: Resource, amount: i64) {
        self.amounts[resource.slot()] = amount;
    }

    /// All six `(resource, amount)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Resource, i64)> + '_ {
        Resource::ALL.into_iter().map(|r| (r, self.get(r)))
    }

    /// Resources in `cost` this bundle cannot cover, with the missing amount.
    /// Empty when the bundle covers every key.
    pub fn shortfall(&self, cost: &ResourceDelta) -> ResourceDelta {
        cost.iter()
            .filter(|(r, amount)| self.get(*r) < *amount)
            .map(|(r, amount)| (r, amount - self.get(r)))
            .collect()
    }

    pub fn covers(&self, cost: &ResourceDelta) -> bool {
        cost.iter().all(|(r, amount)| self.get(r) >= amount)
    }

    pub fn add(&mut self, delta: &ResourceDelta) {
        for (r, v) in delta.iter() {
            self.amounts[r.slot()] += v;
        }
    }

    pub fn subtract(&mut self, delta: &ResourceDelta) {
        for (r, v) in delta.iter() {
            self.amounts[r.slot()] -= v;
        }
    }

    /// Per-resource `self - earlier`, all six keys present.
    pub fn difference(&self, earlier: &ResourceBundle) -> ResourceDelta {
        self.iter().map(|(r, v)| (r, v - earlier.get(r))).collect()
    }
}

impl Index<Resource> for ResourceBundle {
    type Output = i64;

    fn index(&self, resource: Resource) -> &i64 {
        &self.amounts[resource.slot()]
    }
}

impl From<BTreeMap<Resource, i64>> for ResourceBundle {
    fn from(map: BTreeMap<Resource, i64>) -> Self {
        let mut bundle = Self::zero();
        for (r, v) in map {
            bundle.set(r, v);
        }
        bundle
    }
}

impl From<ResourceBundle> for BTreeMap<Resource, i64> {
    fn from(bundle: ResourceBundle) -> Self {
        bundle.iter().collect()
    }
}

impl From<&ResourceDelta> for ResourceBundle {
    fn from(delta: &ResourceDelta) -> Self {
        let mut bundle = Self::zero();
        bundle.add(delta);
        bundle
    }
}

impl fmt::Display for ResourceBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(r, v)| format!("{r}:{v}")).collect();
        write!(f, "{}", parts.join(" "))
    }
}
