#![deny(warnings)]

//! Core domain models and invariants for Market Mavericks.
//!
//! This crate defines the serializable types shared by the simulation
//! (commodities, teams, price snapshots, per-round inputs) together with
//! validation helpers and the tolerant coercion used at the input boundary.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// Commodities traded in a default game, in display order.
pub const DEFAULT_COMMODITIES: [&str; 5] = ["Gold", "Oil", "Wheat", "Tin", "Coffee"];

/// Teams taking part in a default game, in display order.
pub const DEFAULT_TEAMS: [&str; 5] = ["Team 1", "Team 2", "Team 3", "Team 4", "Team 5"];

/// Starting price of every commodity (200,000).
pub const INITIAL_PRICE: Decimal = Decimal::from_parts(200_000, 0, 0, false, 0);

/// Starting capital of every team (1,000,000).
pub const INITIAL_CAPITAL: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Number of rounds in a game.
pub const TOTAL_PERIODS: u32 = 3;

/// Advisory bound on a single price change, in percent.
pub const PRICE_CHANGE_BOUND_PCT: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

/// Advisory granularity of allocation inputs (10,000).
pub const ALLOCATION_STEP: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Commodity name, e.g. "Gold".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommodityId(pub String);

impl CommodityId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for CommodityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Team name, e.g. "Team 1".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub String);

impl TeamId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Game parameters. Every field falls back to the named constants above.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Ordered commodity set.
    pub commodities: Vec<CommodityId>,
    /// Ordered team set.
    pub teams: Vec<TeamId>,
    /// Price of every commodity at period 0 (> 0).
    pub initial_price: Decimal,
    /// Wealth of every team at period 0 (>= 0).
    pub initial_capital: Decimal,
    /// Number of rounds before the game finishes (> 0).
    pub total_periods: u32,
    /// Advisory bound on price changes in percent (>= 0).
    pub price_change_bound_pct: Decimal,
    /// Advisory allocation granularity (>= 0, zero disables the check).
    pub allocation_step: Decimal,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            commodities: DEFAULT_COMMODITIES.iter().map(|c| CommodityId::new(*c)).collect(),
            teams: DEFAULT_TEAMS.iter().map(|t| TeamId::new(*t)).collect(),
            initial_price: INITIAL_PRICE,
            initial_capital: INITIAL_CAPITAL,
            total_periods: TOTAL_PERIODS,
            price_change_bound_pct: PRICE_CHANGE_BOUND_PCT,
            allocation_step: ALLOCATION_STEP,
        }
    }
}

impl GameConfig {
    /// Position of a commodity in the configured order.
    pub fn commodity_index(&self, id: &CommodityId) -> Option<usize> {
        self.commodities.iter().position(|c| c == id)
    }

    /// Position of a team in the configured order.
    pub fn team_index(&self, id: &TeamId) -> Option<usize> {
        self.teams.iter().position(|t| t == id)
    }
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// The game needs at least one commodity.
    #[error("commodity set is empty")]
    NoCommodities,
    /// The game needs at least one team.
    #[error("team set is empty")]
    NoTeams,
    /// Names must be non-blank.
    #[error("blank name in {0} set")]
    BlankName(&'static str),
    /// Names must be unique within their set.
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    /// Prices must be strictly positive.
    #[error("initial price must be > 0, got {0}")]
    NonPositivePrice(Decimal),
    /// Capital, bounds and steps must be non-negative.
    #[error("negative monetary value is invalid")]
    NegativeMoney,
    /// A game has at least one round.
    #[error("total periods must be > 0")]
    NoPeriods,
}

fn check_names<'a, I>(names: I, set: &'static str) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(ValidationError::BlankName(set));
        }
        if !seen.insert(name) {
            return Err(ValidationError::DuplicateName(name.to_string()));
        }
    }
    Ok(())
}

/// Validate a game configuration.
pub fn validate_config(cfg: &GameConfig) -> Result<(), ValidationError> {
    if cfg.commodities.is_empty() {
        return Err(ValidationError::NoCommodities);
    }
    if cfg.teams.is_empty() {
        return Err(ValidationError::NoTeams);
    }
    check_names(cfg.commodities.iter().map(|c| c.0.as_str()), "commodity")?;
    check_names(cfg.teams.iter().map(|t| t.0.as_str()), "team")?;
    if cfg.initial_price <= Decimal::ZERO {
        return Err(ValidationError::NonPositivePrice(cfg.initial_price));
    }
    if cfg.initial_capital < Decimal::ZERO
        || cfg.price_change_bound_pct < Decimal::ZERO
        || cfg.allocation_step < Decimal::ZERO
    {
        return Err(ValidationError::NegativeMoney);
    }
    if cfg.total_periods == 0 {
        return Err(ValidationError::NoPeriods);
    }
    Ok(())
}

/// Price of one commodity inside a snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommodityPrice {
    pub commodity: CommodityId,
    pub price: Decimal,
}

/// Prices of every commodity at one period boundary, in commodity order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceSnapshot(Vec<CommodityPrice>);

impl PriceSnapshot {
    /// Snapshot where every commodity has the same price.
    pub fn uniform(commodities: &[CommodityId], price: Decimal) -> Self {
        Self(
            commodities
                .iter()
                .map(|c| CommodityPrice {
                    commodity: c.clone(),
                    price,
                })
                .collect(),
        )
    }

    pub fn push(&mut self, commodity: CommodityId, price: Decimal) {
        self.0.push(CommodityPrice { commodity, price });
    }

    pub fn get(&self, commodity: &CommodityId) -> Option<Decimal> {
        self.0
            .iter()
            .find(|e| &e.commodity == commodity)
            .map(|e| e.price)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommodityPrice> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Percentage price change per commodity for one round.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceChanges(BTreeMap<CommodityId, Decimal>);

impl PriceChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs commodities with changes positionally.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (CommodityId, Decimal)>,
    {
        Self(pairs.into_iter().collect())
    }

    pub fn insert(&mut self, commodity: CommodityId, pct: Decimal) {
        self.0.insert(commodity, pct);
    }

    pub fn get(&self, commodity: &CommodityId) -> Option<Decimal> {
        self.0.get(commodity).copied()
    }

    pub fn commodities(&self) -> impl Iterator<Item = &CommodityId> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Funds each team commits to each commodity for the current round.
///
/// Amounts are never negative: `set` clamps at zero and absent cells read as zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Allocations(BTreeMap<TeamId, BTreeMap<CommodityId, Decimal>>);

/// Raw allocation cells as they arrive from a form or a scenario file.
pub type RawAllocations = BTreeMap<TeamId, BTreeMap<CommodityId, serde_json::Value>>;

impl Allocations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coerce raw cells into amounts; unreadable cells become zero.
    pub fn from_raw(raw: &RawAllocations) -> Self {
        let mut out = Self::new();
        for (team, cells) in raw {
            for (commodity, value) in cells {
                out.set(team.clone(), commodity.clone(), coerce_amount(value));
            }
        }
        out
    }

    pub fn set(&mut self, team: TeamId, commodity: CommodityId, amount: Decimal) {
        self.0
            .entry(team)
            .or_default()
            .insert(commodity, amount.max(Decimal::ZERO));
    }

    pub fn amount(&self, team: &TeamId, commodity: &CommodityId) -> Decimal {
        self.0
            .get(team)
            .and_then(|row| row.get(commodity))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Sum of a team's allocations, saturating at `Decimal::MAX`.
    pub fn team_total(&self, team: &TeamId) -> Decimal {
        self.0
            .get(team)
            .map(|row| {
                row.values()
                    .try_fold(Decimal::ZERO, |acc, a| acc.checked_add(*a))
                    .unwrap_or(Decimal::MAX)
            })
            .unwrap_or(Decimal::ZERO)
    }

    pub fn teams(&self) -> impl Iterator<Item = &TeamId> {
        self.0.keys()
    }

    /// Every (team, commodity, amount) cell that was explicitly set.
    pub fn cells(&self) -> impl Iterator<Item = (&TeamId, &CommodityId, Decimal)> {
        self.0
            .iter()
            .flat_map(|(t, row)| row.iter().map(move |(c, a)| (t, c, *a)))
    }
}

fn non_negative(d: Decimal) -> Decimal {
    if d.is_sign_negative() {
        Decimal::ZERO
    } else {
        d
    }
}

/// Parse a user-typed amount, falling back to zero.
///
/// Accepts plain decimals ("150000", " 2.5 ") and float notation ("1e5").
/// Anything unreadable, non-finite or negative yields zero.
pub fn parse_amount(raw: &str) -> Decimal {
    let s = raw.trim();
    let parsed = s.parse::<Decimal>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .and_then(Decimal::from_f64)
    });
    parsed.map(non_negative).unwrap_or(Decimal::ZERO)
}

/// Coerce a JSON/YAML scalar into an amount, falling back to zero.
pub fn coerce_amount(value: &serde_json::Value) -> Decimal {
    match value {
        serde_json::Value::Number(n) => parse_amount(&n.to_string()),
        serde_json::Value::String(s) => parse_amount(s),
        _ => Decimal::ZERO,
    }
}
