//! Scripted games loaded from YAML.
//!
//! ```yaml
//! name: classroom
//! seed: 7
//! config:
//!   total_periods: 2
//! rounds:
//!   - price_changes: { Gold: 10, Oil: -20, Wheat: 0, Tin: 5, Coffee: -5 }
//!     allocations:
//!       "Team 1": { Gold: 200000 }
//!   - allocations:
//!       "Team 2": { Oil: "500000" }
//! ```
//!
//! Rounds without `price_changes` draw them from the seeded market.

use crate::engine::{EngineError, RankedResult, SimulationEngine};
use serde::Deserialize;
use sim_core::{Allocations, GameConfig, PriceChanges, RawAllocations};
use sim_econ::random_price_changes;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid scenario: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("round {round} has no price changes and the scenario has no seed")]
    MissingPriceChanges { round: usize },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Inputs of one scripted round.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ScenarioRound {
    #[serde(default)]
    pub price_changes: Option<PriceChanges>,
    /// Raw cells; coerced to amounts when the round is played.
    #[serde(default)]
    pub allocations: RawAllocations,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    /// Base seed for rounds that omit price changes.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub config: GameConfig,
    #[serde(default)]
    pub rounds: Vec<ScenarioRound>,
}

impl Scenario {
    pub fn from_yaml_str(text: &str) -> Result<Self, ScenarioError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Price changes for round `index` (0-based), drawing from the market if absent.
    pub fn price_changes(&self, index: usize) -> Result<PriceChanges, ScenarioError> {
        let round = self.rounds.get(index).cloned().unwrap_or_default();
        if let Some(changes) = round.price_changes {
            return Ok(changes);
        }
        let seed = self
            .seed
            .ok_or(ScenarioError::MissingPriceChanges { round: index + 1 })?;
        seeded_changes(&self.config, seed.wrapping_add(index as u64))
    }
}

/// Whole-percent moves for every commodity within the advisory bound.
pub fn seeded_changes(config: &GameConfig, seed: u64) -> Result<PriceChanges, ScenarioError> {
    let moves = random_price_changes(config.commodities.len(), config.price_change_bound_pct, seed)
        .map_err(EngineError::from)?;
    Ok(PriceChanges::from_pairs(
        config.commodities.iter().cloned().zip(moves),
    ))
}

/// Play every scripted round in order, stopping at the first error.
pub fn run_scenario(
    engine: &mut SimulationEngine,
    scenario: &Scenario,
) -> Result<Vec<RankedResult>, ScenarioError> {
    info!(name = ?scenario.name, rounds = scenario.rounds.len(), "running scenario");
    let mut results = Vec::with_capacity(scenario.rounds.len());
    for (i, round) in scenario.rounds.iter().enumerate() {
        let changes = scenario.price_changes(i)?;
        let allocations = Allocations::from_raw(&round.allocations);
        results.push(engine.advance_round(&changes, &allocations)?);
    }
    Ok(results)
}
