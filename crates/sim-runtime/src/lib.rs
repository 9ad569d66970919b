#![deny(warnings)]

//! Simulation runtime: the round state machine, per-session registry and
//! scripted scenarios.

pub mod engine;
pub mod scenario;
pub mod session;

pub use engine::{
    Advisory, EngineError, InputError, Phase, RankedResult, SimulationEngine, SimulationState,
    WealthSeries,
};
pub use scenario::{run_scenario, seeded_changes, Scenario, ScenarioError, ScenarioRound};
pub use session::{SessionError, SessionHandle, SessionId, SessionRegistry};

use rust_decimal::Decimal;
use sim_core::{Allocations, GameConfig};

/// Start a game with the given configuration.
pub fn init_engine(config: GameConfig) -> Result<SimulationEngine, EngineError> {
    SimulationEngine::new(config)
}

/// Every team splits its capital evenly across all commodities.
///
/// Handy for demos and benchmarks; the remainder of an uneven split stays unallocated.
pub fn even_split(config: &GameConfig) -> Allocations {
    let mut alloc = Allocations::new();
    let n = Decimal::from(config.commodities.len());
    let share = if n.is_zero() {
        Decimal::ZERO
    } else {
        (config.initial_capital / n).round_dp_with_strategy(2, rust_decimal::RoundingStrategy::ToZero)
    };
    for team in &config.teams {
        for commodity in &config.commodities {
            alloc.set(team.clone(), commodity.clone(), share);
        }
    }
    alloc
}

/// Play `rounds` seeded random-market rounds with `allocations`, stopping early when finished.
pub fn run_rounds(
    engine: &mut SimulationEngine,
    allocations: &Allocations,
    rounds: u32,
    seed: u64,
) -> Result<Vec<RankedResult>, ScenarioError> {
    let mut results = Vec::new();
    for i in 0..rounds {
        if engine.is_finished() {
            break;
        }
        let changes = seeded_changes(engine.config(), seed.wrapping_add(u64::from(i)))?;
        results.push(engine.advance_round(&changes, allocations)?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_creates() {
        let engine = init_engine(GameConfig::default()).unwrap();
        assert_eq!(engine.phase(), Phase::Period(1));
    }

    #[test]
    fn even_split_uses_whole_capital() {
        let cfg = GameConfig::default();
        let alloc = even_split(&cfg);
        for team in &cfg.teams {
            assert_eq!(alloc.team_total(team), cfg.initial_capital);
        }
    }

    #[test]
    fn run_rounds_stops_when_finished() {
        let cfg = GameConfig::default();
        let mut engine = init_engine(cfg.clone()).unwrap();
        let results = run_rounds(&mut engine, &even_split(&cfg), 10, 42).unwrap();
        assert_eq!(results.len(), 3);
        assert!(engine.is_finished());
        // all teams hold the same book, so they tie and keep team order
        let order: Vec<_> = results[2].standings.iter().map(|s| s.team.clone()).collect();
        assert_eq!(order, cfg.teams);
    }
}
