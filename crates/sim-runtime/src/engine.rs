//! The round-by-round state machine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{
    validate_config, Allocations, CommodityId, GameConfig, PriceChanges, PriceSnapshot, TeamId,
    ValidationError,
};
use sim_econ::{apply_price_change, leaderboard, portfolio_value, EconError, Standing};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Where the game clock stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Waiting for the inputs of round `n` (1-based).
    Period(u32),
    /// Every round has been played.
    Finished,
}

/// Caller mistakes in the inputs of a round.
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("no price change given for commodity {0}")]
    MissingPriceChange(CommodityId),
    #[error("unknown commodity {0}")]
    UnknownCommodity(CommodityId),
    #[error("unknown team {0}")]
    UnknownTeam(TeamId),
    #[error("change of {pct}% on {commodity} leaves a non-positive price")]
    NonPositivePrice { commodity: CommodityId, pct: Decimal },
}

/// Errors produced by the engine.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),
    /// The last round has been played; call `reset` first.
    #[error("simulation complete after {total_periods} periods")]
    SimulationComplete { total_periods: u32 },
    /// A stored price is zero or negative. Internal invariant violation.
    #[error("corrupted price snapshot {snapshot}: {commodity} at {price}")]
    CorruptedSnapshot {
        snapshot: usize,
        commodity: CommodityId,
        price: Decimal,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),
    #[error("market math failed: {0}")]
    Econ(#[from] EconError),
}

/// Non-blocking remarks about round inputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Advisory {
    /// The team committed more than its capital.
    OverAllocated {
        team: TeamId,
        total: Decimal,
        capital: Decimal,
    },
    /// An amount is not a multiple of the allocation step.
    OffStep {
        team: TeamId,
        commodity: CommodityId,
        amount: Decimal,
    },
    /// A price change lies outside the advisory bound.
    ChangeOutOfBounds { commodity: CommodityId, pct: Decimal },
}

/// Outcome of one round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    /// Round that was just played (1-based).
    pub round: u32,
    /// Teams by descending wealth.
    pub standings: Vec<Standing>,
    /// Prices after the round.
    pub prices: PriceSnapshot,
    /// Whether this was the last round.
    pub finished: bool,
}

/// Wealth of one team at every period boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WealthSeries {
    pub team: TeamId,
    pub values: Vec<Decimal>,
}

/// Read-only view of the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub phase: Phase,
    /// Current period; stays at `total_periods` once finished.
    pub period: u32,
    pub total_periods: u32,
    pub rounds_played: u32,
    pub prices: PriceSnapshot,
    pub price_history: Vec<PriceSnapshot>,
    pub wealth: Vec<WealthSeries>,
}

/// Owns all state of one game.
#[derive(Clone, Debug)]
pub struct SimulationEngine {
    config: GameConfig,
    phase: Phase,
    price_history: Vec<PriceSnapshot>,
    // indexed like config.teams
    wealth_history: Vec<Vec<Decimal>>,
}

impl SimulationEngine {
    /// Start a game at period 1 with initial prices and capital.
    pub fn new(config: GameConfig) -> Result<Self, EngineError> {
        validate_config(&config)?;
        let initial = PriceSnapshot::uniform(&config.commodities, config.initial_price);
        let wealth_history = vec![vec![config.initial_capital]; config.teams.len()];
        Ok(Self {
            phase: Phase::Period(1),
            price_history: vec![initial],
            wealth_history,
            config,
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Current period number, `total_periods` once finished.
    pub fn period(&self) -> u32 {
        match self.phase {
            Phase::Period(n) => n,
            Phase::Finished => self.config.total_periods,
        }
    }

    pub fn current_prices(&self) -> &PriceSnapshot {
        // never empty: `new` and `reset` seed the initial snapshot
        &self.price_history[self.price_history.len() - 1]
    }

    pub fn price_history(&self) -> &[PriceSnapshot] {
        &self.price_history
    }

    pub fn wealth_series(&self, team: &TeamId) -> Option<&[Decimal]> {
        self.config
            .team_index(team)
            .map(|i| self.wealth_history[i].as_slice())
    }

    /// Discard every round and return to period 1.
    pub fn reset(&mut self) {
        self.phase = Phase::Period(1);
        self.price_history = vec![PriceSnapshot::uniform(
            &self.config.commodities,
            self.config.initial_price,
        )];
        self.wealth_history = vec![vec![self.config.initial_capital]; self.config.teams.len()];
        info!("simulation reset");
    }

    pub fn current_state(&self) -> SimulationState {
        SimulationState {
            phase: self.phase,
            period: self.period(),
            total_periods: self.config.total_periods,
            rounds_played: (self.price_history.len() - 1) as u32,
            prices: self.current_prices().clone(),
            price_history: self.price_history.clone(),
            wealth: self
                .config
                .teams
                .iter()
                .zip(&self.wealth_history)
                .map(|(team, values)| WealthSeries {
                    team: team.clone(),
                    values: values.clone(),
                })
                .collect(),
        }
    }

    /// Remarks a form would show before the round is run. Never blocks a round.
    pub fn advisories(&self, changes: &PriceChanges, allocations: &Allocations) -> Vec<Advisory> {
        let cfg = &self.config;
        let mut out = Vec::new();
        for team in &cfg.teams {
            let total = allocations.team_total(team);
            if total > cfg.initial_capital {
                out.push(Advisory::OverAllocated {
                    team: team.clone(),
                    total,
                    capital: cfg.initial_capital,
                });
            }
        }
        if !cfg.allocation_step.is_zero() {
            for (team, commodity, amount) in allocations.cells() {
                if !(amount % cfg.allocation_step).is_zero() {
                    out.push(Advisory::OffStep {
                        team: team.clone(),
                        commodity: commodity.clone(),
                        amount,
                    });
                }
            }
        }
        for commodity in &cfg.commodities {
            if let Some(pct) = changes.get(commodity) {
                if pct.abs() > cfg.price_change_bound_pct {
                    out.push(Advisory::ChangeOutOfBounds {
                        commodity: commodity.clone(),
                        pct,
                    });
                }
            }
        }
        out
    }

    fn check_inputs(&self, changes: &PriceChanges, allocations: &Allocations) -> Result<(), InputError> {
        let cfg = &self.config;
        for commodity in changes.commodities() {
            if cfg.commodity_index(commodity).is_none() {
                return Err(InputError::UnknownCommodity(commodity.clone()));
            }
        }
        for commodity in &cfg.commodities {
            if changes.get(commodity).is_none() {
                return Err(InputError::MissingPriceChange(commodity.clone()));
            }
        }
        for (team, commodity, _) in allocations.cells() {
            if cfg.team_index(team).is_none() {
                return Err(InputError::UnknownTeam(team.clone()));
            }
            if cfg.commodity_index(commodity).is_none() {
                return Err(InputError::UnknownCommodity(commodity.clone()));
            }
        }
        Ok(())
    }

    /// Play the current round.
    ///
    /// Prices move by `changes`; each team's allocations are bought at the
    /// previous prices and marked at the new ones. Unallocated capital earns
    /// nothing and is not carried into the new wealth. On error the engine is
    /// left untouched.
    pub fn advance_round(
        &mut self,
        changes: &PriceChanges,
        allocations: &Allocations,
    ) -> Result<RankedResult, EngineError> {
        let round = match self.phase {
            Phase::Period(n) => n,
            Phase::Finished => {
                return Err(EngineError::SimulationComplete {
                    total_periods: self.config.total_periods,
                })
            }
        };
        self.check_inputs(changes, allocations)?;
        for advisory in self.advisories(changes, allocations) {
            warn!(round, ?advisory, "round input advisory");
        }

        let previous = self.current_prices();
        let snapshot = self.price_history.len() - 1;
        let mut next = PriceSnapshot::default();
        for entry in previous.iter() {
            if entry.price <= Decimal::ZERO {
                error!(snapshot, commodity = %entry.commodity, price = %entry.price, "corrupted price snapshot");
                return Err(EngineError::CorruptedSnapshot {
                    snapshot,
                    commodity: entry.commodity.clone(),
                    price: entry.price,
                });
            }
            // presence checked above
            let pct = changes.get(&entry.commodity).unwrap_or(Decimal::ZERO);
            let price = match apply_price_change(entry.price, pct) {
                Ok(p) => p,
                Err(EconError::NonPositivePrice { .. }) => {
                    return Err(InputError::NonPositivePrice {
                        commodity: entry.commodity.clone(),
                        pct,
                    }
                    .into())
                }
                Err(e) => return Err(e.into()),
            };
            next.push(entry.commodity.clone(), price);
        }

        let mut results = Vec::with_capacity(self.config.teams.len());
        for team in &self.config.teams {
            let positions = previous.iter().zip(next.iter()).map(|(old, new)| {
                (allocations.amount(team, &old.commodity), old.price, new.price)
            });
            let wealth = portfolio_value(positions)?;
            debug!(round, team = %team, %wealth, "team valued");
            results.push((team.clone(), wealth));
        }

        // commit
        for (history, (_, wealth)) in self.wealth_history.iter_mut().zip(&results) {
            history.push(*wealth);
        }
        self.price_history.push(next.clone());
        self.phase = if round < self.config.total_periods {
            Phase::Period(round + 1)
        } else {
            Phase::Finished
        };

        let standings = leaderboard(results);
        let finished = self.is_finished();
        if let Some(leader) = standings.first() {
            info!(round, leader = %leader.team, wealth = %leader.wealth, finished, "round complete");
        }
        Ok(RankedResult {
            round,
            standings,
            prices: next,
            finished,
        })
    }

    #[cfg(test)]
    pub(crate) fn corrupt_price(&mut self, commodity: usize, price: Decimal) {
        let last = self.price_history.len() - 1;
        let mut snap = PriceSnapshot::default();
        for (i, e) in self.price_history[last].iter().enumerate() {
            snap.push(e.commodity.clone(), if i == commodity { price } else { e.price });
        }
        self.price_history[last] = snap;
    }
}
