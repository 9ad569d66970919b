#![deny(warnings)]

//! Headless CLI: plays a scripted or random-market game and prints leaderboards.

use anyhow::{Context, Result};
use sim_core::GameConfig;
use sim_runtime::{RankedResult, Scenario, SimulationState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    scenario: Option<String>,
    seed: Option<u64>,
    rounds: Option<u32>,
    json: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" => args.scenario = it.next(),
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()),
            "--rounds" => args.rounds = it.next().and_then(|s| s.parse().ok()),
            "--json" => args.json = true,
            _ => {}
        }
    }
    args
}

fn print_round(res: &RankedResult) {
    println!("== Round {} ==", res.round);
    let prices: Vec<String> = res
        .prices
        .iter()
        .map(|e| format!("{}={}", e.commodity, e.price))
        .collect();
    println!("prices | {}", prices.join(" | "));
    for s in &res.standings {
        println!("{:>2}. {:<12} ${}", s.rank, s.team.0, s.wealth);
    }
    if res.finished {
        println!("Game over!");
    }
}

fn print_series(state: &SimulationState) {
    println!(
        "== Wealth by period ({} / {}) ==",
        state.period, state.total_periods
    );
    for series in &state.wealth {
        let values: Vec<String> = series.values.iter().map(|v| v.to_string()).collect();
        println!("{:<12} {}", series.team.0, values.join(" -> "));
    }
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args();
    info!(?args, "starting CLI");

    let (engine, results) = match &args.scenario {
        Some(path) => {
            let mut scenario = Scenario::from_file(path)
                .with_context(|| format!("loading scenario {path}"))?;
            if args.seed.is_some() {
                scenario.seed = args.seed;
            }
            let mut engine = sim_runtime::init_engine(scenario.config.clone())?;
            let results = sim_runtime::run_scenario(&mut engine, &scenario)?;
            (engine, results)
        }
        None => {
            let cfg = GameConfig::default();
            let rounds = args.rounds.unwrap_or(cfg.total_periods);
            let allocations = sim_runtime::even_split(&cfg);
            let mut engine = sim_runtime::init_engine(cfg)?;
            let results =
                sim_runtime::run_rounds(&mut engine, &allocations, rounds, args.seed.unwrap_or(42))?;
            (engine, results)
        }
    };

    let state = engine.current_state();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        for res in &results {
            print_round(res);
        }
        print_series(&state);
    }
    Ok(())
}
