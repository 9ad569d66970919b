use criterion::{criterion_group, criterion_main, Criterion};
use sim_core::{GameConfig, PriceChanges};

fn bench_rounds(c: &mut Criterion) {
    let cfg = GameConfig {
        total_periods: u32::MAX,
        ..GameConfig::default()
    };
    let allocations = sim_runtime::even_split(&cfg);
    let flat = PriceChanges::from_pairs(
        cfg.commodities
            .iter()
            .map(|c| (c.clone(), rust_decimal::Decimal::ZERO)),
    );
    let mut engine = sim_runtime::init_engine(cfg).unwrap();
    c.bench_function("advance_round", |b| {
        b.iter(|| {
            if engine.price_history().len() > 1_000 {
                engine.reset();
            }
            let _ = engine.advance_round(&flat, &allocations);
        })
    });
    let snapshot_engine = engine.clone();
    c.bench_function("current_state", |b| b.iter(|| snapshot_engine.current_state()));
}

criterion_group!(benches, bench_rounds);
criterion_main!(benches);
