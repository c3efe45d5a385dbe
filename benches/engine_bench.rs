use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cfr_engine::engine::best_response::exploitability;
use cfr_engine::engine::probing::{ProbingCfr, ProbingVariant};
use cfr_engine::engine::vanilla::VanillaCfr;
use cfr_engine::engine::{RegretTable, SolverConfig};
use cfr_engine::games::kuhn::Kuhn;

fn bench_vanilla_iteration(c: &mut Criterion) {
    let game = Kuhn::new();
    let table = RegretTable::for_tree(&game);
    let config = SolverConfig::default();
    let cfr = VanillaCfr::new(&game, &table, &config);

    c.bench_function("vanilla_iteration_kuhn", |b| {
        b.iter(|| {
            black_box(cfr.iterate(0).unwrap());
            black_box(cfr.iterate(1).unwrap());
        })
    });
}

fn bench_probing_iteration(c: &mut Criterion) {
    let game = Kuhn::new();
    let table = RegretTable::for_tree(&game);
    let config = SolverConfig::named("gibson").unwrap();

    c.bench_function("probing_iteration_kuhn", |b| {
        let mut iteration = 0u64;
        b.iter(|| {
            iteration += 1;
            let cfr = ProbingCfr::new(&game, &table, ProbingVariant::Gibson, &config, iteration);
            black_box(cfr.iterate(0).unwrap());
            black_box(cfr.iterate(1).unwrap());
        })
    });
}

fn bench_best_response(c: &mut Criterion) {
    let game = Kuhn::new();
    let table = RegretTable::for_tree(&game);
    let config = SolverConfig::default();
    let cfr = VanillaCfr::new(&game, &table, &config);
    for _ in 0..100 {
        cfr.iterate(0).unwrap();
        cfr.iterate(1).unwrap();
    }

    c.bench_function("best_response_kuhn", |b| {
        b.iter(|| black_box(exploitability(&game, &table).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_vanilla_iteration,
    bench_probing_iteration,
    bench_best_response
);
criterion_main!(benches);
