use criterion::*;
use std::hint::black_box;

use cellsim::engine::storage::SoaStorage;

mod common;
use common::*;

fn step_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");
    group.sample_size(20);

    for threads in [1, 4] {
        group.bench_with_input(BenchmarkId::new("grid_16_cubed", threads), &threads, |b, &threads| {
            b.iter_batched(
                || make_scheduler::<SoaStorage>(GRID_SMALL, Some(threads)).unwrap(),
                |mut scheduler| {
                    let report = scheduler.run(1).unwrap();
                    black_box(report);
                },
                BatchSize::LargeInput,
            );
        });
    }

    // Ten steps crosses the first division wave of the lattice.
    group.bench_function("grid_16_cubed_10_steps", |b| {
        b.iter_batched(
            || make_scheduler::<SoaStorage>(GRID_SMALL, None).unwrap(),
            |mut scheduler| {
                let report = scheduler.run(10).unwrap();
                black_box(report);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, step_benchmark);
criterion_main!(benches);
