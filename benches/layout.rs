use criterion::*;
use std::hint::black_box;

use cellsim::engine::manager::ResourceManager;
use cellsim::engine::mechanics::MechanicalResolver;
use cellsim::engine::param::Param;
use cellsim::engine::spatial::SpatialIndex;
use cellsim::engine::storage::{AosStorage, CellStorage, SoaStorage};

mod common;
use common::*;

fn prepared<S: CellStorage>(param: &Param) -> (ResourceManager<S>, SpatialIndex) {
    let mut manager = ResourceManager::<S>::new();
    populate(&mut manager, GRID_MED).unwrap();
    let mut index = SpatialIndex::new();
    index.rebuild(manager.containers(), param.interaction_margin(), 0);
    (manager, index)
}

fn bench_layout<S: CellStorage>(group: &mut BenchmarkGroup<'_, measurement::WallTime>, name: &str) {
    let param = Param::default();

    group.bench_function(format!("{name}/behavior_modules_32k"), |b| {
        b.iter_batched(
            || prepared::<S>(&param),
            |(mut manager, index)| {
                for container in manager.containers_mut() {
                    black_box(container.run_behavior_modules(&param, &index, 0).unwrap());
                }
                black_box(manager);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function(format!("{name}/mechanics_32k"), |b| {
        let resolver = MechanicalResolver::from_param(&param);
        b.iter_batched(
            || prepared::<S>(&param),
            |(mut manager, index)| {
                black_box(resolver.resolve(&mut manager, &index).unwrap());
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function(format!("{name}/index_rebuild_32k"), |b| {
        let (manager, mut index) = prepared::<S>(&param);
        b.iter(|| {
            index.rebuild(manager.containers(), param.interaction_margin(), 0);
            black_box(index.len());
        });
    });
}

fn layout_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    group.sample_size(20);
    bench_layout::<AosStorage>(&mut group, "aos");
    bench_layout::<SoaStorage>(&mut group, "soa");
    group.finish();
}

criterion_group!(benches, layout_benchmark);
criterion_main!(benches);
