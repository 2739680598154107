use cellsim::engine::cell::{volume_of, Cell};
use cellsim::engine::container::CellContainer;
use cellsim::engine::error::SimResult;
use cellsim::engine::reduce::{Count, MinMax, Sum, Welford};
use cellsim::engine::snapshot::{ContainerView, Snapshot, StepSummary};
use cellsim::engine::storage::{AosStorage, SoaStorage};
use cellsim::engine::types::{AgentType, CellType};
use glam::DVec3;

mod common;
use common::*;

const SAMPLES: [f64; 7] = [4.0, 7.0, 13.0, 16.0, 2.5, 9.0, 11.5];

fn welford_of(values: &[f64]) -> Welford {
    let mut w = Welford::default();
    values.iter().for_each(|x| w.push(*x));
    w
}

#[test]
fn min_max_tracks_extremes() {
    let mut m = MinMax::default();
    assert!(m.is_empty());
    SAMPLES.iter().for_each(|x| m.push(*x));
    assert!(!m.is_empty());
    assert_eq!(m.min, 2.5);
    assert_eq!(m.max, 16.0);
}

#[test]
fn welford_matches_the_two_pass_statistics() {
    let w = welford_of(&SAMPLES);
    let n = SAMPLES.len() as f64;
    let mean = SAMPLES.iter().sum::<f64>() / n;
    let variance = SAMPLES.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);

    assert_eq!(w.n, 7);
    assert_close(w.mean, mean, 1e-12);
    assert_close(w.variance(), variance, 1e-12);
    assert_eq!(welford_of(&[3.0]).variance(), 0.0);
}

#[test]
fn combining_any_split_gives_the_same_result() {
    let whole = welford_of(&SAMPLES);

    for cut in 0..=SAMPLES.len() {
        let (left, right) = SAMPLES.split_at(cut);
        let mut merged = welford_of(left);
        merged.combine(&welford_of(right));
        assert_eq!(merged.n, whole.n);
        assert_close(merged.mean, whole.mean, 1e-12);
        assert_close(merged.variance(), whole.variance(), 1e-12);

        let mut lo = MinMax::default();
        left.iter().for_each(|x| lo.push(*x));
        let mut hi = MinMax::default();
        right.iter().for_each(|x| hi.push(*x));
        lo.combine(&hi);
        assert_eq!((lo.min, lo.max), (2.5, 16.0));
    }

    // (a + b) + c == a + (b + c)
    let (a, rest) = SAMPLES.split_at(2);
    let (b, c) = rest.split_at(3);
    let mut left = welford_of(a);
    left.combine(&welford_of(b));
    left.combine(&welford_of(c));
    let mut bc = welford_of(b);
    bc.combine(&welford_of(c));
    let mut right = welford_of(a);
    right.combine(&bc);
    assert_eq!(left.n, right.n);
    assert_close(left.mean, right.mean, 1e-12);
    assert_close(left.m2, right.m2, 1e-12);

    let mut count = Count(3);
    count.combine(&Count(4));
    assert_eq!(count, Count(7));
    let mut sum = Sum(1.5);
    sum.combine(&Sum(2.0));
    assert_eq!(sum, Sum(3.5));
}

#[test]
fn step_summary_merges_containers_per_type() -> SimResult<()> {
    let mut first = CellContainer::<SoaStorage>::new(AgentType(0));
    let mut second = CellContainer::<AosStorage>::new(AgentType(1));
    for (i, diameter) in [20.0, 30.0, 40.0].into_iter().enumerate() {
        first.append(Cell::new(DVec3::new(i as f64 * 50.0, 0.0, 0.0)).with_diameter(diameter).with_cell_type(CellType(1)))?;
    }
    second.append(Cell::new(DVec3::ZERO).with_diameter(10.0).with_mass(2.0).with_cell_type(CellType(1)))?;
    second.append(Cell::new(DVec3::ZERO).with_diameter(25.0).with_cell_type(CellType(2)))?;
    first.commit()?;
    second.commit()?;

    let snapshot = Snapshot::new(4, vec![&first as &dyn ContainerView, &second as &dyn ContainerView]);
    let summary = StepSummary::from_snapshot(&snapshot);

    let mut merged = StepSummary::from_container(4, &first);
    merged.combine(&StepSummary::from_container(4, &second));
    assert_eq!(merged.by_type.len(), summary.by_type.len());

    assert_eq!(summary.step, 4);
    assert_eq!(summary.population(), 5);
    assert_eq!(summary.count_of(CellType(1)), 4);
    assert_eq!(summary.count_of(CellType(2)), 1);
    assert_close(summary.mass_of(CellType(1)), 5.0, 1e-12);

    let type_one = &summary.by_type[&CellType(1)];
    assert_eq!((type_one.diameter.min, type_one.diameter.max), (10.0, 40.0));
    let volumes = [volume_of(20.0), volume_of(30.0), volume_of(40.0), volume_of(10.0)];
    let expected = welford_of(&volumes);
    assert_eq!(type_one.volume.n, 4);
    assert_close(type_one.volume.mean, expected.mean, 1e-12);
    assert_close(type_one.volume.variance(), expected.variance(), 1e-9);

    for (cell_type, part) in &merged.by_type {
        let whole = &summary.by_type[cell_type];
        assert_eq!(part.count, whole.count);
        assert_eq!(part.diameter, whole.diameter);
        assert_close(part.mass.0, whole.mass.0, 1e-12);
    }
    Ok(())
}
