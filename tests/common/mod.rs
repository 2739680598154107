#![allow(dead_code)]

use std::sync::Once;

use cellsim::engine::cell::Cell;
use cellsim::engine::container::CellContainer;
use cellsim::engine::error::SimResult;
use cellsim::engine::manager::ResourceManager;
use cellsim::engine::module::{ClassificationModule, GrowthModule, MigrationModule};
use cellsim::engine::param::Param;
use cellsim::engine::random::CellRng;
use cellsim::engine::storage::CellStorage;
use cellsim::engine::types::{AgentType, CellId, CellType};
use glam::DVec3;

pub const GROWTH_RATE: f64 = 300_000.0;
pub const THRESHOLD: f64 = 40.0;

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub fn param(threads: Option<usize>) -> Param {
    Param { threads, ..Param::default() }
}

/// Cell of diameter 30 with growth and classification, the configuration of
/// the tumor growth model.
pub fn tumor_cell(position: DVec3) -> Cell {
    Cell::new(position)
        .with_diameter(30.0)
        .with_adherence(0.4)
        .with_module(ClassificationModule::default())
        .with_module(GrowthModule::new(GROWTH_RATE, THRESHOLD))
}

/// Tumor cell that also migrates.
pub fn migrating_tumor_cell(position: DVec3) -> Cell {
    tumor_cell(position).with_module(MigrationModule::new(50.0))
}

/// Registers a "tumor" agent type and fills it with a committed lattice.
pub fn tumor_grid<S: CellStorage>(
    manager: &mut ResourceManager<S>,
    cells_per_dim: usize,
    space: f64,
) -> SimResult<AgentType> {
    let tumor = manager.register_agent_type("tumor")?;
    manager.grid_3d(tumor, cells_per_dim, space, migrating_tumor_cell)?;
    Ok(tumor)
}

/// Deterministic cloud of cells with varied diameters.
pub fn random_cloud(n: usize, extent: f64, seed: u64) -> Vec<Cell> {
    let mut rng = CellRng::from_seed_u64(seed);
    (0..n)
        .map(|_| {
            let position = DVec3::new(rng.next_f64(), rng.next_f64(), rng.next_f64()) * extent;
            Cell::new(position).with_diameter(5.0 + 20.0 * rng.next_f64())
        })
        .collect()
}

pub type Fingerprint = Vec<(CellId, [u64; 3], u64, u64, CellType)>;

/// Exact, comparable state of every cell of a container.
pub fn fingerprint<S: CellStorage>(container: &CellContainer<S>) -> Fingerprint {
    let mut out = Vec::with_capacity(container.len());
    container.for_each(|id, cell| {
        let p = cell.position();
        out.push((
            id,
            [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()],
            cell.diameter().to_bits(),
            cell.mass().to_bits(),
            cell.cell_type(),
        ));
    });
    out
}

pub fn total_volume<S: CellStorage>(container: &CellContainer<S>) -> f64 {
    let mut total = 0.0;
    container.for_each(|_, cell| total += cell.volume());
    total
}

pub fn total_mass<S: CellStorage>(container: &CellContainer<S>) -> f64 {
    let mut total = 0.0;
    container.for_each(|_, cell| total += cell.mass());
    total
}

pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance * expected.abs().max(1.0),
        "expected {expected}, got {actual} (tolerance {tolerance})"
    );
}
