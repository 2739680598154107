#![allow(dead_code)]

use cellsim::engine::cell::Cell;
use cellsim::engine::error::SimResult;
use cellsim::engine::manager::ResourceManager;
use cellsim::engine::module::{ClassificationModule, GrowthModule, MigrationModule};
use cellsim::engine::param::Param;
use cellsim::engine::scheduler::Scheduler;
use cellsim::engine::storage::CellStorage;
use glam::DVec3;

pub const GRID_SMALL: usize = 16;
pub const GRID_MED: usize = 32;
pub const SPACE: f64 = 20.0;

pub fn tumor_cell(position: DVec3) -> Cell {
    Cell::new(position)
        .with_diameter(30.0)
        .with_adherence(0.4)
        .with_module(ClassificationModule::default())
        .with_module(GrowthModule::new(300_000.0, 40.0))
        .with_module(MigrationModule::new(50.0))
}

pub fn populate<S: CellStorage>(manager: &mut ResourceManager<S>, cells_per_dim: usize) -> SimResult<()> {
    let tumor = manager.register_agent_type("tumor")?;
    manager.grid_3d(tumor, cells_per_dim, SPACE, tumor_cell)?;
    Ok(())
}

pub fn make_scheduler<S: CellStorage>(cells_per_dim: usize, threads: Option<usize>) -> SimResult<Scheduler<S>> {
    let mut scheduler = Scheduler::<S>::new(Param { threads, ..Param::default() })?;
    scheduler.setup(|manager| populate(manager, cells_per_dim))?;
    Ok(scheduler)
}
