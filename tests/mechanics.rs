use cellsim::engine::cell::Cell;
use cellsim::engine::error::SimResult;
use cellsim::engine::manager::ResourceManager;
use cellsim::engine::mechanics::{InteractionForce, MechanicalResolver};
use cellsim::engine::spatial::{IndexedCell, SpatialIndex};
use cellsim::engine::storage::{AosStorage, CellStorage, SoaStorage};
use cellsim::engine::types::{AgentType, CellId};
use glam::DVec3;

mod common;
use common::*;

fn indexed(index: u32, position: DVec3, diameter: f64) -> IndexedCell {
    IndexedCell { id: CellId::new(AgentType(0), index, 0), position, diameter }
}

fn manager_with<S: CellStorage>(cells: Vec<Cell>) -> SimResult<ResourceManager<S>> {
    let mut manager = ResourceManager::<S>::new();
    let t = manager.register_agent_type("cells")?;
    let container = manager.container_for(t)?;
    for cell in cells {
        container.append(cell)?;
    }
    manager.commit_all()?;
    Ok(manager)
}

fn positions<S: CellStorage>(manager: &ResourceManager<S>) -> Vec<DVec3> {
    let mut out = Vec::new();
    for container in manager.containers() {
        container.for_each(|_, cell| out.push(cell.position()));
    }
    out
}

#[test]
fn pair_force_is_antisymmetric() {
    let force = InteractionForce::from_param(&param(None));
    let a = indexed(0, DVec3::new(0.0, 0.0, 0.0), 30.0);
    let b = indexed(1, DVec3::new(12.0, 9.0, -4.0), 24.0);

    let ab = force.calculate(&a, &b);
    let ba = force.calculate(&b, &a);
    assert!(ab.length() > 0.0);
    assert!((ab + ba).length() < 1e-12);

    // Overlapping cells repel: the force on `a` points away from `b`.
    assert!(ab.dot(a.position - b.position) > 0.0);
}

#[test]
fn separated_cells_do_not_interact() {
    let force = InteractionForce::from_param(&param(None));
    let a = indexed(0, DVec3::ZERO, 30.0);
    // Enlarged radii are 16.5 each.
    let b = indexed(1, DVec3::new(33.5, 0.0, 0.0), 30.0);
    assert_eq!(force.calculate(&a, &b), DVec3::ZERO);
}

#[test]
fn coincident_cells_are_pushed_apart_antisymmetrically() {
    let force = InteractionForce::from_param(&param(None));
    let a = indexed(0, DVec3::splat(5.0), 30.0);
    let b = indexed(1, DVec3::splat(5.0), 30.0);

    let ab = force.calculate(&a, &b);
    let ba = force.calculate(&b, &a);
    assert!(ab.length() > 0.0);
    assert_eq!(ab, -ba);
}

#[test]
fn overlapping_pair_moves_apart_symmetrically() -> SimResult<()> {
    let p = param(None);
    let mut manager = manager_with::<SoaStorage>(vec![
        Cell::new(DVec3::new(0.0, 0.0, 0.0)),
        Cell::new(DVec3::new(20.0, 0.0, 0.0)),
    ])?;
    let mut index = SpatialIndex::new();
    index.rebuild(manager.containers(), p.interaction_margin(), 0);

    let report = MechanicalResolver::from_param(&p).resolve(&mut manager, &index)?;
    assert_eq!(report.moved, 2);

    let after = positions(&manager);
    assert!(after[0].x < 0.0);
    assert!(after[1].x > 20.0);
    assert!((after[0].x + (after[1].x - 20.0)).abs() < 1e-12);
    assert_eq!(after[0].y, 0.0);
    Ok(())
}

#[test]
fn displacements_are_computed_from_the_old_state() -> SimResult<()> {
    let p = param(None);
    let resolver = MechanicalResolver::from_param(&p);
    let mut manager = manager_with::<AosStorage>(vec![
        Cell::new(DVec3::new(0.0, 0.0, 0.0)),
        Cell::new(DVec3::new(18.0, 0.0, 0.0)),
        Cell::new(DVec3::new(36.0, 4.0, 0.0)),
        Cell::new(DVec3::new(18.0, 18.0, 0.0)).with_tractor_force(DVec3::new(0.0, 40.0, 0.0)),
    ])?;
    let mut index = SpatialIndex::new();
    index.rebuild(manager.containers(), p.interaction_margin(), 0);

    let before = positions(&manager);
    let container = manager.container(AgentType(0)).expect("registered");
    let mut expected = Vec::new();
    for (i, id) in container.ids().enumerate() {
        let movement = resolver.displacement(id, container.get(id)?, &index)?;
        expected.push(before[i] + movement);
    }

    resolver.resolve(&mut manager, &index)?;
    assert_eq!(positions(&manager), expected);
    Ok(())
}

#[test]
fn movement_is_capped_at_max_displacement() -> SimResult<()> {
    let p = param(None);
    let mut manager = manager_with::<SoaStorage>(vec![
        Cell::new(DVec3::ZERO).with_tractor_force(DVec3::new(1.0e6, 1.0e6, 0.0)),
    ])?;
    let mut index = SpatialIndex::new();
    index.rebuild(manager.containers(), p.interaction_margin(), 0);

    let report = MechanicalResolver::from_param(&p).resolve(&mut manager, &index)?;
    let moved = positions(&manager)[0];
    assert_close(moved.length(), p.max_displacement, 1e-12);
    assert_close(report.max_movement, p.max_displacement, 1e-12);
    assert_close(moved.x, moved.y, 1e-12);
    Ok(())
}

#[test]
fn forces_below_adherence_do_not_move_cells() -> SimResult<()> {
    let p = param(None);
    // Barely overlapping enlarged radii: the net force is a weak attraction.
    let mut manager = manager_with::<AosStorage>(vec![
        Cell::new(DVec3::ZERO),
        Cell::new(DVec3::new(32.99, 0.0, 0.0)),
    ])?;
    let mut index = SpatialIndex::new();
    index.rebuild(manager.containers(), p.interaction_margin(), 0);

    let report = MechanicalResolver::from_param(&p).resolve(&mut manager, &index)?;
    assert_eq!(report.moved, 0);
    assert_eq!(positions(&manager), vec![DVec3::ZERO, DVec3::new(32.99, 0.0, 0.0)]);
    Ok(())
}
