use cellsim::engine::cell::{volume_of, Cell};
use cellsim::engine::container::CellContainer;
use cellsim::engine::error::{InvalidAttribute, OutOfBoundsReason, SimError, SimResult};
use cellsim::engine::manager::ResourceManager;
use cellsim::engine::module::GrowthModule;
use cellsim::engine::spatial::SpatialIndex;
use cellsim::engine::storage::{AosStorage, CellStorage, SoaStorage};
use cellsim::engine::types::{AgentType, CellId, Layout};
use glam::DVec3;

mod common;
use common::*;

fn three_cells<S: CellStorage>() -> SimResult<(CellContainer<S>, Vec<CellId>)> {
    let mut container = CellContainer::<S>::new(AgentType(0));
    let ids = (0..3)
        .map(|i| container.append(Cell::new(DVec3::new(i as f64 * 100.0, 0.0, 0.0)).with_mass(1.0 + i as f64)))
        .collect::<SimResult<Vec<_>>>()?;
    Ok((container, ids))
}

#[test]
fn appended_cells_are_invisible_until_commit() -> SimResult<()> {
    let (mut container, ids) = three_cells::<SoaStorage>()?;

    assert_eq!(container.len(), 0);
    assert_eq!(container.pending_len(), 3);
    assert!(container.get(ids[0]).is_err());

    assert_eq!(container.commit()?, 3);
    assert_eq!(container.len(), 3);
    assert_eq!(container.pending_len(), 0);

    for (i, id) in ids.iter().enumerate() {
        assert_eq!(*id, container.id_of(i));
        assert_eq!(id.index() as usize, i);
        let cell = container.get(*id)?;
        assert_eq!(cell.position(), DVec3::new(i as f64 * 100.0, 0.0, 0.0));
        assert_eq!(cell.mass(), 1.0 + i as f64);
        assert_eq!(cell.volume(), volume_of(cell.diameter()));
    }
    Ok(())
}

#[test]
fn lookup_past_the_committed_length_is_out_of_bounds() -> SimResult<()> {
    let (mut container, _) = three_cells::<AosStorage>()?;
    container.commit()?;

    let missing = CellId::new(AgentType(0), 7, 0);
    let err = container.get(missing).err().expect("index 7 must not resolve");
    assert_eq!(err.cell, missing);
    assert_eq!(err.reason, OutOfBoundsReason::Index { length: 3 });

    let foreign = CellId::new(AgentType(3), 0, 0);
    let err = container.get(foreign).err().expect("foreign agent type must not resolve");
    assert_eq!(err.reason, OutOfBoundsReason::UnknownAgentType);
    Ok(())
}

#[test]
fn removal_moves_the_last_cell_and_stales_identities() -> SimResult<()> {
    let (mut container, ids) = three_cells::<SoaStorage>()?;
    container.commit()?;

    let removed = container.remove(ids[0])?;
    assert_eq!(removed.mass(), 1.0);
    assert_eq!(container.len(), 2);
    assert_eq!(container.generation(), 1);

    let err = container.get(ids[1]).err().expect("identity minted before removal must be stale");
    assert_eq!(err.reason, OutOfBoundsReason::StaleGeneration { current: 1 });

    // The former last cell now sits in slot 0.
    let moved = container.get(container.id_of(0))?;
    assert_eq!(moved.mass(), 3.0);
    assert_eq!(moved.position(), DVec3::new(200.0, 0.0, 0.0));
    Ok(())
}

#[test]
fn invalid_attributes_are_rejected_at_append() {
    let mut container = CellContainer::<SoaStorage>::new(AgentType(0));

    let cases = [
        (Cell::new(DVec3::ZERO).with_diameter(0.0), InvalidAttribute::Diameter),
        (Cell::new(DVec3::ZERO).with_diameter(-4.0), InvalidAttribute::Diameter),
        (Cell::new(DVec3::ZERO).with_mass(0.0), InvalidAttribute::Mass),
        (Cell::new(DVec3::ZERO).with_mass(f64::NAN), InvalidAttribute::Mass),
        (Cell::new(DVec3::new(f64::INFINITY, 0.0, 0.0)), InvalidAttribute::Position),
    ];

    for (cell, expected) in cases {
        match container.append(cell) {
            Err(SimError::Configuration(e)) => {
                assert_eq!(e.attribute, expected);
                assert_eq!(e.cell, container.id_of(0));
            }
            other => panic!("expected a configuration error for {expected:?}, got {other:?}"),
        }
    }
    assert_eq!(container.pending_len(), 0);
    assert_eq!(container.len(), 0);
}

#[test]
fn daughters_are_merged_after_existing_cells_in_mother_order() -> SimResult<()> {
    let p = param(None);
    let index = SpatialIndex::new();
    let mut container = CellContainer::<SoaStorage>::new(AgentType(0));

    // Cells 0 and 2 are above the threshold, cell 1 is not.
    for (x, diameter) in [(0.0, 45.0), (1000.0, 30.0), (2000.0, 45.0)] {
        container.append(
            Cell::new(DVec3::new(x, 0.0, 0.0))
                .with_diameter(diameter)
                .with_module(GrowthModule::new(GROWTH_RATE, THRESHOLD)),
        )?;
    }
    container.commit()?;

    let report = container.run_behavior_modules(&p, &index, 0)?;
    assert_eq!(report.divisions, 2);
    assert!(report.rejected.is_empty());

    // The traversal did not see its own daughters.
    assert_eq!(container.len(), 3);
    assert_eq!(container.pending_len(), 2);

    container.commit()?;
    assert_eq!(container.len(), 5);

    let reach = 45.0 / 2.0 / 4.0 + 1e-9;
    let first = container.get(container.id_of(3))?.position();
    let second = container.get(container.id_of(4))?.position();
    assert!(first.distance(DVec3::new(0.0, 0.0, 0.0)) <= reach);
    assert!(second.distance(DVec3::new(2000.0, 0.0, 0.0)) <= reach);
    Ok(())
}

#[test]
fn both_layouts_behave_identically() -> SimResult<()> {
    let p = param(None);
    let index = SpatialIndex::new();

    let mut aos = CellContainer::<AosStorage>::new(AgentType(0));
    let mut soa = CellContainer::<SoaStorage>::new(AgentType(0));
    assert_eq!(aos.layout(), Layout::ArrayOfStructures);
    assert_eq!(soa.layout(), Layout::StructureOfArrays);

    for i in 0..64 {
        let position = DVec3::new((i % 4) as f64, ((i / 4) % 4) as f64, (i / 16) as f64) * 50.0;
        let diameter = 30.0 + (i % 5) as f64 * 4.0;
        aos.append(migrating_tumor_cell(position).with_diameter(diameter))?;
        soa.append(migrating_tumor_cell(position).with_diameter(diameter))?;
    }
    aos.commit()?;
    soa.commit()?;

    for step in 0..4 {
        let a = aos.run_behavior_modules(&p, &index, step)?;
        let s = soa.run_behavior_modules(&p, &index, step)?;
        assert_eq!(a.divisions, s.divisions);
        aos.commit()?;
        soa.commit()?;
    }

    assert_eq!(fingerprint(&aos), fingerprint(&soa));
    for i in 0..aos.len() {
        assert_eq!(aos.modules(aos.id_of(i))?, soa.modules(soa.id_of(i))?);
    }
    Ok(())
}

#[test]
fn clear_drops_committed_and_pending_cells() -> SimResult<()> {
    let (mut container, _) = three_cells::<AosStorage>()?;
    container.commit()?;
    container.append(Cell::new(DVec3::ZERO))?;

    container.clear()?;
    assert!(container.is_empty());
    assert_eq!(container.pending_len(), 0);
    assert_eq!(container.generation(), 1);

    // Clearing an empty container leaves identities untouched.
    container.clear()?;
    assert_eq!(container.generation(), 1);
    Ok(())
}

#[test]
fn soa_columns_follow_commit_order() -> SimResult<()> {
    let (mut container, _) = three_cells::<SoaStorage>()?;
    container.commit()?;

    let columns = container.storage();
    assert_eq!(
        columns.positions(),
        &[DVec3::ZERO, DVec3::new(100.0, 0.0, 0.0), DVec3::new(200.0, 0.0, 0.0)]
    );
    assert!(columns.diameters().iter().all(|d| *d == Cell::new(DVec3::ZERO).diameter()));
    assert!(columns.is_consistent());
    Ok(())
}

#[test]
fn identities_minted_before_a_reset_are_stale() -> SimResult<()> {
    let mut manager = ResourceManager::<SoaStorage>::new();
    let t = manager.register_agent_type("cells")?;
    let old = manager.container_for(t)?.append(Cell::new(DVec3::ZERO).with_mass(1.0))?;
    manager.commit_all()?;

    manager.reset()?;
    let fresh = manager
        .container_for(t)?
        .append(Cell::new(DVec3::splat(500.0)).with_mass(7.0))?;
    manager.commit_all()?;

    assert_eq!(old.index(), fresh.index());
    let err = manager.get(old).err().expect("pre-reset identity must not resolve");
    assert_eq!(err.reason, OutOfBoundsReason::StaleGeneration { current: 1 });
    assert_eq!(manager.get(fresh)?.mass(), 7.0);
    Ok(())
}
