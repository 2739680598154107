//! Pairwise mechanical interaction and displacement.
//!
//! ## Force law
//!
//! Two spheres interact when their enlarged radii overlap. With
//! `rᵢ = dᵢ/2 + 10 · inter_object_coefficient` and center distance `dist`:
//!
//! ```text
//! δ     = r1 + r2 - dist            (no force if δ < 0)
//! r_eff = r1 · r2 / (r1 + r2)
//! f     = k · δ - γ · √(r_eff · δ)
//! F₁    = f / dist · (c1 - c2)
//! ```
//!
//! `k` is the repulsion and `γ` the attraction coefficient. The law is
//! antisymmetric: `F₁₂ = -F₂₁`. Coincident centers get a push of magnitude
//! `k · (r1 + r2)` along a fixed diagonal, signed by identity order, so the
//! pair is still antisymmetric and separates deterministically.
//!
//! ## Displacement
//!
//! ```text
//! movement  = h · tractor
//! movement += h · F / mass          only if |F| > adherence
//! ```
//!
//! capped at `max_displacement` along the movement direction.
//!
//! ## Read old, write new
//!
//! Every displacement is computed first, from positions and diameters copied
//! into the spatial index, and then applied. No cell sees a neighbor that has
//! already moved in the same pass, whatever the container or thread order.

use glam::DVec3;

use crate::engine::cell::CellRef;
use crate::engine::error::{OutOfBoundsError, SimResult};
use crate::engine::manager::ResourceManager;
use crate::engine::param::Param;
use crate::engine::spatial::{IndexedCell, SpatialIndex};
use crate::engine::storage::CellStorage;
use crate::engine::types::{CellId, CellIndex};


const COINCIDENT_DISTANCE: f64 = 1e-8;

/// Sphere-sphere interaction force.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InteractionForce {
    /// Repulsion coefficient `k`.
    pub repulsion: f64,
    /// Attraction coefficient `γ`.
    pub attraction: f64,
    /// Enlargement added to each radius.
    pub additional_radius: f64,
}

impl InteractionForce {
    /// Takes the coefficients from the run parameters.
    pub fn from_param(param: &Param) -> Self {
        Self {
            repulsion: param.repulsion,
            attraction: param.attraction,
            additional_radius: param.additional_radius(),
        }
    }

    /// Force exerted on `a` by `b`.
    pub fn calculate(&self, a: &IndexedCell, b: &IndexedCell) -> DVec3 {
        let r1 = a.diameter / 2.0 + self.additional_radius;
        let r2 = b.diameter / 2.0 + self.additional_radius;
        let comp = a.position - b.position;
        let dist = comp.length();

        if dist < COINCIDENT_DISTANCE {
            let sign = if a.id < b.id { -1.0 } else { 1.0 };
            return DVec3::ONE.normalize() * (sign * self.repulsion * (r1 + r2));
        }

        let delta = r1 + r2 - dist;
        if delta < 0.0 {
            return DVec3::ZERO;
        }
        let r_eff = r1 * r2 / (r1 + r2);
        let f = self.repulsion * delta - self.attraction * (r_eff * delta).sqrt();
        comp * (f / dist)
    }
}

/// Outcome of one mechanics pass.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MechanicsReport {
    /// Cells whose position changed.
    pub moved: usize,
    /// Largest displacement length applied.
    pub max_movement: f64,
}

/// Computes and applies displacements for every cell of every container.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MechanicalResolver {
    /// Integration step `h`.
    pub time_step: f64,
    /// Upper bound on the distance moved in one step.
    pub max_displacement: f64,
    /// Pairwise force law.
    pub force: InteractionForce,
}

impl MechanicalResolver {
    /// Takes the coefficients from the run parameters.
    pub fn from_param(param: &Param) -> Self {
        Self {
            time_step: param.simulation_time_step,
            max_displacement: param.max_displacement,
            force: InteractionForce::from_param(param),
        }
    }

    /// Sum of neighbor forces acting on `id`.
    pub fn total_force(&self, id: CellId, index: &SpatialIndex) -> Result<DVec3, OutOfBoundsError> {
        let me = *index.get(id)?;
        let mut force = DVec3::ZERO;
        index.for_each_neighbor(id, |other| force += self.force.calculate(&me, other))?;
        Ok(force)
    }

    /// Displacement of one cell for this step.
    pub fn displacement(&self, id: CellId, cell: CellRef<'_>, index: &SpatialIndex) -> Result<DVec3, OutOfBoundsError> {
        let force = self.total_force(id, index)?;
        let h = self.time_step;

        let mut movement = cell.tractor_force() * h;
        if force.length() > cell.adherence() {
            movement += force * (h / cell.mass());
        }

        let length = movement.length();
        if length > self.max_displacement {
            movement *= self.max_displacement / length;
        }
        Ok(movement)
    }

    /// Moves every committed cell by its displacement.
    ///
    /// `index` must have been rebuilt after the last commit, otherwise the
    /// lookup of a cell that is not in it fails with an out-of-bounds error.
    pub fn resolve<S: CellStorage>(&self, manager: &mut ResourceManager<S>, index: &SpatialIndex) -> SimResult<MechanicsReport> {
        let mut report = MechanicsReport::default();

        for container in manager.containers_mut() {
            let agent_type = container.agent_type();
            let generation = container.generation();
            let computed = container.storage().par_map(|i, cell| {
                self.displacement(CellId::new(agent_type, i as CellIndex, generation), cell, index)
            });
            let movements = computed.into_iter().collect::<Result<Vec<DVec3>, _>>()?;

            for movement in &movements {
                let length = movement.length();
                if length > 0.0 {
                    report.moved += 1;
                    report.max_movement = report.max_movement.max(length);
                }
            }

            container
                .storage_mut()
                .par_update(|i, mut cell| cell.update_position(movements[i]));
        }
        Ok(report)
    }
}
