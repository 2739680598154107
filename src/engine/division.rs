//! Cell division protocol.
//!
//! Behavior modules request a division through the [`ModuleContext`] they are
//! handed for each cell. The context applies the volume-conserving split to
//! the mother immediately and keeps the daughter aside; the container merges
//! every daughter of a step at its commit point, in mother order.
//!
//! ## Geometry
//!
//! Given the mother radius `r`, a volume ratio `q = V_daughter / V_mother`
//! and two angles `(φ, θ)`:
//!
//! ```text
//! r_mother   = r / (1 + q)^(1/3)
//! r_daughter = r / (1 + 1/q)^(1/3)          (r³ = r_mother³ + r_daughter³)
//! axis       = (cos θ · sin φ, sin θ · sin φ, cos φ)
//! L          = r / 4
//! d_daughter = L / (q + 1),  d_mother = L - d_daughter
//! ```
//!
//! The daughter moves `d_daughter` along `axis`, the mother `d_mother` against
//! it. Mass is split in proportion to volume, adherence and type are copied
//! and the daughter starts without tractor force.
//!
//! ## Failure
//!
//! A request that would produce a non-finite or non-positive cell is rejected
//! with [`DivisionInvariantError`] before anything is written; the mother is
//! left untouched and the step continues.

use std::f64::consts::{PI, TAU};

use glam::DVec3;
use log::warn;
use rand::Rng;

use crate::engine::cell::{Cell, CellMut};
use crate::engine::error::{DivisionInvariantError, OutOfBoundsError};
use crate::engine::module::{BehaviorModule, TypeInheritance};
use crate::engine::param::Param;
use crate::engine::random::CellRng;
use crate::engine::spatial::{IndexedCell, SpatialIndex};
use crate::engine::types::{CellId, Event, Step};


/// Per-cell context handed to every behavior module.
///
/// One context lives for the duration of one cell's module pass. It carries
/// the cell's random stream, the run parameters and the step's spatial index,
/// and collects daughters and rejected division requests.
pub struct ModuleContext<'p> {
    rng: CellRng,
    param: &'p Param,
    index: &'p SpatialIndex,
    step: Step,
    cell: CellId,
    daughters: Vec<Cell>,
    rejected: Vec<DivisionInvariantError>,
}

/// What one cell's module pass produced.
#[derive(Debug, Default)]
pub(crate) struct DispatchOutcome {
    pub daughters: Vec<Cell>,
    pub rejected: Vec<DivisionInvariantError>,
}

impl<'p> ModuleContext<'p> {
    /// Creates the context for one cell during one step.
    pub fn new(param: &'p Param, index: &'p SpatialIndex, step: Step, cell: CellId, rng: CellRng) -> Self {
        Self { rng, param, index, step, cell, daughters: Vec::new(), rejected: Vec::new() }
    }

    /// Random stream of the current cell.
    #[inline]
    pub fn rng(&mut self) -> &mut CellRng {
        &mut self.rng
    }

    /// Parameters of the run.
    #[inline]
    pub fn param(&self) -> &Param {
        self.param
    }

    /// Step being executed.
    #[inline]
    pub fn step(&self) -> Step {
        self.step
    }

    /// Identity of the cell being processed.
    #[inline]
    pub fn cell_id(&self) -> CellId {
        self.cell
    }

    /// Candidate neighbors of the current cell, as of the last index rebuild.
    pub fn neighbors(&self) -> Result<Vec<CellId>, OutOfBoundsError> {
        self.index.neighbors(self.cell)
    }

    /// Calls `f` for every candidate neighbor of the current cell.
    pub fn for_each_neighbor<F>(&self, f: F) -> Result<(), OutOfBoundsError>
    where
        F: FnMut(&IndexedCell),
    {
        self.index.for_each_neighbor(self.cell, f)
    }

    /// Daughters requested so far for this cell. Their modules are attached
    /// only when the pass ends.
    pub fn daughters(&self) -> &[Cell] {
        &self.daughters
    }

    /// Division requests rejected so far for this cell.
    pub fn rejected(&self) -> &[DivisionInvariantError] {
        &self.rejected
    }

    /// Divides `cell` with a volume ratio and division axis drawn from the
    /// cell's random stream.
    pub fn divide(&mut self, cell: &mut CellMut<'_>) -> Result<(), DivisionInvariantError> {
        let lo = self.param.min_division_volume_ratio;
        let hi = self.param.max_division_volume_ratio;
        // Equal bounds fix the ratio; unusable bounds are rejected by `divide_with`.
        let ratio = if lo < hi && (hi - lo).is_finite() { self.rng.gen_range(lo..=hi) } else { lo };
        let phi = self.rng.gen_range(0.0..TAU);
        let theta = self.rng.gen_range(0.0..PI);
        self.divide_with(cell, ratio, phi, theta)
    }

    /// Divides `cell` with an explicit volume ratio and division axis.
    ///
    /// On success the mother is shrunk and moved and the daughter is buffered.
    /// Daughter modules are attached after the mother's module pass ends.
    pub fn divide_with(
        &mut self,
        cell: &mut CellMut<'_>,
        volume_ratio: f64,
        phi: f64,
        theta: f64,
    ) -> Result<(), DivisionInvariantError> {
        match split(cell, volume_ratio, phi, theta) {
            Ok(plan) => {
                cell.set_diameter(plan.mother_diameter);
                cell.set_position(plan.mother_position);
                cell.set_mass(plan.mother_mass);

                let mut daughter = cell.as_ref().to_cell(Vec::new());
                daughter.position = plan.daughter_position;
                daughter.tractor_force = DVec3::ZERO;
                daughter.mass = plan.daughter_mass;
                daughter.set_diameter(plan.daughter_diameter);
                self.daughters.push(daughter);
                Ok(())
            }
            Err(detail) => {
                let err = DivisionInvariantError { cell: self.cell, step: self.step, detail };
                warn!("{err}");
                self.rejected.push(err);
                Err(err)
            }
        }
    }

    pub(crate) fn finish(self) -> DispatchOutcome {
        DispatchOutcome { daughters: self.daughters, rejected: self.rejected }
    }
}

/// Runs every module of one cell in attachment order, then equips the
/// daughters it requested.
///
/// Daughter modules are deep copies of the mother's modules whose
/// `is_copied(CellDivision)` holds, taken after the whole pass. Every mother
/// module then gets its `on_division` hook. A mother without a
/// classification module passes its type on under the default
/// [`TypeInheritance`].
pub(crate) fn run_cell(
    mut cell: CellMut<'_>,
    modules: &mut [BehaviorModule],
    mut ctx: ModuleContext<'_>,
) -> DispatchOutcome {
    for module in modules.iter_mut() {
        module.run(&mut cell, &mut ctx);
    }

    let mut outcome = ctx.finish();
    if !outcome.daughters.is_empty() {
        let mother = cell.as_ref();
        let classified = modules.iter().any(|m| matches!(m, BehaviorModule::Classification(_)));
        for daughter in &mut outcome.daughters {
            if !classified {
                TypeInheritance::default().apply(mother, daughter);
            }
            daughter.modules = modules
                .iter()
                .filter(|m| m.is_copied(Event::CellDivision))
                .cloned()
                .collect();
            for module in modules.iter() {
                module.on_division(mother, daughter);
            }
        }
    }
    outcome
}

struct SplitPlan {
    mother_diameter: f64,
    mother_position: DVec3,
    mother_mass: f64,
    daughter_diameter: f64,
    daughter_position: DVec3,
    daughter_mass: f64,
}

fn split(cell: &CellMut<'_>, ratio: f64, phi: f64, theta: f64) -> Result<SplitPlan, &'static str> {
    if !(ratio.is_finite() && ratio > 0.0) {
        return Err("volume ratio must be finite and positive");
    }
    if !(phi.is_finite() && theta.is_finite()) {
        return Err("division angles must be finite");
    }

    let radius = cell.diameter() / 2.0;
    let r_mother = radius / (1.0 + ratio).cbrt();
    let r_daughter = radius / (1.0 + 1.0 / ratio).cbrt();
    if !(r_mother.is_finite() && r_mother > 0.0 && r_daughter.is_finite() && r_daughter > 0.0) {
        return Err("split would produce a non-positive diameter");
    }

    let axis = DVec3::new(theta.cos() * phi.sin(), theta.sin() * phi.sin(), phi.cos());
    let total = radius / 4.0;
    let d_daughter = total / (ratio + 1.0);
    let d_mother = total - d_daughter;

    let mass = cell.mass();
    let daughter_mass = mass * ratio / (1.0 + ratio);
    let mother_mass = mass - daughter_mass;
    if !(daughter_mass > 0.0 && mother_mass > 0.0) {
        return Err("split would produce a non-positive mass");
    }

    let position = cell.position();
    Ok(SplitPlan {
        mother_diameter: 2.0 * r_mother,
        mother_position: position - d_mother * axis,
        mother_mass,
        daughter_diameter: 2.0 * r_daughter,
        daughter_position: position + d_daughter * axis,
        daughter_mass,
    })
}
