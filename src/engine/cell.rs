//! Cell state and borrowed views into it.
//!
//! A [`Cell`] is the owned, layout-independent record of one agent. Once a
//! cell is appended to a container its attributes live in whatever layout the
//! container uses, and code reaches them through two views:
//!
//! * [`CellRef`] — shared, read-only access to every attribute.
//! * [`CellMut`] — exclusive access used by behavior modules and mechanics.
//!
//! Both views are built from per-attribute references, so the same module code
//! runs unchanged over array-of-structures and structure-of-arrays storage.
//!
//! ## Invariants
//! * `volume == π/6 · diameter³`. Every setter that changes one recomputes the
//!   other.
//! * `diameter > 0` and `mass > 0` for every committed cell. Containers check
//!   this on append; views do not re-validate on every write.

use std::f64::consts::PI;

use glam::DVec3;

use crate::engine::error::InvalidAttribute;
use crate::engine::module::BehaviorModule;
use crate::engine::types::{CellType, DEFAULT_ADHERENCE, DEFAULT_DIAMETER, DEFAULT_MASS};


/// Volume of a sphere with the given diameter.
#[inline]
pub fn volume_of(diameter: f64) -> f64 {
    PI / 6.0 * diameter * diameter * diameter
}

/// Diameter of a sphere with the given volume.
#[inline]
pub fn diameter_of(volume: f64) -> f64 {
    (volume * 6.0 / PI).cbrt()
}

/// Owned state of one cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub(crate) position: DVec3,
    pub(crate) tractor_force: DVec3,
    pub(crate) diameter: f64,
    pub(crate) volume: f64,
    pub(crate) mass: f64,
    pub(crate) adherence: f64,
    pub(crate) cell_type: CellType,
    pub(crate) modules: Vec<BehaviorModule>,
}

impl Cell {
    /// Creates an unclassified cell at `position` with default size, mass and
    /// adherence and no modules.
    pub fn new(position: impl Into<DVec3>) -> Self {
        Self {
            position: position.into(),
            tractor_force: DVec3::ZERO,
            diameter: DEFAULT_DIAMETER,
            volume: volume_of(DEFAULT_DIAMETER),
            mass: DEFAULT_MASS,
            adherence: DEFAULT_ADHERENCE,
            cell_type: CellType::UNCLASSIFIED,
            modules: Vec::new(),
        }
    }

    /// Sets the diameter and recomputes the volume.
    pub fn with_diameter(mut self, diameter: f64) -> Self {
        self.set_diameter(diameter);
        self
    }

    /// Sets the mass.
    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    /// Sets the force magnitude below which mechanics leaves the cell in place.
    pub fn with_adherence(mut self, adherence: f64) -> Self {
        self.adherence = adherence;
        self
    }

    /// Sets the biological type tag.
    pub fn with_cell_type(mut self, cell_type: CellType) -> Self {
        self.cell_type = cell_type;
        self
    }

    /// Sets the active force the cell exerts on itself.
    pub fn with_tractor_force(mut self, force: impl Into<DVec3>) -> Self {
        self.tractor_force = force.into();
        self
    }

    /// Attaches a module after all modules attached so far.
    pub fn with_module(mut self, module: impl Into<BehaviorModule>) -> Self {
        self.modules.push(module.into());
        self
    }

    /// Appends a behavior module after the existing ones.
    pub fn add_module(&mut self, module: impl Into<BehaviorModule>) {
        self.modules.push(module.into());
    }

    /// Sets the diameter and recomputes the volume.
    pub fn set_diameter(&mut self, diameter: f64) {
        self.diameter = diameter;
        self.volume = volume_of(diameter);
    }

    /// Moves the cell center to `position`.
    pub fn set_position(&mut self, position: impl Into<DVec3>) {
        self.position = position.into();
    }

    /// Center of the sphere.
    #[inline] pub fn position(&self) -> DVec3 { self.position }
    /// Active force applied during mechanics.
    #[inline] pub fn tractor_force(&self) -> DVec3 { self.tractor_force }
    /// Sphere diameter.
    #[inline] pub fn diameter(&self) -> f64 { self.diameter }
    /// Sphere volume, kept consistent with the diameter.
    #[inline] pub fn volume(&self) -> f64 { self.volume }
    /// Cell mass.
    #[inline] pub fn mass(&self) -> f64 { self.mass }
    /// Force magnitude below which mechanics leaves the cell in place.
    #[inline] pub fn adherence(&self) -> f64 { self.adherence }
    /// Biological type tag.
    #[inline] pub fn cell_type(&self) -> CellType { self.cell_type }
    /// Behavior modules in execution order.
    #[inline] pub fn modules(&self) -> &[BehaviorModule] { &self.modules }

    /// Returns a read-only view of the attributes.
    pub fn as_ref(&self) -> CellRef<'_> {
        CellRef {
            position: &self.position,
            tractor_force: &self.tractor_force,
            diameter: &self.diameter,
            volume: &self.volume,
            mass: &self.mass,
            adherence: &self.adherence,
            cell_type: &self.cell_type,
        }
    }

    /// Splits the cell into a mutable attribute view and its module list.
    pub(crate) fn split_mut(&mut self) -> (CellMut<'_>, &mut Vec<BehaviorModule>) {
        let Cell { position, tractor_force, diameter, volume, mass, adherence, cell_type, modules } = self;
        (
            CellMut { position, tractor_force, diameter, volume, mass, adherence, cell_type },
            modules,
        )
    }

    /// Checks the attribute invariants a container requires on append.
    pub(crate) fn validate(&self) -> Result<(), (InvalidAttribute, f64)> {
        if !(self.diameter.is_finite() && self.diameter > 0.0) {
            return Err((InvalidAttribute::Diameter, self.diameter));
        }
        if !(self.mass.is_finite() && self.mass > 0.0) {
            return Err((InvalidAttribute::Mass, self.mass));
        }
        if !(self.volume.is_finite() && self.volume > 0.0) {
            return Err((InvalidAttribute::Volume, self.volume));
        }
        if !self.position.is_finite() {
            return Err((InvalidAttribute::Position, f64::NAN));
        }
        Ok(())
    }
}

/// Read-only view of one cell's attributes.
#[derive(Clone, Copy, Debug)]
pub struct CellRef<'a> {
    pub(crate) position: &'a DVec3,
    pub(crate) tractor_force: &'a DVec3,
    pub(crate) diameter: &'a f64,
    pub(crate) volume: &'a f64,
    pub(crate) mass: &'a f64,
    pub(crate) adherence: &'a f64,
    pub(crate) cell_type: &'a CellType,
}

impl CellRef<'_> {
    /// Center of the sphere.
    #[inline] pub fn position(&self) -> DVec3 { *self.position }
    /// Active force applied during mechanics.
    #[inline] pub fn tractor_force(&self) -> DVec3 { *self.tractor_force }
    /// Sphere diameter.
    #[inline] pub fn diameter(&self) -> f64 { *self.diameter }
    /// Sphere volume, kept consistent with the diameter.
    #[inline] pub fn volume(&self) -> f64 { *self.volume }
    /// Cell mass.
    #[inline] pub fn mass(&self) -> f64 { *self.mass }
    /// Force magnitude below which mechanics leaves the cell in place.
    #[inline] pub fn adherence(&self) -> f64 { *self.adherence }
    /// Biological type tag.
    #[inline] pub fn cell_type(&self) -> CellType { *self.cell_type }

    /// Copies the attributes into an owned cell with the given modules.
    pub fn to_cell(&self, modules: Vec<BehaviorModule>) -> Cell {
        Cell {
            position: *self.position,
            tractor_force: *self.tractor_force,
            diameter: *self.diameter,
            volume: *self.volume,
            mass: *self.mass,
            adherence: *self.adherence,
            cell_type: *self.cell_type,
            modules,
        }
    }
}

/// Exclusive view of one cell's attributes.
///
/// Behavior modules receive this view. It never exposes the module list, so a
/// module can mutate the cell while the dispatcher holds the modules.
#[derive(Debug)]
pub struct CellMut<'a> {
    pub(crate) position: &'a mut DVec3,
    pub(crate) tractor_force: &'a mut DVec3,
    pub(crate) diameter: &'a mut f64,
    pub(crate) volume: &'a mut f64,
    pub(crate) mass: &'a mut f64,
    pub(crate) adherence: &'a mut f64,
    pub(crate) cell_type: &'a mut CellType,
}

impl CellMut<'_> {
    /// Center of the sphere.
    #[inline] pub fn position(&self) -> DVec3 { *self.position }
    /// Active force applied during mechanics.
    #[inline] pub fn tractor_force(&self) -> DVec3 { *self.tractor_force }
    /// Sphere diameter.
    #[inline] pub fn diameter(&self) -> f64 { *self.diameter }
    /// Sphere volume, kept consistent with the diameter.
    #[inline] pub fn volume(&self) -> f64 { *self.volume }
    /// Cell mass.
    #[inline] pub fn mass(&self) -> f64 { *self.mass }
    /// Force magnitude below which mechanics leaves the cell in place.
    #[inline] pub fn adherence(&self) -> f64 { *self.adherence }
    /// Biological type tag.
    #[inline] pub fn cell_type(&self) -> CellType { *self.cell_type }

    /// Moves the cell center to `position`.
    #[inline]
    pub fn set_position(&mut self, position: DVec3) {
        *self.position = position;
    }

    /// Moves the cell by `delta`.
    #[inline]
    pub fn update_position(&mut self, delta: DVec3) {
        *self.position += delta;
    }

    /// Replaces the active force.
    #[inline]
    pub fn set_tractor_force(&mut self, force: DVec3) {
        *self.tractor_force = force;
    }

    /// Sets the diameter and recomputes the volume.
    pub fn set_diameter(&mut self, diameter: f64) {
        *self.diameter = diameter;
        self.update_volume();
    }

    /// Sets the volume and recomputes the diameter.
    pub fn set_volume(&mut self, volume: f64) {
        *self.volume = volume;
        self.update_diameter();
    }

    /// Grows (or shrinks) the cell by `speed · h`, keeping the volume above
    /// `min_volume`, and recomputes the diameter.
    pub fn change_volume(&mut self, speed: f64, h: f64, min_volume: f64) {
        let mut volume = *self.volume + speed * h;
        if volume < min_volume {
            volume = min_volume;
        }
        self.set_volume(volume);
    }

    /// Recomputes the volume from the diameter.
    #[inline]
    pub fn update_volume(&mut self) {
        *self.volume = volume_of(*self.diameter);
    }

    /// Recomputes the diameter from the volume.
    #[inline]
    pub fn update_diameter(&mut self) {
        *self.diameter = diameter_of(*self.volume);
    }

    /// Sets the mass.
    #[inline]
    pub fn set_mass(&mut self, mass: f64) {
        *self.mass = mass;
    }

    /// Sets the adherence threshold.
    #[inline]
    pub fn set_adherence(&mut self, adherence: f64) {
        *self.adherence = adherence;
    }

    /// Sets the biological type tag.
    #[inline]
    pub fn set_cell_type(&mut self, cell_type: CellType) {
        *self.cell_type = cell_type;
    }

    /// Reborrows the view as read-only.
    pub fn as_ref(&self) -> CellRef<'_> {
        CellRef {
            position: self.position,
            tractor_force: self.tractor_force,
            diameter: self.diameter,
            volume: self.volume,
            mass: self.mass,
            adherence: self.adherence,
            cell_type: self.cell_type,
        }
    }
}
