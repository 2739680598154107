//! Behavior modules.
//!
//! A behavior module is per-cell logic attached to a cell and executed once
//! per step, in attachment order. The set of module kinds is closed: every
//! kind is a variant of [`BehaviorModule`] and dispatch is an exhaustive
//! `match`, so adding a kind means adding a variant and the compiler points
//! at every place that has to handle it.
//!
//! ## Contract
//! * `run` receives a mutable view of the cell's attributes and a
//!   [`ModuleContext`] for randomness and division requests. It never sees
//!   the cell's own module list.
//! * `is_copied(event)` decides whether the module travels to a cell created
//!   by `event`. Copies are deep: the daughter owns independent module state.
//! * `on_division` lets a module adjust the daughter after it has been built
//!   from the mother. [`ClassificationModule`] uses it to apply its
//!   [`TypeInheritance`] policy.
//!
//! ## Provided modules
//! * [`GrowthModule`] — grows the cell until a diameter threshold, then
//!   divides it.
//! * [`ClassificationModule`] — assigns one of two cell types to unclassified
//!   cells.
//! * [`MigrationModule`] — drives random active movement via the tractor force.

use glam::DVec3;
use rand::Rng;

use crate::engine::cell::{Cell, CellMut, CellRef};
use crate::engine::division::ModuleContext;
use crate::engine::types::{CellType, Event};


/// Closed set of behavior module kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum BehaviorModule {
    /// Grows the cell, then divides it.
    Growth(GrowthModule),
    /// Assigns a cell type.
    Classification(ClassificationModule),
    /// Sets a random tractor force.
    Migration(MigrationModule),
}

impl BehaviorModule {
    /// Executes the module for one cell.
    pub fn run(&mut self, cell: &mut CellMut<'_>, ctx: &mut ModuleContext<'_>) {
        match self {
            BehaviorModule::Growth(m) => m.run(cell, ctx),
            BehaviorModule::Classification(m) => m.run(cell, ctx),
            BehaviorModule::Migration(m) => m.run(cell, ctx),
        }
    }

    /// Returns `true` if the module is copied to a cell created by `event`.
    pub fn is_copied(&self, event: Event) -> bool {
        match self {
            BehaviorModule::Growth(_) => matches!(event, Event::CellDivision),
            BehaviorModule::Classification(_) => matches!(event, Event::CellDivision),
            BehaviorModule::Migration(m) => match event {
                Event::CellDivision => m.copy_on_division,
            },
        }
    }

    /// Adjusts a freshly built daughter. Called for every module of the
    /// mother, copied or not.
    pub fn on_division(&self, mother: CellRef<'_>, daughter: &mut Cell) {
        if let BehaviorModule::Classification(m) = self {
            m.inheritance.apply(mother, daughter);
        }
    }

    /// Name used in log records.
    pub fn name(&self) -> &'static str {
        match self {
            BehaviorModule::Growth(_) => "growth",
            BehaviorModule::Classification(_) => "classification",
            BehaviorModule::Migration(_) => "migration",
        }
    }
}

impl From<GrowthModule> for BehaviorModule {
    fn from(m: GrowthModule) -> Self {
        BehaviorModule::Growth(m)
    }
}

impl From<ClassificationModule> for BehaviorModule {
    fn from(m: ClassificationModule) -> Self {
        BehaviorModule::Classification(m)
    }
}

impl From<MigrationModule> for BehaviorModule {
    fn from(m: MigrationModule) -> Self {
        BehaviorModule::Migration(m)
    }
}

/// Grows a cell at a constant volume rate until its diameter exceeds the
/// threshold, then divides it.
///
/// ## Behavior
/// * `diameter <= division_threshold` — volume grows by
///   `growth_rate · simulation_time_step`.
/// * otherwise — one division with drawn ratio and axis.
///
/// Copied on division.
#[derive(Clone, Debug, PartialEq)]
pub struct GrowthModule {
    /// Volume change per unit time.
    pub growth_rate: f64,
    /// Diameter above which the cell divides.
    pub division_threshold: f64,
    /// Successful divisions performed by this module instance.
    pub divisions: u32,
}

impl GrowthModule {
    /// Creates a growth module that has not divided yet.
    pub fn new(growth_rate: f64, division_threshold: f64) -> Self {
        Self { growth_rate, division_threshold, divisions: 0 }
    }

    fn run(&mut self, cell: &mut CellMut<'_>, ctx: &mut ModuleContext<'_>) {
        if cell.diameter() <= self.division_threshold {
            let param = ctx.param();
            cell.change_volume(self.growth_rate, param.simulation_time_step, param.min_volume);
        } else if ctx.divide(cell).is_ok() {
            self.divisions += 1;
        }
    }
}

impl Default for GrowthModule {
    fn default() -> Self {
        Self::new(300_000.0, 40.0)
    }
}

/// How a daughter's cell type is derived from its mother's.
///
/// The default, [`TypeInheritance::Inherit`], also applies to mothers that
/// carry no [`ClassificationModule`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TypeInheritance {
    /// The daughter takes the mother's type.
    #[default]
    Inherit,
    /// The daughter starts unclassified and is classified on its own.
    Unclassified,
}

impl TypeInheritance {
    /// Sets the daughter's type. The mother is never modified.
    pub fn apply(self, mother: CellRef<'_>, daughter: &mut Cell) {
        daughter.cell_type = match self {
            TypeInheritance::Inherit => mother.cell_type(),
            TypeInheritance::Unclassified => CellType::UNCLASSIFIED,
        };
    }
}

/// Assigns a cell type to unclassified cells.
///
/// An unclassified cell becomes `first_type` with probability
/// `first_type_probability` and `second_type` otherwise. Classified cells are
/// left alone.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassificationModule {
    /// Probability of drawing `first_type`.
    pub first_type_probability: f64,
    /// Type assigned with probability `first_type_probability`.
    pub first_type: CellType,
    /// Type assigned otherwise.
    pub second_type: CellType,
    /// How daughters of this cell get their type.
    pub inheritance: TypeInheritance,
    /// Number of classifications performed by this module instance.
    pub classified: u32,
}

impl ClassificationModule {
    /// Creates a module with the default inheritance policy.
    pub fn new(first_type_probability: f64, first_type: CellType, second_type: CellType) -> Self {
        Self {
            first_type_probability,
            first_type,
            second_type,
            inheritance: TypeInheritance::default(),
            classified: 0,
        }
    }

    /// Replaces the inheritance policy.
    pub fn with_inheritance(mut self, inheritance: TypeInheritance) -> Self {
        self.inheritance = inheritance;
        self
    }

    fn run(&mut self, cell: &mut CellMut<'_>, ctx: &mut ModuleContext<'_>) {
        if cell.cell_type().is_classified() {
            return;
        }
        let draw: f64 = ctx.rng().gen();
        let cell_type = if draw < self.first_type_probability { self.first_type } else { self.second_type };
        cell.set_cell_type(cell_type);
        self.classified += 1;
    }
}

impl Default for ClassificationModule {
    fn default() -> Self {
        Self::new(0.7, CellType(1), CellType(2))
    }
}

/// Random active movement.
///
/// Each step the tractor force is set to a random direction scaled by
/// `speed`. Not copied on division unless `copy_on_division` is set.
#[derive(Clone, Debug, PartialEq)]
pub struct MigrationModule {
    /// Magnitude of the tractor force.
    pub speed: f64,
    /// Whether daughters get a copy of this module.
    pub copy_on_division: bool,
}

impl MigrationModule {
    /// Creates a migration module that stays with the mother on division.
    pub fn new(speed: f64) -> Self {
        Self { speed, copy_on_division: false }
    }

    /// Makes daughters inherit a copy of this module.
    pub fn copied_on_division(mut self) -> Self {
        self.copy_on_division = true;
        self
    }

    fn run(&mut self, cell: &mut CellMut<'_>, ctx: &mut ModuleContext<'_>) {
        let rng = ctx.rng();
        let direction = DVec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        )
        .normalize_or_zero();
        cell.set_tractor_force(direction * self.speed);
    }
}
