//! # cellsim
//!
//! Parallel, discrete-time, agent-based simulation engine for populations of
//! biological cells.
//!
//! Each cell carries physical attributes (position, diameter, volume, mass,
//! adherence) and an ordered list of behavior modules. Every step the engine
//! runs the modules of every cell, lets cells divide, resolves pairwise
//! mechanical interaction and hands a read-only snapshot to external
//! collaborators.
//!
//! ## Design Goals
//! - Dual-layout containers (array of structures / structure of arrays)
//!   selected at compile time
//! - Parallel CPU execution on rayon with results independent of the worker
//!   count
//! - Division through append buffers merged at one synchronization point
//! - Explicitly owned run state, no global singletons
//!
//! ## Example
//! ```no_run
//! use cellsim::prelude::*;
//!
//! let mut scheduler: Scheduler = Scheduler::new(Param::default())?;
//! scheduler.setup(|manager| {
//!     let tumor = manager.register_agent_type("tumor")?;
//!     manager.grid_3d(tumor, 4, 20.0, |position| {
//!         Cell::new(position).with_module(GrowthModule::default())
//!     })?;
//!     Ok(())
//! })?;
//! let report = scheduler.run(10)?;
//! println!("{} cells", report.final_population);
//! # Ok::<(), cellsim::SimError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(dead_code)]
#![allow(clippy::module_inception)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use glam::DVec3;

pub use engine::types::{
    AgentType,
    CellId,
    CellType,
    Event,
    Layout,
    Step,
};

pub use engine::error::{
    SimResult,
    SimError,
    ConfigurationError,
    OutOfBoundsError,
    OutOfBoundsReason,
    DivisionInvariantError,
    ConcurrencyViolationError,
    CapacityError,
    ParamError,
    LifecycleError,
    InvalidAttribute,
};

pub use engine::param::Param;
pub use engine::cell::{Cell, CellMut, CellRef};
pub use engine::module::{
    BehaviorModule,
    ClassificationModule,
    GrowthModule,
    MigrationModule,
    TypeInheritance,
};
pub use engine::division::ModuleContext;
pub use engine::storage::{AosStorage, CellStorage, SoaStorage};
pub use engine::container::{CellContainer, DispatchReport};
pub use engine::spatial::{IndexedCell, SpatialIndex};
pub use engine::mechanics::{InteractionForce, MechanicalResolver};
pub use engine::manager::ResourceManager;
pub use engine::snapshot::{
    CellSnapshot,
    Collaborator,
    CollaboratorError,
    FnCollaborator,
    PopulationSummary,
    Snapshot,
    StepSummary,
};
pub use engine::scheduler::{RunReport, Scheduler, Stage, StepReport, StopHandle};
pub use engine::timing::TimingAggregator;

// ─────────────────────────────────────────────────────────────────────────────
// Prelude
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used types.
///
/// Import with:
/// ```rust
/// use cellsim::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        AosStorage,
        Cell,
        CellId,
        CellType,
        ClassificationModule,
        Collaborator,
        DVec3,
        GrowthModule,
        MigrationModule,
        Param,
        PopulationSummary,
        ResourceManager,
        Scheduler,
        SimResult,
        SoaStorage,
        TypeInheritance,
    };
}
