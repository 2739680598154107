//! Per-step snapshots and the collaborators that consume them.
//!
//! After mechanics, the scheduler hands every registered [`Collaborator`] a
//! [`Snapshot`]: a read-only view of every committed cell of every container.
//! Exporters, viewers and readouts live outside the engine and only ever see
//! this view.
//!
//! ## Lifetime
//!
//! A snapshot borrows the containers. It cannot outlive the
//! `NotifyCollaborators` stage, and a collaborator cannot keep references to
//! cell data after `notify` returns; anything it needs later must be copied
//! out (see [`CellSnapshot`]).
//!
//! ## Failure
//!
//! `notify` may fail. The scheduler logs the error with the collaborator name
//! and step and carries on; a broken exporter never aborts a run.

use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

use glam::DVec3;
use log::debug;
use rayon::prelude::*;

use crate::engine::container::CellContainer;
use crate::engine::reduce::{Count, MinMax, Sum, Welford};
use crate::engine::storage::CellStorage;
use crate::engine::types::{AgentType, CellId, CellType, Step};


/// Error type returned by collaborators.
pub type CollaboratorError = Box<dyn Error + Send + Sync>;

/// Copy of the externally visible state of one cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellSnapshot {
    /// Identity at the time of the snapshot.
    pub id: CellId,
    /// Agent type of the owning container.
    pub agent_type: AgentType,
    /// Center of the sphere.
    pub position: DVec3,
    /// Sphere diameter.
    pub diameter: f64,
    /// Sphere volume.
    pub volume: f64,
    /// Cell mass.
    pub mass: f64,
    /// Biological type tag.
    pub cell_type: CellType,
}

/// Layout-independent, read-only access to one container.
pub trait ContainerView: Sync {
    /// Agent type of the container.
    fn agent_type(&self) -> AgentType;

    /// Number of committed cells.
    fn len(&self) -> usize;

    /// Returns `true` if no cell is committed.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// State of the committed cell at `index`.
    fn cell(&self, index: usize) -> Option<CellSnapshot>;
}

impl<S: CellStorage> ContainerView for CellContainer<S> {
    fn agent_type(&self) -> AgentType {
        CellContainer::agent_type(self)
    }

    fn len(&self) -> usize {
        CellContainer::len(self)
    }

    fn cell(&self, index: usize) -> Option<CellSnapshot> {
        let cell = self.storage().get(index)?;
        Some(CellSnapshot {
            id: self.id_of(index),
            agent_type: CellContainer::agent_type(self),
            position: cell.position(),
            diameter: cell.diameter(),
            volume: cell.volume(),
            mass: cell.mass(),
            cell_type: cell.cell_type(),
        })
    }
}

/// Read-only view of every container at the end of a step.
pub struct Snapshot<'a> {
    step: Step,
    views: Vec<&'a dyn ContainerView>,
}

impl<'a> Snapshot<'a> {
    /// Creates a snapshot over the given containers.
    pub fn new(step: Step, views: Vec<&'a dyn ContainerView>) -> Self {
        Self { step, views }
    }

    /// Step that produced this snapshot.
    pub fn step(&self) -> Step {
        self.step
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.views.iter().map(|v| v.len()).sum()
    }

    /// Returns `true` if no container holds a cell.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every container view in registry order.
    pub fn containers(&self) -> impl Iterator<Item = &'a dyn ContainerView> + '_ {
        self.views.iter().copied()
    }

    /// Every cell of every container, in registry and then index order.
    pub fn cells(&self) -> impl Iterator<Item = CellSnapshot> + '_ {
        self.views
            .iter()
            .flat_map(|view| (0..view.len()).filter_map(move |index| view.cell(index)))
    }

    /// State of one cell, if it is part of the snapshot.
    pub fn get(&self, id: CellId) -> Option<CellSnapshot> {
        let view = self.views.iter().find(|v| v.agent_type() == id.agent_type())?;
        let cell = view.cell(id.index() as usize)?;
        (cell.id == id).then_some(cell)
    }
}

/// Consumer of per-step snapshots.
pub trait Collaborator: Send {
    /// Name used in log records.
    fn name(&self) -> &str;

    /// Called once per step with the finalized state.
    fn notify(&mut self, snapshot: &Snapshot<'_>) -> Result<(), CollaboratorError>;
}

/// A [`Collaborator`] backed by a closure.
pub struct FnCollaborator<F>
where
    F: FnMut(&Snapshot<'_>) -> Result<(), CollaboratorError> + Send,
{
    name: String,
    f: F,
}

impl<F> FnCollaborator<F>
where
    F: FnMut(&Snapshot<'_>) -> Result<(), CollaboratorError> + Send,
{
    /// Wraps `f` under `name`.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> Collaborator for FnCollaborator<F>
where
    F: FnMut(&Snapshot<'_>) -> Result<(), CollaboratorError> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn notify(&mut self, snapshot: &Snapshot<'_>) -> Result<(), CollaboratorError> {
        (self.f)(snapshot)
    }
}

/// Statistics of the cells sharing one cell type.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TypeSummary {
    /// Number of cells.
    pub count: Count,
    /// Total mass.
    pub mass: Sum,
    /// Smallest and largest diameter.
    pub diameter: MinMax,
    /// Mean and variance of the volume.
    pub volume: Welford,
}

impl TypeSummary {
    fn push(&mut self, cell: &CellSnapshot) {
        self.count.add();
        self.mass.add(cell.mass);
        self.diameter.push(cell.diameter);
        self.volume.push(cell.volume);
    }

    /// Merges statistics gathered over a disjoint set of cells.
    pub fn combine(&mut self, other: &TypeSummary) {
        self.count.combine(&other.count);
        self.mass.combine(&other.mass);
        self.diameter.combine(&other.diameter);
        self.volume.combine(&other.volume);
    }
}

/// Population readout for one step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepSummary {
    /// Step the summary was taken at.
    pub step: Step,
    /// Statistics per cell type.
    pub by_type: BTreeMap<CellType, TypeSummary>,
}

impl StepSummary {
    /// Summarizes the cells of one container.
    pub fn from_container(step: Step, view: &dyn ContainerView) -> Self {
        let mut by_type: BTreeMap<CellType, TypeSummary> = BTreeMap::new();
        for cell in (0..view.len()).filter_map(|index| view.cell(index)) {
            by_type.entry(cell.cell_type).or_default().push(&cell);
        }
        Self { step, by_type }
    }

    /// Summarizes every cell of a snapshot.
    ///
    /// Containers are summarized in parallel and merged in registry order, so
    /// the result does not depend on the worker count.
    pub fn from_snapshot(snapshot: &Snapshot<'_>) -> Self {
        let step = snapshot.step();
        let views: Vec<&dyn ContainerView> = snapshot.containers().collect();
        let parts: Vec<StepSummary> = views
            .par_iter()
            .map(|view| Self::from_container(step, *view))
            .collect();

        let mut summary = Self { step, by_type: BTreeMap::new() };
        for part in &parts {
            summary.combine(part);
        }
        summary
    }

    /// Merges the summary of a disjoint part of the population.
    pub fn combine(&mut self, other: &StepSummary) {
        for (cell_type, part) in &other.by_type {
            self.by_type.entry(*cell_type).or_default().combine(part);
        }
    }

    /// Total number of cells.
    pub fn population(&self) -> u64 {
        self.by_type.values().map(|s| s.count.0).sum()
    }

    /// Number of cells of one type.
    pub fn count_of(&self, cell_type: CellType) -> u64 {
        self.by_type.get(&cell_type).map_or(0, |s| s.count.0)
    }

    /// Total mass of the cells of one type.
    pub fn mass_of(&self, cell_type: CellType) -> f64 {
        self.by_type.get(&cell_type).map_or(0.0, |s| s.mass.0)
    }
}

/// Collaborator recording per-type counts and mass sums every step.
#[derive(Clone, Debug, Default)]
pub struct PopulationSummary {
    history: Vec<StepSummary>,
}

impl PopulationSummary {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// One summary per notified step, in step order.
    pub fn history(&self) -> &[StepSummary] {
        &self.history
    }

    /// Summary of the most recent step.
    pub fn latest(&self) -> Option<&StepSummary> {
        self.history.last()
    }
}

impl Collaborator for PopulationSummary {
    fn name(&self) -> &str {
        "population-summary"
    }

    fn notify(&mut self, snapshot: &Snapshot<'_>) -> Result<(), CollaboratorError> {
        let summary = StepSummary::from_snapshot(snapshot);
        debug!(
            "step {}: {} cells in {} types",
            summary.step,
            summary.population(),
            summary.by_type.len()
        );
        self.history.push(summary);
        Ok(())
    }
}

/// Lets a caller keep a handle to a collaborator it registered.
impl<C: Collaborator> Collaborator for Arc<Mutex<C>> {
    fn name(&self) -> &str {
        "shared"
    }

    fn notify(&mut self, snapshot: &Snapshot<'_>) -> Result<(), CollaboratorError> {
        let mut inner = self.lock().map_err(|e| e.to_string())?;
        inner.notify(snapshot)
    }
}
