//! Registry of cell containers.
//!
//! The [`ResourceManager`] owns exactly one [`CellContainer`] per registered
//! agent type for the lifetime of a run. It is created empty, populated during
//! setup, driven by the scheduler during steps and cleared at teardown.
//!
//! ## Ownership
//!
//! There is no global instance. A manager is an ordinary value owned by the
//! [`Scheduler`](crate::engine::scheduler::Scheduler); stages borrow it for
//! their duration, so registry changes cannot race with a running stage.
//!
//! ## Ordering
//!
//! Agent types are numbered in registration order and containers are always
//! visited in that order. Combined with the dense index order inside each
//! container this gives every cell a stable global position, which the
//! spatial index and snapshots rely on.
//!
//! ## Setup helpers
//!
//! [`ResourceManager::grid_3d`] builds a cubic lattice population, the usual
//! starting point of growth models.

use glam::DVec3;

use crate::engine::cell::{Cell, CellRef};
use crate::engine::container::CellContainer;
use crate::engine::error::{CapacityError, OutOfBoundsError, OutOfBoundsReason, SimResult};
use crate::engine::storage::{CellStorage, SoaStorage};
use crate::engine::types::{AgentType, AgentTypeID, CellId, Step};


/// Owns one container per agent type.
#[derive(Debug)]
pub struct ResourceManager<S: CellStorage = SoaStorage> {
    containers: Vec<CellContainer<S>>,
    names: Vec<String>,
    step: Step,
}

impl<S: CellStorage> Default for ResourceManager<S> {
    fn default() -> Self {
        Self { containers: Vec::new(), names: Vec::new(), step: 0 }
    }
}

impl<S: CellStorage> ResourceManager<S> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an agent type and creates its empty container.
    ///
    /// Registering a name twice returns the existing agent type.
    pub fn register_agent_type(&mut self, name: &str) -> Result<AgentType, CapacityError> {
        if let Some(agent_type) = self.agent_type(name) {
            return Ok(agent_type);
        }
        let slot = self.containers.len();
        if slot > AgentTypeID::MAX as usize {
            return Err(CapacityError {
                agent_type: AgentType(AgentTypeID::MAX),
                step: self.step,
                needed: slot as u64 + 1,
                capacity: AgentTypeID::MAX as u64 + 1,
            });
        }
        let agent_type = AgentType(slot as AgentTypeID);
        let mut container = CellContainer::new(agent_type);
        container.set_step(self.step);
        self.containers.push(container);
        self.names.push(name.to_owned());
        Ok(agent_type)
    }

    /// Looks up an agent type by name.
    pub fn agent_type(&self, name: &str) -> Option<AgentType> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|slot| AgentType(slot as AgentTypeID))
    }

    /// Name an agent type was registered under.
    pub fn name_of(&self, agent_type: AgentType) -> Option<&str> {
        self.names.get(agent_type.slot()).map(String::as_str)
    }

    /// Registered agent types, in registration order.
    pub fn agent_types(&self) -> impl Iterator<Item = AgentType> + '_ {
        self.containers.iter().map(CellContainer::agent_type)
    }

    fn unknown(&self, agent_type: AgentType) -> OutOfBoundsError {
        OutOfBoundsError {
            cell: CellId::new(agent_type, 0, 0),
            step: self.step,
            reason: OutOfBoundsReason::UnknownAgentType,
        }
    }

    /// Container owning the cells of `agent_type`.
    pub fn container_for(&mut self, agent_type: AgentType) -> Result<&mut CellContainer<S>, OutOfBoundsError> {
        let err = self.unknown(agent_type);
        self.containers.get_mut(agent_type.slot()).ok_or(err)
    }

    /// Container of one agent type, if registered.
    pub fn container(&self, agent_type: AgentType) -> Option<&CellContainer<S>> {
        self.containers.get(agent_type.slot())
    }

    /// All containers, in registration order.
    pub fn containers(&self) -> impl Iterator<Item = &CellContainer<S>> + '_ {
        self.containers.iter()
    }

    /// Every container in registration order, mutably.
    pub fn containers_mut(&mut self) -> impl Iterator<Item = &mut CellContainer<S>> + '_ {
        self.containers.iter_mut()
    }

    /// Read-only view of any committed cell.
    pub fn get(&self, id: CellId) -> Result<CellRef<'_>, OutOfBoundsError> {
        self.container(id.agent_type())
            .ok_or_else(|| OutOfBoundsError { cell: id, step: self.step, reason: OutOfBoundsReason::UnknownAgentType })?
            .get(id)
    }

    /// Number of committed cells across all containers.
    pub fn total_cells(&self) -> usize {
        self.containers.iter().map(CellContainer::len).sum()
    }

    /// Number of cells waiting for a commit across all containers.
    pub fn pending_cells(&self) -> usize {
        self.containers.iter().map(CellContainer::pending_len).sum()
    }

    /// Commits every container. Returns the number of merged cells.
    pub fn commit_all(&mut self) -> Result<usize, CapacityError> {
        let mut merged = 0;
        for container in &mut self.containers {
            merged += container.commit()?;
        }
        Ok(merged)
    }

    /// Step the registry was last advanced to.
    pub fn step(&self) -> Step {
        self.step
    }

    pub(crate) fn set_step(&mut self, step: Step) {
        self.step = step;
        for container in &mut self.containers {
            container.set_step(step);
        }
    }

    /// Drops every cell but keeps the registered agent types. Identities
    /// minted before the reset become stale.
    pub fn reset(&mut self) -> Result<(), CapacityError> {
        for container in &mut self.containers {
            container.clear()?;
        }
        Ok(())
    }

    /// Drops every container and registration.
    pub fn clear(&mut self) {
        self.containers.clear();
        self.names.clear();
    }

    /// Appends a `cells_per_dim³` lattice of cells spaced `space` apart,
    /// starting at the origin. `construct` builds the cell for each lattice
    /// position. Cells are appended with `z` varying fastest and committed
    /// before returning.
    pub fn grid_3d<F>(
        &mut self,
        agent_type: AgentType,
        cells_per_dim: usize,
        space: f64,
        mut construct: F,
    ) -> SimResult<Vec<CellId>>
    where
        F: FnMut(DVec3) -> Cell,
    {
        let container = self.container_for(agent_type)?;
        container.reserve(cells_per_dim.pow(3));

        let mut ids = Vec::with_capacity(cells_per_dim.pow(3));
        for x in 0..cells_per_dim {
            for y in 0..cells_per_dim {
                for z in 0..cells_per_dim {
                    let position = DVec3::new(x as f64, y as f64, z as f64) * space;
                    ids.push(container.append(construct(position))?);
                }
            }
        }
        container.commit()?;
        Ok(ids)
    }
}
