//! Homogeneous cell containers.
//!
//! A [`CellContainer`] owns every cell of one agent type. It is generic over
//! its [`CellStorage`] layout and adds identity handling, validation and the
//! append buffer on top of it.
//!
//! ## Append buffer
//!
//! `append` never touches committed storage. New cells (from setup code or
//! from division during a module pass) wait in a pending buffer and are
//! merged, in the order they were produced, by [`CellContainer::commit`]. A
//! traversal therefore never observes a cell created in the same step, and
//! daughters always land after every cell that existed before the step.
//!
//! ## Identities
//!
//! A committed cell at position `i` has identity
//! `CellId::new(agent_type, i, generation)`. `append` returns the identity the
//! cell will have once committed, provided no removal happens in between.
//! Every removal and every clear of a populated container bumps the
//! generation, which invalidates all outstanding identities of the container.
//!
//! ## Concurrency
//!
//! The module pass runs on the rayon pool with one disjoint view per cell.
//! Before and after the pass the container checks that its committed extent is
//! unchanged and its storage is consistent; anything else is reported as a
//! [`ConcurrencyViolationError`].

use crate::engine::cell::{Cell, CellMut, CellRef};
use crate::engine::division::{run_cell, ModuleContext};
use crate::engine::error::{
    CapacityError, ConcurrencyViolationError, ConfigurationError, DivisionInvariantError,
    OutOfBoundsError, OutOfBoundsReason, SimResult,
};
use crate::engine::module::BehaviorModule;
use crate::engine::param::Param;
use crate::engine::random::CellRng;
use crate::engine::spatial::SpatialIndex;
use crate::engine::storage::{CellStorage, SoaStorage};
use crate::engine::types::{
    AgentType, CellId, CellIndex, Generation, Layout, Step, GENERATION_CAP, INDEX_CAP,
};


/// Result of one module pass over a container.
#[derive(Debug, Default, Clone)]
pub struct DispatchReport {
    /// Daughters buffered for the next commit.
    pub divisions: usize,
    /// Division requests rejected during the pass.
    pub rejected: Vec<DivisionInvariantError>,
}

/// Ordered, densely packed population of one agent type.
#[derive(Debug)]
pub struct CellContainer<S: CellStorage = SoaStorage> {
    agent_type: AgentType,
    storage: S,
    pending: Vec<Cell>,
    generation: Generation,
    step: Step,
}

impl<S: CellStorage> CellContainer<S> {
    /// Creates an empty container for `agent_type`.
    pub fn new(agent_type: AgentType) -> Self {
        Self {
            agent_type,
            storage: S::default(),
            pending: Vec::new(),
            generation: 0,
            step: 0,
        }
    }

    /// Agent type whose cells this container owns.
    #[inline]
    pub fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    /// Physical layout of the storage.
    #[inline]
    pub fn layout(&self) -> Layout {
        S::LAYOUT
    }

    /// Number of committed cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Returns `true` if no cell is committed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Number of cells waiting for the next commit.
    #[inline]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Generation stamped into identities minted now.
    #[inline]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Step used when reporting errors raised by this container.
    #[inline]
    pub fn step(&self) -> Step {
        self.step
    }

    pub(crate) fn set_step(&mut self, step: Step) {
        self.step = step;
    }

    /// Identity of the committed cell at `index`.
    #[inline]
    pub fn id_of(&self, index: usize) -> CellId {
        CellId::new(self.agent_type, index as CellIndex, self.generation)
    }

    /// Identities of all committed cells, in order.
    pub fn ids(&self) -> impl Iterator<Item = CellId> + '_ {
        (0..self.len()).map(move |index| self.id_of(index))
    }

    /// Committed storage, read-only.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub(crate) fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Buffers a cell for the next commit and returns its future identity.
    ///
    /// ## Errors
    /// * [`ConfigurationError`] — non-positive or non-finite diameter, mass or
    ///   volume, or a non-finite position.
    /// * [`CapacityError`] — the index space of the container is exhausted.
    pub fn append(&mut self, cell: Cell) -> SimResult<CellId> {
        let slot = self.len() + self.pending.len();
        let id = self.id_of(slot);
        if let Err((attribute, value)) = cell.validate() {
            return Err(ConfigurationError { cell: id, step: self.step, attribute, value }.into());
        }
        if slot >= INDEX_CAP as usize {
            return Err(self.capacity_error(slot as u64 + 1, INDEX_CAP as u64).into());
        }
        self.pending.push(cell);
        Ok(id)
    }

    /// Merges pending cells into committed storage, in append order.
    /// Returns the number of merged cells.
    pub fn commit(&mut self) -> Result<usize, CapacityError> {
        let needed = self.len() + self.pending.len();
        if needed > INDEX_CAP as usize {
            return Err(self.capacity_error(needed as u64, INDEX_CAP as u64));
        }
        let merged = self.pending.len();
        self.storage.reserve(merged);
        for cell in self.pending.drain(..) {
            self.storage.push(cell);
        }
        Ok(merged)
    }

    fn locate(&self, id: CellId) -> Result<usize, OutOfBoundsError> {
        let reason = if id.agent_type() != self.agent_type {
            OutOfBoundsReason::UnknownAgentType
        } else if id.generation() != self.generation {
            OutOfBoundsReason::StaleGeneration { current: self.generation }
        } else if id.index() as usize >= self.len() {
            OutOfBoundsReason::Index { length: self.len() }
        } else {
            return Ok(id.index() as usize);
        };
        Err(OutOfBoundsError { cell: id, step: self.step, reason })
    }

    /// Read-only view of a committed cell.
    pub fn get(&self, id: CellId) -> Result<CellRef<'_>, OutOfBoundsError> {
        let index = self.locate(id)?;
        self.storage
            .get(index)
            .ok_or(OutOfBoundsError { cell: id, step: self.step, reason: OutOfBoundsReason::Index { length: index } })
    }

    /// Mutable view of a committed cell.
    pub fn get_mut(&mut self, id: CellId) -> Result<CellMut<'_>, OutOfBoundsError> {
        let index = self.locate(id)?;
        let step = self.step;
        self.storage
            .get_mut(index)
            .ok_or(OutOfBoundsError { cell: id, step, reason: OutOfBoundsReason::Index { length: index } })
    }

    /// Modules attached to a committed cell.
    pub fn modules(&self, id: CellId) -> Result<&[BehaviorModule], OutOfBoundsError> {
        let index = self.locate(id)?;
        self.storage
            .modules(index)
            .ok_or(OutOfBoundsError { cell: id, step: self.step, reason: OutOfBoundsReason::Index { length: index } })
    }

    /// Visits every committed cell in order.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(CellId, CellRef<'_>),
    {
        let agent_type = self.agent_type;
        let generation = self.generation;
        self.storage.for_each(|index, cell| {
            f(CellId::new(agent_type, index as CellIndex, generation), cell)
        });
    }

    /// Removes a committed cell. The last cell moves into its slot and every
    /// outstanding identity of this container becomes stale.
    pub fn remove(&mut self, id: CellId) -> SimResult<Cell> {
        let index = self.locate(id)?;
        if self.generation == GENERATION_CAP {
            return Err(self.capacity_error(GENERATION_CAP as u64 + 1, GENERATION_CAP as u64).into());
        }
        let cell = self.storage.swap_remove(index).ok_or(ConcurrencyViolationError {
            agent_type: self.agent_type,
            step: self.step,
            detail: "storage columns disagree on removal",
            expected: self.len(),
            found: index,
        })?;
        self.generation += 1;
        Ok(cell)
    }

    /// Drops every committed and pending cell.
    ///
    /// Clearing a non-empty container bumps the generation, so identities
    /// minted before the clear never resolve to cells appended after it.
    pub fn clear(&mut self) -> Result<(), CapacityError> {
        if self.storage.is_empty() && self.pending.is_empty() {
            return Ok(());
        }
        if self.generation == GENERATION_CAP {
            return Err(self.capacity_error(GENERATION_CAP as u64 + 1, GENERATION_CAP as u64));
        }
        self.storage.clear();
        self.pending.clear();
        self.generation += 1;
        Ok(())
    }

    /// Reserves room for `additional` committed cells.
    pub fn reserve(&mut self, additional: usize) {
        self.storage.reserve(additional);
    }

    fn capacity_error(&self, needed: u64, capacity: u64) -> CapacityError {
        CapacityError { agent_type: self.agent_type, step: self.step, needed, capacity }
    }

    fn check_extent(&self, expected: usize, detail: &'static str) -> Result<(), ConcurrencyViolationError> {
        let found = self.storage.len();
        if found != expected || !self.storage.is_consistent() {
            return Err(ConcurrencyViolationError {
                agent_type: self.agent_type,
                step: self.step,
                detail,
                expected,
                found,
            });
        }
        Ok(())
    }

    /// Runs every module of every committed cell on the rayon pool.
    ///
    /// Cells are independent during the pass: each one gets its own random
    /// stream seeded from `(param.seed, step, agent type, index)` and its own
    /// daughter buffer. Daughters are moved to the pending buffer afterwards,
    /// in mother order, so the outcome does not depend on the worker count.
    pub fn run_behavior_modules(
        &mut self,
        param: &Param,
        spatial: &SpatialIndex,
        step: Step,
    ) -> Result<DispatchReport, ConcurrencyViolationError> {
        self.step = step;
        let expected = self.storage.len();
        self.check_extent(expected, "storage inconsistent before module pass")?;

        let agent_type = self.agent_type;
        let generation = self.generation;
        let outcomes = self.storage.par_dispatch(|index, cell, modules| {
            let index = index as CellIndex;
            let id = CellId::new(agent_type, index, generation);
            let rng = CellRng::for_cell(param.seed, step, agent_type, index);
            run_cell(cell, modules, ModuleContext::new(param, spatial, step, id, rng))
        });

        self.check_extent(expected, "committed extent changed during module pass")?;

        let mut report = DispatchReport::default();
        for outcome in outcomes {
            report.divisions += outcome.daughters.len();
            report.rejected.extend(outcome.rejected);
            self.pending.extend(outcome.daughters);
        }
        Ok(report)
    }
}
