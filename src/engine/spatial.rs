//! Uniform-grid spatial index.
//!
//! The index partitions space into cubic boxes whose edge is at least the
//! largest interaction distance (largest diameter plus the interaction
//! margin). Two cells that can interact are then always in the same or in
//! adjacent boxes, so a neighbor query only scans 27 boxes.
//!
//! ## Lifecycle
//!
//! The index is step-scoped. [`SpatialIndex::rebuild`] throws away the
//! previous grid and repopulates it from the current positions of every cell
//! in every container. Nothing else mutates it. Rebuilding twice from the same
//! cells yields the same index.
//!
//! ## Build
//!
//! 1. Gather `(identity, position, diameter)` from every container, in
//!    registry order and then index order.
//! 2. Size the grid from the bounding box and the box edge. If the grid would
//!    have far more boxes than cells, the edge is doubled until it does not.
//! 3. Counting sort by box: one pass to count, one prefix sum, one pass to
//!    place. Cells inside a box keep gather order.
//!
//! The build is linear in the cell count.
//!
//! ## Queries
//!
//! Neighbor queries return every cell of the 27 surrounding boxes except the
//! queried cell. There are no false negatives; cells farther away than the
//! interaction distance may be included. The index holds its own copy of
//! positions and diameters, so queries are safe while containers are being
//! mutated.

use glam::DVec3;

use crate::engine::container::CellContainer;
use crate::engine::error::{OutOfBoundsError, OutOfBoundsReason};
use crate::engine::storage::CellStorage;
use crate::engine::types::{CellId, Generation, Step};


const MIN_BOX_BUDGET: usize = 4096;

/// Copy of the indexed state of one cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexedCell {
    /// Identity of the indexed cell.
    pub id: CellId,
    /// Position at the last rebuild.
    pub position: DVec3,
    /// Diameter at the last rebuild.
    pub diameter: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct TypeRange {
    start: usize,
    len: usize,
    generation: Generation,
}

/// Step-scoped uniform grid over every cell of every container.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpatialIndex {
    cells: Vec<IndexedCell>,
    box_starts: Vec<usize>,
    slots: Vec<usize>,
    ranges: Vec<Option<TypeRange>>,
    origin: DVec3,
    box_length: f64,
    dims: [usize; 3],
    max_diameter: f64,
    step: Step,
}

impl SpatialIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if no cell is indexed.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Edge length of one box.
    pub fn box_length(&self) -> f64 {
        self.box_length
    }

    /// Number of boxes along each axis.
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Largest diameter seen by the last rebuild.
    pub fn max_diameter(&self) -> f64 {
        self.max_diameter
    }

    /// Step at which the index was last rebuilt.
    pub fn step(&self) -> Step {
        self.step
    }

    /// Drops every indexed cell.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Repopulates the index from the current state of `containers`.
    ///
    /// `margin` is added to the largest diameter to obtain the minimum box
    /// edge.
    pub fn rebuild<'a, S, I>(&mut self, containers: I, margin: f64, step: Step)
    where
        S: CellStorage,
        I: IntoIterator<Item = &'a CellContainer<S>>,
    {
        let mut gathered: Vec<IndexedCell> = Vec::new();
        let mut ranges: Vec<Option<TypeRange>> = Vec::new();

        for container in containers {
            let start = gathered.len();
            let agent_type = container.agent_type();
            let generation = container.generation();
            gathered.extend(container.storage().par_map(|index, cell| IndexedCell {
                id: container.id_of(index),
                position: cell.position(),
                diameter: cell.diameter(),
            }));

            let slot = agent_type.slot();
            if ranges.len() <= slot {
                ranges.resize(slot + 1, None);
            }
            ranges[slot] = Some(TypeRange { start, len: gathered.len() - start, generation });
        }

        self.ranges = ranges;
        self.step = step;
        self.build(gathered, margin);
    }

    fn build(&mut self, gathered: Vec<IndexedCell>, margin: f64) {
        let n = gathered.len();
        if n == 0 {
            self.cells.clear();
            self.slots.clear();
            self.box_starts = vec![0, 0];
            self.origin = DVec3::ZERO;
            self.box_length = 1.0;
            self.dims = [1, 1, 1];
            self.max_diameter = 0.0;
            return;
        }

        let mut lo = DVec3::splat(f64::INFINITY);
        let mut hi = DVec3::splat(f64::NEG_INFINITY);
        let mut max_diameter: f64 = 0.0;
        for cell in &gathered {
            lo = lo.min(cell.position);
            hi = hi.max(cell.position);
            max_diameter = max_diameter.max(cell.diameter);
        }

        let mut box_length = max_diameter + margin.max(0.0);
        if !(box_length.is_finite() && box_length > 0.0) {
            box_length = 1.0;
        }
        let extent = (hi - lo).max(DVec3::ZERO);
        let budget = (8 * n).max(MIN_BOX_BUDGET);
        let mut dims = grid_dims(extent, box_length);
        while dims.iter().fold(1usize, |acc, &d| acc.saturating_mul(d)) > budget {
            box_length *= 2.0;
            dims = grid_dims(extent, box_length);
        }

        self.origin = lo;
        self.box_length = box_length;
        self.dims = dims;
        self.max_diameter = max_diameter;

        let box_count = dims[0] * dims[1] * dims[2];
        let boxes: Vec<usize> = gathered.iter().map(|cell| self.box_id(self.box_coords(cell.position))).collect();

        let mut starts = vec![0usize; box_count + 1];
        for &b in &boxes {
            starts[b + 1] += 1;
        }
        for b in 0..box_count {
            starts[b + 1] += starts[b];
        }

        let mut cursor = starts.clone();
        let mut slots = vec![0usize; n];
        let mut sorted = gathered.clone();
        for (gather_pos, (&b, cell)) in boxes.iter().zip(gathered).enumerate() {
            let slot = cursor[b];
            cursor[b] += 1;
            sorted[slot] = cell;
            slots[gather_pos] = slot;
        }

        self.cells = sorted;
        self.slots = slots;
        self.box_starts = starts;
    }

    #[inline]
    fn box_coords(&self, position: DVec3) -> [usize; 3] {
        let rel = (position - self.origin) / self.box_length;
        [
            (rel.x.floor().max(0.0) as usize).min(self.dims[0] - 1),
            (rel.y.floor().max(0.0) as usize).min(self.dims[1] - 1),
            (rel.z.floor().max(0.0) as usize).min(self.dims[2] - 1),
        ]
    }

    #[inline]
    fn box_id(&self, [x, y, z]: [usize; 3]) -> usize {
        (z * self.dims[1] + y) * self.dims[0] + x
    }

    fn slot_of(&self, id: CellId) -> Result<usize, OutOfBoundsError> {
        let not_indexed = OutOfBoundsError { cell: id, step: self.step, reason: OutOfBoundsReason::NotIndexed };
        let range = self
            .ranges
            .get(id.agent_type().slot())
            .copied()
            .flatten()
            .ok_or(not_indexed)?;
        if range.generation != id.generation() || id.index() as usize >= range.len {
            return Err(not_indexed);
        }
        Ok(self.slots[range.start + id.index() as usize])
    }

    /// Indexed state of one cell.
    pub fn get(&self, id: CellId) -> Result<&IndexedCell, OutOfBoundsError> {
        let slot = self.slot_of(id)?;
        Ok(&self.cells[slot])
    }

    /// Calls `f` for every candidate neighbor of `id`.
    pub fn for_each_neighbor<F>(&self, id: CellId, mut f: F) -> Result<(), OutOfBoundsError>
    where
        F: FnMut(&IndexedCell),
    {
        let me = self.get(id)?;
        let [bx, by, bz] = self.box_coords(me.position);
        for z in bz.saturating_sub(1)..=(bz + 1).min(self.dims[2] - 1) {
            for y in by.saturating_sub(1)..=(by + 1).min(self.dims[1] - 1) {
                for x in bx.saturating_sub(1)..=(bx + 1).min(self.dims[0] - 1) {
                    let b = self.box_id([x, y, z]);
                    for other in &self.cells[self.box_starts[b]..self.box_starts[b + 1]] {
                        if other.id != id {
                            f(other);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Candidate neighbors of `id`, excluding `id` itself.
    pub fn neighbors(&self, id: CellId) -> Result<Vec<CellId>, OutOfBoundsError> {
        let mut out = Vec::new();
        self.for_each_neighbor(id, |other| out.push(other.id))?;
        Ok(out)
    }
}

fn grid_dims(extent: DVec3, box_length: f64) -> [usize; 3] {
    let axis = |e: f64| ((e / box_length).floor() as usize).saturating_add(1);
    [axis(extent.x), axis(extent.y), axis(extent.z)]
}
