//! Physical cell layouts behind a single storage trait.
//!
//! This module implements the two interchangeable layouts a
//! [`CellContainer`](crate::engine::container::CellContainer) can be
//! instantiated with:
//!
//! - **[`AosStorage`]**: array of structures. One contiguous [`Cell`] record
//!   per cell; cheap append and whole-cell moves.
//! - **[`SoaStorage`]**: structure of arrays. One dense column per attribute;
//!   streaming passes (mechanics, snapshots) touch only the columns they read.
//!
//! Both implement [`CellStorage`]. The layout is a generic parameter of the
//! container, so hot loops are monomorphized per layout and never branch on
//! it at runtime.
//!
//! # Logical model
//!
//! Whatever the layout, storage is a dense, ordered sequence of cells indexed
//! `0..len`. Code sees a cell only through [`CellRef`] / [`CellMut`] views and
//! its module list, which makes both layouts observationally identical.
//!
//! # Core operations
//!
//! - **Append**: `push` adds a cell after the last one.
//! - **Remove**: `swap_remove` deletes a cell in `O(1)` by moving the last cell
//!   into the freed slot. Order is **not** preserved.
//! - **Parallel passes**: `par_dispatch`, `par_map` and `par_update` visit every
//!   cell on the rayon pool and return results in index order.
//!
//! # Invariants
//!
//! For [`SoaStorage`] every column has exactly `len` entries. A mismatch is a
//! structural corruption; [`CellStorage::is_consistent`] reports it and the
//! container turns it into a concurrency violation.

use glam::DVec3;
use rayon::prelude::*;

use crate::engine::cell::{Cell, CellMut, CellRef};
use crate::engine::module::BehaviorModule;
use crate::engine::types::{CellType, Layout};


/// Dense, ordered storage for the cells of one container.
///
/// ## Parallel passes
/// The `par_*` methods split storage into disjoint per-cell views, so the
/// closure may mutate its cell without synchronization. Results are returned
/// in index order regardless of how rayon scheduled the work.
pub trait CellStorage: Default + Send + Sync + 'static {
    /// Physical layout implemented by this storage.
    const LAYOUT: Layout;

    /// Number of stored cells.
    fn len(&self) -> usize;

    /// Returns `true` if no cell is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a cell after the last one.
    fn push(&mut self, cell: Cell);

    /// Read-only view of the cell at `index`.
    fn get(&self, index: usize) -> Option<CellRef<'_>>;

    /// Mutable view of the cell at `index`.
    fn get_mut(&mut self, index: usize) -> Option<CellMut<'_>>;

    /// Modules attached to the cell at `index`.
    fn modules(&self, index: usize) -> Option<&[BehaviorModule]>;

    /// Removes the cell at `index`, moving the last cell into its slot.
    fn swap_remove(&mut self, index: usize) -> Option<Cell>;

    /// Drops every cell.
    fn clear(&mut self);

    /// Reserves room for `additional` cells.
    fn reserve(&mut self, additional: usize);

    /// Returns `false` if the internal columns disagree on the cell count.
    fn is_consistent(&self) -> bool;

    /// Visits every cell with mutable access to its attributes and modules.
    fn par_dispatch<R, F>(&mut self, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize, CellMut<'_>, &mut [BehaviorModule]) -> R + Sync + Send;

    /// Visits every cell read-only.
    fn par_map<R, F>(&self, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize, CellRef<'_>) -> R + Sync + Send;

    /// Visits every cell with mutable access to its attributes.
    fn par_update<F>(&mut self, f: F)
    where
        F: Fn(usize, CellMut<'_>) + Sync + Send;

    /// Sequentially visits every cell in index order.
    fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(usize, CellRef<'_>),
    {
        for index in 0..self.len() {
            if let Some(cell) = self.get(index) {
                f(index, cell);
            }
        }
    }
}

/// Array-of-structures storage: one [`Cell`] record per cell.
#[derive(Debug, Default, Clone)]
pub struct AosStorage {
    cells: Vec<Cell>,
}

impl CellStorage for AosStorage {
    const LAYOUT: Layout = Layout::ArrayOfStructures;

    #[inline]
    fn len(&self) -> usize {
        self.cells.len()
    }

    fn push(&mut self, cell: Cell) {
        self.cells.push(cell);
    }

    #[inline]
    fn get(&self, index: usize) -> Option<CellRef<'_>> {
        self.cells.get(index).map(Cell::as_ref)
    }

    #[inline]
    fn get_mut(&mut self, index: usize) -> Option<CellMut<'_>> {
        self.cells.get_mut(index).map(|cell| cell.split_mut().0)
    }

    fn modules(&self, index: usize) -> Option<&[BehaviorModule]> {
        self.cells.get(index).map(Cell::modules)
    }

    fn swap_remove(&mut self, index: usize) -> Option<Cell> {
        (index < self.cells.len()).then(|| self.cells.swap_remove(index))
    }

    fn clear(&mut self) {
        self.cells.clear();
    }

    fn reserve(&mut self, additional: usize) {
        self.cells.reserve(additional);
    }

    fn is_consistent(&self) -> bool {
        true
    }

    fn par_dispatch<R, F>(&mut self, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize, CellMut<'_>, &mut [BehaviorModule]) -> R + Sync + Send,
    {
        self.cells
            .par_iter_mut()
            .enumerate()
            .map(|(index, cell)| {
                let (view, modules) = cell.split_mut();
                f(index, view, modules.as_mut_slice())
            })
            .collect()
    }

    fn par_map<R, F>(&self, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize, CellRef<'_>) -> R + Sync + Send,
    {
        self.cells
            .par_iter()
            .enumerate()
            .map(|(index, cell)| f(index, cell.as_ref()))
            .collect()
    }

    fn par_update<F>(&mut self, f: F)
    where
        F: Fn(usize, CellMut<'_>) + Sync + Send,
    {
        self.cells
            .par_iter_mut()
            .enumerate()
            .for_each(|(index, cell)| f(index, cell.split_mut().0));
    }
}

/// Structure-of-arrays storage: one dense column per attribute.
#[derive(Debug, Default, Clone)]
pub struct SoaStorage {
    positions: Vec<DVec3>,
    tractor_forces: Vec<DVec3>,
    diameters: Vec<f64>,
    volumes: Vec<f64>,
    masses: Vec<f64>,
    adherences: Vec<f64>,
    cell_types: Vec<CellType>,
    modules: Vec<Vec<BehaviorModule>>,
}

impl SoaStorage {
    fn column_lengths(&self) -> [usize; 8] {
        [
            self.positions.len(),
            self.tractor_forces.len(),
            self.diameters.len(),
            self.volumes.len(),
            self.masses.len(),
            self.adherences.len(),
            self.cell_types.len(),
            self.modules.len(),
        ]
    }

    /// Read-only access to the position column.
    pub fn positions(&self) -> &[DVec3] {
        &self.positions
    }

    /// Read-only access to the diameter column.
    pub fn diameters(&self) -> &[f64] {
        &self.diameters
    }
}

impl CellStorage for SoaStorage {
    const LAYOUT: Layout = Layout::StructureOfArrays;

    #[inline]
    fn len(&self) -> usize {
        self.positions.len()
    }

    fn push(&mut self, cell: Cell) {
        self.positions.push(cell.position);
        self.tractor_forces.push(cell.tractor_force);
        self.diameters.push(cell.diameter);
        self.volumes.push(cell.volume);
        self.masses.push(cell.mass);
        self.adherences.push(cell.adherence);
        self.cell_types.push(cell.cell_type);
        self.modules.push(cell.modules);
    }

    fn get(&self, index: usize) -> Option<CellRef<'_>> {
        Some(CellRef {
            position: self.positions.get(index)?,
            tractor_force: self.tractor_forces.get(index)?,
            diameter: self.diameters.get(index)?,
            volume: self.volumes.get(index)?,
            mass: self.masses.get(index)?,
            adherence: self.adherences.get(index)?,
            cell_type: self.cell_types.get(index)?,
        })
    }

    fn get_mut(&mut self, index: usize) -> Option<CellMut<'_>> {
        Some(CellMut {
            position: self.positions.get_mut(index)?,
            tractor_force: self.tractor_forces.get_mut(index)?,
            diameter: self.diameters.get_mut(index)?,
            volume: self.volumes.get_mut(index)?,
            mass: self.masses.get_mut(index)?,
            adherence: self.adherences.get_mut(index)?,
            cell_type: self.cell_types.get_mut(index)?,
        })
    }

    fn modules(&self, index: usize) -> Option<&[BehaviorModule]> {
        self.modules.get(index).map(Vec::as_slice)
    }

    fn swap_remove(&mut self, index: usize) -> Option<Cell> {
        if index >= self.len() || !self.is_consistent() {
            return None;
        }
        Some(Cell {
            position: self.positions.swap_remove(index),
            tractor_force: self.tractor_forces.swap_remove(index),
            diameter: self.diameters.swap_remove(index),
            volume: self.volumes.swap_remove(index),
            mass: self.masses.swap_remove(index),
            adherence: self.adherences.swap_remove(index),
            cell_type: self.cell_types.swap_remove(index),
            modules: self.modules.swap_remove(index),
        })
    }

    fn clear(&mut self) {
        self.positions.clear();
        self.tractor_forces.clear();
        self.diameters.clear();
        self.volumes.clear();
        self.masses.clear();
        self.adherences.clear();
        self.cell_types.clear();
        self.modules.clear();
    }

    fn reserve(&mut self, additional: usize) {
        self.positions.reserve(additional);
        self.tractor_forces.reserve(additional);
        self.diameters.reserve(additional);
        self.volumes.reserve(additional);
        self.masses.reserve(additional);
        self.adherences.reserve(additional);
        self.cell_types.reserve(additional);
        self.modules.reserve(additional);
    }

    fn is_consistent(&self) -> bool {
        let lengths = self.column_lengths();
        lengths.iter().all(|&n| n == lengths[0])
    }

    fn par_dispatch<R, F>(&mut self, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize, CellMut<'_>, &mut [BehaviorModule]) -> R + Sync + Send,
    {
        (
            self.positions.par_iter_mut(),
            self.tractor_forces.par_iter_mut(),
            self.diameters.par_iter_mut(),
            self.volumes.par_iter_mut(),
            self.masses.par_iter_mut(),
            self.adherences.par_iter_mut(),
            self.cell_types.par_iter_mut(),
            self.modules.par_iter_mut(),
        )
            .into_par_iter()
            .enumerate()
            .map(|(index, (position, tractor_force, diameter, volume, mass, adherence, cell_type, modules))| {
                let view = CellMut { position, tractor_force, diameter, volume, mass, adherence, cell_type };
                f(index, view, modules.as_mut_slice())
            })
            .collect()
    }

    fn par_map<R, F>(&self, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize, CellRef<'_>) -> R + Sync + Send,
    {
        (
            self.positions.par_iter(),
            self.tractor_forces.par_iter(),
            self.diameters.par_iter(),
            self.volumes.par_iter(),
            self.masses.par_iter(),
            self.adherences.par_iter(),
            self.cell_types.par_iter(),
        )
            .into_par_iter()
            .enumerate()
            .map(|(index, (position, tractor_force, diameter, volume, mass, adherence, cell_type))| {
                f(index, CellRef { position, tractor_force, diameter, volume, mass, adherence, cell_type })
            })
            .collect()
    }

    fn par_update<F>(&mut self, f: F)
    where
        F: Fn(usize, CellMut<'_>) + Sync + Send,
    {
        (
            self.positions.par_iter_mut(),
            self.tractor_forces.par_iter_mut(),
            self.diameters.par_iter_mut(),
            self.volumes.par_iter_mut(),
            self.masses.par_iter_mut(),
            self.adherences.par_iter_mut(),
            self.cell_types.par_iter_mut(),
        )
            .into_par_iter()
            .enumerate()
            .for_each(|(index, (position, tractor_force, diameter, volume, mass, adherence, cell_type))| {
                f(index, CellMut { position, tractor_force, diameter, volume, mass, adherence, cell_type })
            });
    }
}
