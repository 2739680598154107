//! Core Types, Identifiers, and Bit-Level Layouts
//!
//! This module defines the **fundamental identifiers and constants** shared by
//! every subsystem of the engine: containers, the spatial index, the division
//! protocol and the scheduler.
//!
//! ## Cell identity
//!
//! Cells are addressed by a packed 64-bit [`CellId`] with the following layout:
//!
//! ```text
//! | generation | agent type | index |
//! ```
//!
//! - **Index** is the dense position of the cell inside its container.
//! - **Agent type** selects the container owning the cell.
//! - **Generation** is the container's removal epoch. Removing a cell may move
//!   another cell into the freed slot, so every removal bumps the epoch and
//!   all identities minted before it become stale.
//!
//! Identities are plain values. They never point into storage, which keeps
//! them valid across container growth and safe to hand to other threads.
//!
//! The exact bit widths are controlled by compile-time constants and validated
//! using static assertions.

use std::fmt;


/// Bit-width type used for compile-time layout calculations.
pub type Bits = u8;

/// Packed 64-bit cell identity value.
pub type CellIdBits = u64;
/// Dense index of a cell inside its container.
pub type CellIndex = u32;
/// Removal and clear epoch of a container.
pub type Generation = u16;
/// Raw identifier of an agent type (one container per agent type).
pub type AgentTypeID = u16;
/// Simulation step counter.
pub type Step = u64;

/// Total number of bits in a [`CellIdBits`].
pub const ID_BITS: Bits = 64;
/// Number of bits reserved for the container generation.
pub const GENERATION_BITS: Bits = 16;
/// Number of bits reserved for the agent type.
pub const AGENT_TYPE_BITS: Bits = 16;
/// Number of bits reserved for the dense cell index.
pub const INDEX_BITS: Bits = ID_BITS - GENERATION_BITS - AGENT_TYPE_BITS;

const _: [(); 1] = [(); (GENERATION_BITS + AGENT_TYPE_BITS < ID_BITS) as usize];
const _: [(); 1] = [(); (INDEX_BITS == 32) as usize];

const fn mask(bits: Bits) -> CellIdBits {
    if bits == 0 { 0 } else { ((1 as CellIdBits) << bits) - 1 }
}

/// Mask selecting the index portion of a [`CellIdBits`].
pub const INDEX_MASK: CellIdBits = mask(INDEX_BITS);
/// Mask selecting the agent type portion of a [`CellIdBits`].
pub const AGENT_TYPE_MASK: CellIdBits = mask(AGENT_TYPE_BITS);
/// Largest index a container can hand out.
pub const INDEX_CAP: CellIndex = INDEX_MASK as CellIndex;
/// Largest generation before the identity space of a container is exhausted.
pub const GENERATION_CAP: Generation = Generation::MAX;

/// Diameter given to cells built with [`Cell::new`](crate::engine::cell::Cell::new).
pub const DEFAULT_DIAMETER: f64 = 30.0;
/// Mass given to cells built with [`Cell::new`](crate::engine::cell::Cell::new).
pub const DEFAULT_MASS: f64 = 1.0;
/// Adherence given to cells built with [`Cell::new`](crate::engine::cell::Cell::new).
pub const DEFAULT_ADHERENCE: f64 = 0.4;

/// Stable identity of a cell: container, dense index and container generation.
///
/// ## Invariants
/// - `index` is only meaningful for the container selected by `agent_type`.
/// - An identity is valid while the container generation matches `generation`
///   and `index` is below the committed length.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellId(pub CellIdBits);

impl CellId {
    /// Packs the three identity parts into one value.
    #[inline]
    pub const fn new(agent_type: AgentType, index: CellIndex, generation: Generation) -> Self {
        CellId(
            ((generation as CellIdBits) << (AGENT_TYPE_BITS + INDEX_BITS))
                | (((agent_type.0 as CellIdBits) & AGENT_TYPE_MASK) << INDEX_BITS)
                | (index as CellIdBits),
        )
    }

    /// Dense index inside the container.
    #[inline] pub const fn index(self) -> CellIndex { (self.0 & INDEX_MASK) as CellIndex }
    /// Agent type of the owning container.
    #[inline] pub const fn agent_type(self) -> AgentType { AgentType(((self.0 >> INDEX_BITS) & AGENT_TYPE_MASK) as AgentTypeID) }
    /// Container generation the identity was minted under.
    #[inline] pub const fn generation(self) -> Generation { (self.0 >> (INDEX_BITS + AGENT_TYPE_BITS)) as Generation }
}

impl fmt::Debug for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CellId({}:{}@g{})", self.agent_type().0, self.index(), self.generation())
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@g{}", self.agent_type().0, self.index(), self.generation())
    }
}

/// Identifier of an agent type. Each agent type owns exactly one container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AgentType(pub AgentTypeID);

impl AgentType {
    /// Position of the agent type's container in the registry.
    #[inline]
    pub const fn slot(self) -> usize {
        self.0 as usize
    }
}

/// Biological classification tag of a cell.
///
/// `CellType::UNCLASSIFIED` marks a fresh cell that no module has classified
/// yet. Once a module sets a type, division never resets it on the mother.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CellType(pub i32);

impl CellType {
    /// Type tag of a cell that has not been classified yet.
    pub const UNCLASSIFIED: CellType = CellType(0);

    /// Returns `false` for `UNCLASSIFIED`.
    #[inline]
    pub const fn is_classified(self) -> bool {
        self.0 != Self::UNCLASSIFIED.0
    }
}

/// Event kinds under which behavior modules are asked whether they travel
/// with a newly created cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    /// A mother cell splits into mother and daughter.
    CellDivision,
}

/// Physical layout of a cell container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layout {
    /// One contiguous record per cell.
    ArrayOfStructures,
    /// One contiguous column per attribute.
    StructureOfArrays,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::ArrayOfStructures => f.write_str("aos"),
            Layout::StructureOfArrays => f.write_str("soa"),
        }
    }
}
