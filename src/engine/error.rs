//! Error types for cell storage, division and step execution.
//!
//! This module declares focused, composable error types used across the
//! container, division and scheduling pipeline. Each error carries the
//! offending cell identity (when one exists) and the step number at which the
//! failure was detected, so a log line is enough to locate the problem.
//!
//! ## Taxonomy
//! * [`ConfigurationError`] — invalid initial attributes at append time. The
//!   cell never enters a container.
//! * [`OutOfBoundsError`] — lookup with an out-of-range or stale identity. This
//!   is a collaborator bug, the engine cannot repair it.
//! * [`DivisionInvariantError`] — a division that would create a non-positive
//!   daughter. Rejected per cell; the mother is left untouched and the step
//!   goes on.
//! * [`ConcurrencyViolationError`] — the committed extent of a container moved
//!   during a parallel stage, or its storage columns disagree. Fatal.
//! * [`CapacityError`] — identity space exhausted. Fatal.
//! * [`ParamError`] / [`LifecycleError`] — invalid configuration or an
//!   operation issued in the wrong scheduler state.
//!
//! Low-level operations return the focused type; orchestration code uses `?`
//! to bubble it into [`SimError`], which callers match on.
//!
//! ```ignore
//! match scheduler.run(100) {
//!     Ok(report) => println!("{} cells", report.final_population),
//!     Err(e) if e.is_fatal() => panic!("run aborted: {e}"),
//!     Err(e) => eprintln!("run failed: {e}"),
//! }
//! ```

use thiserror::Error;

use crate::engine::types::{AgentType, CellId, Step};


/// Attribute that failed validation when a cell was appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidAttribute {
    /// Diameter was zero, negative or not finite.
    Diameter,
    /// Mass was zero, negative or not finite.
    Mass,
    /// Volume was zero, negative or not finite.
    Volume,
    /// A position coordinate was not finite.
    Position,
}

/// Returned when a cell with invalid initial attributes is appended.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("cell {cell} rejected at step {step}: invalid {attribute:?} ({value})")]
pub struct ConfigurationError {
    /// Identity the cell would have received.
    pub cell: CellId,
    /// Step during which the append was attempted.
    pub step: Step,
    /// Offending attribute.
    pub attribute: InvalidAttribute,
    /// Rejected value.
    pub value: f64,
}

/// Why an identity lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutOfBoundsReason {
    /// Index is not below the committed length.
    Index {
        /// Committed length at the time of the lookup.
        length: usize,
    },
    /// Identity was minted before the last removal.
    StaleGeneration {
        /// Generation of the container at the time of the lookup.
        current: u16,
    },
    /// No container is registered for the identity's agent type.
    UnknownAgentType,
    /// The spatial index does not contain the identity.
    NotIndexed,
}

/// Returned when an identity does not address a committed cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cell {cell} out of bounds at step {step}: {reason:?}")]
pub struct OutOfBoundsError {
    /// Identity that failed to resolve.
    pub cell: CellId,
    /// Step of the lookup.
    pub step: Step,
    /// Why the lookup failed.
    pub reason: OutOfBoundsReason,
}

/// Returned when a division would produce a non-positive or non-finite cell.
///
/// ### Notes
/// The mother cell is left exactly as it was before the request.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("division of cell {cell} rejected at step {step}: {detail}")]
pub struct DivisionInvariantError {
    /// Mother cell of the rejected division.
    pub cell: CellId,
    /// Step of the request.
    pub step: Step,
    /// Violated condition.
    pub detail: &'static str,
}

/// Returned when a container changed outside the sanctioned append path
/// during a parallel stage, or when its storage is internally inconsistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("concurrency violation in container {agent_type:?} at step {step}: {detail} (expected {expected}, found {found})")]
pub struct ConcurrencyViolationError {
    /// Container that changed.
    pub agent_type: AgentType,
    /// Step of the check.
    pub step: Step,
    /// Check that failed.
    pub detail: &'static str,
    /// Expected committed length.
    pub expected: usize,
    /// Observed committed length.
    pub found: usize,
}

/// Returned when a container cannot mint further identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("identity space of container {agent_type:?} exhausted at step {step} ({needed} needed; capacity {capacity})")]
pub struct CapacityError {
    /// Container that ran out of identities.
    pub agent_type: AgentType,
    /// Step of the request.
    pub step: Step,
    /// Identities or generations required.
    pub needed: u64,
    /// Largest value the identity layout can hold.
    pub capacity: u64,
}

/// Returned when simulation parameters are unusable.
#[derive(Debug, Error)]
pub enum ParamError {
    /// A numeric parameter is outside its valid range.
    #[error("parameter `{name}` is invalid: {value}")]
    OutOfRange {
        /// Field name.
        name: &'static str,
        /// Rejected value.
        value: f64,
    },

    /// The parameter document could not be parsed.
    #[error("failed to parse parameters: {0}")]
    Parse(#[from] serde_json::Error),

    /// The parameter file could not be read.
    #[error("failed to read parameters: {0}")]
    Io(#[from] std::io::Error),

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

/// Returned when an operation is issued in the wrong scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// `setup` was called after the first step or a second time.
    #[error("setup already completed")]
    SetupAlreadyDone,
    /// The run was torn down; the scheduler cannot advance any further.
    #[error("simulation has been torn down")]
    TornDown,
}

/// Aggregate error returned by orchestration code.
#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid attributes on append.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Lookup with an out-of-range or stale identity.
    #[error(transparent)]
    OutOfBounds(#[from] OutOfBoundsError),

    /// Rejected division request.
    #[error(transparent)]
    DivisionInvariant(#[from] DivisionInvariantError),

    /// Container changed during a parallel stage.
    #[error(transparent)]
    ConcurrencyViolation(#[from] ConcurrencyViolationError),

    /// Identity space exhausted.
    #[error(transparent)]
    Capacity(#[from] CapacityError),

    /// Unusable parameters.
    #[error(transparent)]
    Param(#[from] ParamError),

    /// Operation issued in the wrong scheduler state.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl SimError {
    /// Returns `true` for conditions that must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SimError::ConcurrencyViolation(_) | SimError::Capacity(_) | SimError::OutOfBounds(_)
        )
    }
}

/// Result alias used throughout the engine.
pub type SimResult<T> = Result<T, SimError>;
