//! # Engine Module
//!
//! Core simulation engine.
//!
//! This module contains all building blocks of a run:
//! - Identifiers, parameters and errors
//! - Cells, behavior modules and the division protocol
//! - Dual-layout storage and cell containers
//! - Spatial index and mechanics
//! - Scheduling, snapshots and collaborators
//!
//! Public API exposure is controlled by `lib.rs`.

pub mod types;
pub mod error;
pub mod param;
pub mod random;
pub mod cell;
pub mod module;
pub mod division;
pub mod storage;
pub mod container;
pub mod spatial;
pub mod mechanics;
pub mod manager;
pub mod reduce;
pub mod snapshot;
pub mod timing;
pub mod scheduler;
