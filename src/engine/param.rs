//! Simulation parameters.
//!
//! [`Param`] collects every tunable constant of a run: integration step,
//! mechanical force coefficients, division draw ranges, the run seed and the
//! worker count. It is plain data, deserializable from JSON, and owned by the
//! scheduler for the lifetime of one run.
//!
//! ```ignore
//! let param = Param::from_json_str(r#"{ "seed": 7, "threads": 4 }"#)?;
//! ```
//!
//! Missing fields fall back to [`Param::default`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::error::ParamError;


/// Tunable constants of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Param {
    /// Integration time step `h` applied to volume change and displacement.
    pub simulation_time_step: f64,

    /// Largest displacement a cell may perform in one step.
    pub max_displacement: f64,

    /// Inter-object coefficient; enlarges radii by `10 ·` this value so that
    /// nearby, non-touching cells still interact.
    pub inter_object_coefficient: f64,

    /// Repulsion coefficient `k` of the sphere-sphere force.
    pub repulsion: f64,

    /// Attraction coefficient `γ` of the sphere-sphere force.
    pub attraction: f64,

    /// Lower bound of the drawn daughter/mother volume ratio.
    pub min_division_volume_ratio: f64,

    /// Upper bound (exclusive) of the drawn daughter/mother volume ratio.
    pub max_division_volume_ratio: f64,

    /// Volume floor applied by `change_volume`.
    pub min_volume: f64,

    /// Seed from which every per-cell random stream is derived.
    pub seed: u64,

    /// Worker count; `None` uses the global rayon pool.
    pub threads: Option<usize>,
}

impl Default for Param {
    fn default() -> Self {
        Self {
            simulation_time_step: 0.01,
            max_displacement: 3.0,
            inter_object_coefficient: 0.15,
            repulsion: 2.0,
            attraction: 1.0,
            min_division_volume_ratio: 0.9,
            max_division_volume_ratio: 1.1,
            min_volume: 5.2359877e-7,
            seed: 4357,
            threads: None,
        }
    }
}

impl Param {
    /// Parses parameters from a JSON document and validates them.
    pub fn from_json_str(json: &str) -> Result<Self, ParamError> {
        let param: Param = serde_json::from_str(json)?;
        param.validate()?;
        Ok(param)
    }

    /// Reads and parses a JSON parameter file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ParamError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Returns the extra distance, on top of the largest diameter, over which
    /// two cells may still exert a force on each other.
    #[inline]
    pub fn interaction_margin(&self) -> f64 {
        2.0 * self.additional_radius()
    }

    /// Radius enlargement applied by the sphere-sphere force.
    #[inline]
    pub fn additional_radius(&self) -> f64 {
        10.0 * self.inter_object_coefficient
    }

    /// Checks every numeric field against its valid range.
    pub fn validate(&self) -> Result<(), ParamError> {
        fn positive(name: &'static str, value: f64) -> Result<(), ParamError> {
            if value.is_finite() && value > 0.0 { Ok(()) } else { Err(ParamError::OutOfRange { name, value }) }
        }
        fn non_negative(name: &'static str, value: f64) -> Result<(), ParamError> {
            if value.is_finite() && value >= 0.0 { Ok(()) } else { Err(ParamError::OutOfRange { name, value }) }
        }

        positive("simulation_time_step", self.simulation_time_step)?;
        positive("max_displacement", self.max_displacement)?;
        non_negative("inter_object_coefficient", self.inter_object_coefficient)?;
        non_negative("repulsion", self.repulsion)?;
        non_negative("attraction", self.attraction)?;
        positive("min_division_volume_ratio", self.min_division_volume_ratio)?;
        positive("max_division_volume_ratio", self.max_division_volume_ratio)?;
        positive("min_volume", self.min_volume)?;

        if self.max_division_volume_ratio < self.min_division_volume_ratio {
            return Err(ParamError::OutOfRange {
                name: "max_division_volume_ratio",
                value: self.max_division_volume_ratio,
            });
        }
        if self.threads == Some(0) {
            return Err(ParamError::OutOfRange { name: "threads", value: 0.0 });
        }
        Ok(())
    }
}
