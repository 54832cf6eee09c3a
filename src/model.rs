// src/model.rs

//! # Rigid Body Model
//!
//! Rotational dynamics of a rectangular-section arm turning about a pivot at
//! one end. The arm is driven by a force applied at its center of mass, half
//! the arm length away from the pivot.

use crate::error::SimulationError;
use serde::{Deserialize, Serialize};

/// Mass and geometry of the simulated body.
///
/// Immutable for the duration of a run. Construct through [`PhysicalParameters::new`]
/// or call [`PhysicalParameters::validate`] before handing a deserialized value
/// to the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalParameters {
    /// Mass in kilograms.
    pub mass: f64,
    /// Cross-section height in meters.
    pub height: f64,
    /// Length in meters, measured from the pivot.
    pub length: f64,
}

impl Default for PhysicalParameters {
    fn default() -> Self {
        Self {
            mass: 0.2,
            height: 0.01,
            length: 0.005,
        }
    }
}

impl PhysicalParameters {
    /// Creates validated parameters.
    pub fn new(mass: f64, height: f64, length: f64) -> Result<Self, SimulationError> {
        let params = Self {
            mass,
            height,
            length,
        };
        params.validate()?;
        Ok(params)
    }

    /// Checks that every value is finite and strictly positive and that the
    /// resulting moment of inertia is usable as a divisor.
    pub fn validate(&self) -> Result<(), SimulationError> {
        for (name, value) in [
            ("mass", self.mass),
            ("height", self.height),
            ("length", self.length),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SimulationError::InvalidParameter { name, value });
            }
        }
        self.checked_inertia().map(|_| ())
    }

    /// Moment of inertia for these parameters.
    pub fn moment_of_inertia(&self) -> f64 {
        moment_of_inertia(self.mass, self.height, self.length)
    }

    /// Moment of inertia, rejected if it cannot be divided by.
    ///
    /// Tiny but positive dimensions can still underflow to zero, so this is
    /// checked separately from the per-parameter test.
    pub fn checked_inertia(&self) -> Result<f64, SimulationError> {
        let inertia = self.moment_of_inertia();
        if inertia == 0.0 || !inertia.is_finite() {
            return Err(SimulationError::DegenerateInertia(inertia));
        }
        Ok(inertia)
    }
}

/// Moment of inertia of a rectangular section, `(1/12) * m * (h^2 + l^2)`.
pub fn moment_of_inertia(mass: f64, height: f64, length: f64) -> f64 {
    (1.0 / 12.0) * mass * (height * height + length * length)
}

/// Angular acceleration produced by `force` acting at the center of mass.
///
/// The lever arm is half the body length. Fails instead of dividing when the
/// inertia is zero or not finite.
pub fn angular_acceleration(force: f64, length: f64, inertia: f64) -> Result<f64, SimulationError> {
    if inertia == 0.0 || !inertia.is_finite() {
        return Err(SimulationError::DegenerateInertia(inertia));
    }
    let lever_arm = length / 2.0;
    Ok((force * lever_arm) / inertia)
}
