// src/simulation/clock.rs

//! Fixed-step simulated time.

use crate::error::SimulationError;

/// Elapsed simulated time advanced by a fixed step.
///
/// Time is derived from the tick count so it does not drift over long runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationClock {
    dt: f64,
    ticks: u64,
}

impl SimulationClock {
    /// Creates a clock at time zero. `dt` must be finite and positive.
    pub fn new(dt: f64) -> Result<Self, SimulationError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimulationError::InvalidTimeStep(dt));
        }
        Ok(Self { dt, ticks: 0 })
    }

    /// The fixed step size in seconds.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Number of completed ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Elapsed simulated time in seconds.
    pub fn time(&self) -> f64 {
        self.ticks as f64 * self.dt
    }

    /// Advances by one step and returns the new time.
    pub fn advance(&mut self) -> f64 {
        self.ticks += 1;
        self.time()
    }

    /// Rewinds to time zero.
    pub fn reset(&mut self) {
        self.ticks = 0;
    }
}
