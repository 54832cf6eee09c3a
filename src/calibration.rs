// src/calibration.rs

//! # Gain Calibration
//!
//! Exhaustive grid search over PID gain triples. Every candidate drives a
//! fresh controller through a short rollout of the same rigid body model the
//! live run uses, and is scored by the summed absolute angle error. The lowest
//! score wins; ties keep the candidate enumerated first, with Kp as the outer
//! loop, Ki in the middle and Kd innermost.
//!
//! ## Degenerate objective
//!
//! With the default rollout the body starts exactly at the setpoint. Every
//! candidate then sees a zero error on every step and scores zero, so the
//! first triple of the grid is selected. This is kept as is; callers that want
//! a meaningful search can move `start_angle` away from the setpoint.

use crate::config::SimulationConfig;
use crate::error::SimulationError;
use crate::model::{angular_acceleration, PhysicalParameters};
use crate::pid::{AnglePid, ControllerGains};
use crate::simulation::{integrate_angle, normalize_angle};
use serde::{Deserialize, Serialize};
use tracing::{info, trace};

/// Evenly spaced values on a closed interval, like a linspace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainAxis {
    /// First value.
    pub start: f64,
    /// Last value, included when `steps > 1`.
    pub stop: f64,
    /// Number of values.
    pub steps: usize,
}

impl GainAxis {
    /// Creates an axis.
    pub fn new(start: f64, stop: f64, steps: usize) -> Self {
        Self { start, stop, steps }
    }

    /// The value at `index`. The last index yields `stop` exactly.
    pub fn value(&self, index: usize) -> f64 {
        if self.steps > 1 && index + 1 == self.steps {
            return self.stop;
        }
        let spacing = if self.steps > 1 {
            (self.stop - self.start) / (self.steps - 1) as f64
        } else {
            0.0
        };
        self.start + index as f64 * spacing
    }

    /// All values in ascending index order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.steps).map(move |index| self.value(index))
    }
}

/// The three gain axes searched by calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GainGrid {
    /// Proportional gain axis.
    pub kp: GainAxis,
    /// Integral gain axis.
    pub ki: GainAxis,
    /// Derivative gain axis.
    pub kd: GainAxis,
}

impl Default for GainGrid {
    fn default() -> Self {
        Self {
            kp: GainAxis::new(0.1, 5.0, 10),
            ki: GainAxis::new(0.0, 1.0, 10),
            kd: GainAxis::new(0.0, 1.0, 10),
        }
    }
}

impl GainGrid {
    /// Number of candidate triples.
    /// Saturates at `usize::MAX` for oversized axes.
    pub fn len(&self) -> usize {
        self.kp
            .steps
            .saturating_mul(self.ki.steps)
            .saturating_mul(self.kd.steps)
    }

    /// Whether the grid has no candidates.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Candidates in search order: Kp outer, Ki middle, Kd inner.
    pub fn candidates(&self) -> impl Iterator<Item = ControllerGains<f64>> + '_ {
        self.kp.values().flat_map(move |kp| {
            self.ki.values().flat_map(move |ki| {
                self.kd
                    .values()
                    .map(move |kd| ControllerGains::new(kp, ki, kd))
            })
        })
    }
}

/// Best candidate found by a search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationResult {
    /// Winning gains.
    pub gains: ControllerGains<f64>,
    /// Summed absolute error of the winning rollout. Lower is better.
    pub score: f64,
}

/// Grid search over controller gains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationEngine {
    /// Candidate gains.
    pub grid: GainGrid,
    /// Steps per rollout.
    pub rollout_steps: usize,
    /// Angle each rollout starts from, in degrees.
    pub start_angle: f64,
    /// Setpoint the rollout controller tracks, in degrees.
    pub set_point: f64,
    /// Fixed step size in seconds.
    pub dt: f64,
    /// Integral clamp of the rollout controller.
    pub integral_limit: f64,
    /// Derivative window of the rollout controller.
    pub derivative_window: usize,
}

impl Default for CalibrationEngine {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}

impl CalibrationEngine {
    /// Builds an engine matching the controller and timing of `config`.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            grid: config.calibration.grid,
            rollout_steps: config.calibration.rollout_steps,
            start_angle: config.calibration.rollout_start_angle,
            set_point: config.control.set_point,
            dt: config.control.dt,
            integral_limit: config.control.integral_limit,
            derivative_window: config.control.derivative_window,
        }
    }

    /// Scores one candidate with a disposable controller.
    ///
    /// The error is measured before each integration step. `inertia` must be
    /// the validated inertia of `params`.
    pub fn score(
        &self,
        params: &PhysicalParameters,
        inertia: f64,
        gains: ControllerGains<f64>,
    ) -> Result<f64, SimulationError> {
        let mut controller = AnglePid::new(gains, self.integral_limit, self.derivative_window);
        let mut angle = normalize_angle(self.start_angle);
        let mut score = 0.0;

        for _ in 0..self.rollout_steps {
            let terms = controller.step(self.set_point, angle, self.dt);
            score += terms.error.abs();
            let alpha = angular_acceleration(terms.force, params.length, inertia)?;
            angle = integrate_angle(angle, alpha, self.dt);
        }

        Ok(score)
    }

    /// Searches the whole grid and returns the best candidate.
    ///
    /// Invalid parameters abort the search before any rollout. Candidates
    /// whose rollout produces a non-finite score are passed over.
    pub fn run(&self, params: &PhysicalParameters) -> Result<CalibrationResult, SimulationError> {
        params.validate()?;
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(SimulationError::InvalidTimeStep(self.dt));
        }
        let inertia = params.checked_inertia()?;

        let mut best: Option<CalibrationResult> = None;
        for gains in self.grid.candidates() {
            let score = self.score(params, inertia, gains)?;
            trace!(kp = gains.kp, ki = gains.ki, kd = gains.kd, score, "candidate");
            if !score.is_finite() {
                continue;
            }
            match best {
                Some(current) if current.score <= score => {}
                _ => best = Some(CalibrationResult { gains, score }),
            }
        }

        let result = best.ok_or(SimulationError::CalibrationFailed)?;
        info!(
            kp = result.gains.kp,
            ki = result.gains.ki,
            kd = result.gains.kd,
            score = result.score,
            candidates = self.grid.len(),
            "calibrated PID gains"
        );
        Ok(result)
    }

    /// Searches the whole grid and returns the winning gains.
    pub fn calibrate(&self, params: &PhysicalParameters) -> Result<ControllerGains<f64>, SimulationError> {
        self.run(params).map(|result| result.gains)
    }
}

/// Calibrates with the default grid, rollout and controller settings.
pub fn calibrate(params: &PhysicalParameters) -> Result<ControllerGains<f64>, SimulationError> {
    CalibrationEngine::default().calibrate(params)
}
