// src/simulation/stepper.rs

//! # Simulation Stepper
//!
//! One control period of the live run. Each tick asks the controller for a
//! force, turns it into an angular acceleration through the rigid body model,
//! integrates the angle, records the signals and updates the stability
//! monitor. The stepper never schedules itself; the caller decides when the
//! next tick happens and whether it happens at all.
//!
//! ## Integration
//!
//! The angle update multiplies by `dt` twice, once to turn the acceleration
//! into an angular velocity and once to turn that velocity into an angle
//! increment. The velocity is rebuilt from the instantaneous force every tick
//! and is not carried over, so the increment is `alpha * dt^2`. The
//! calibration rollouts use the same update so that candidates are scored
//! under the discretization the live run exhibits.

use crate::error::SimulationError;
use crate::model::{angular_acceleration, PhysicalParameters};
use crate::pid::{AnglePid, ControllerGains};
use crate::simulation::{Sample, SimulationClock, StabilityMonitor, TimeSeries};
use tracing::debug;

/// Degrees in one revolution.
pub const FULL_TURN: f64 = 360.0;

/// Wraps an angle in degrees into `[0, 360)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(FULL_TURN);
    // rem_euclid rounds tiny negative inputs up to exactly 360
    if wrapped >= FULL_TURN {
        0.0
    } else {
        wrapped
    }
}

/// Applies one step of angular acceleration `alpha` to `angle`.
pub fn integrate_angle(angle: f64, alpha: f64, dt: f64) -> f64 {
    let omega = alpha * dt;
    normalize_angle(angle + omega * dt)
}

/// Observable state of the live run after a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationState {
    /// Elapsed simulated time in seconds.
    pub time: f64,
    /// Current angle in degrees, in `[0, 360)`.
    pub angle: f64,
    /// Contiguous time spent inside the stability band.
    pub stable_time: f64,
}

/// Whether the run should keep ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The angle has not settled yet.
    Continue,
    /// The angle stayed inside the band for the full dwell time.
    Converged,
}

/// Diagnostic record of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telemetry {
    /// Simulated time at the start of the tick.
    pub time: f64,
    /// Angle reached at the end of the tick.
    pub angle: f64,
    /// Control force.
    pub force: f64,
    /// Proportional contribution.
    pub proportional: f64,
    /// Integral contribution.
    pub integral_term: f64,
    /// Derivative contribution.
    pub derivative_term: f64,
    /// Angular acceleration produced by the force.
    pub alpha: f64,
    /// Clamped integral accumulator.
    pub integral: f64,
    /// Raw error derivative.
    pub derivative: f64,
    /// Setpoint minus the angle at the start of the tick.
    pub error: f64,
    /// Gains of the active controller.
    pub gains: ControllerGains<f64>,
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// State after the tick.
    pub state: SimulationState,
    /// What the tick computed.
    pub telemetry: Telemetry,
    /// Whether the run settled on this tick.
    pub outcome: TickOutcome,
}

/// Owns the mutable state of one live run.
pub struct SimulationStepper {
    params: PhysicalParameters,
    set_point: f64,
    angle: f64,
    controller: AnglePid<f64>,
    clock: SimulationClock,
    monitor: StabilityMonitor,
    recorder: TimeSeries,
}

impl SimulationStepper {
    /// Creates a stepper at time zero.
    ///
    /// The parameters are validated here so that a bad configuration is
    /// rejected before the first tick. The controller state is reset.
    pub fn new(
        params: PhysicalParameters,
        mut controller: AnglePid<f64>,
        clock: SimulationClock,
        mut monitor: StabilityMonitor,
        set_point: f64,
        initial_angle: f64,
    ) -> Result<Self, SimulationError> {
        params.validate()?;
        if !initial_angle.is_finite() {
            return Err(SimulationError::Config(format!(
                "initial angle must be finite, got {}",
                initial_angle
            )));
        }
        controller.reset();
        monitor.reset();

        Ok(SimulationStepper {
            params,
            set_point,
            angle: normalize_angle(initial_angle),
            controller,
            clock,
            monitor,
            recorder: TimeSeries::new(),
        })
    }

    /// The current state.
    pub fn state(&self) -> SimulationState {
        SimulationState {
            time: self.clock.time(),
            angle: self.angle,
            stable_time: self.monitor.stable_time(),
        }
    }

    /// The physical parameters of this run.
    pub fn parameters(&self) -> PhysicalParameters {
        self.params
    }

    /// The controller driving this run.
    pub fn controller(&self) -> &AnglePid<f64> {
        &self.controller
    }

    /// Number of completed ticks.
    pub fn ticks(&self) -> u64 {
        self.clock.ticks()
    }

    /// Signals recorded so far.
    pub fn series(&self) -> &TimeSeries {
        &self.recorder
    }

    /// Advances the run by one control period.
    pub fn tick(&mut self) -> Result<TickReport, SimulationError> {
        let dt = self.clock.dt();
        let time = self.clock.time();

        let terms = self.controller.step(self.set_point, self.angle, dt);
        let inertia = self.params.moment_of_inertia();
        let alpha = angular_acceleration(terms.force, self.params.length, inertia)?;
        let new_angle = integrate_angle(self.angle, alpha, dt);
        if !new_angle.is_finite() {
            return Err(SimulationError::Diverged { time });
        }

        self.recorder.push(Sample {
            time,
            angle: new_angle,
            force: terms.force,
            proportional: terms.proportional,
            integral: terms.integral_term,
            derivative: terms.derivative_term,
        });
        let settled = self.monitor.update(new_angle, dt);
        self.clock.advance();
        self.angle = new_angle;

        let gains = self.controller.gains();
        debug!(
            time,
            angle = new_angle,
            force = terms.force,
            p = terms.proportional,
            i = terms.integral_term,
            d = terms.derivative_term,
            alpha,
            integral = terms.integral,
            derivative = terms.derivative,
            error = terms.error,
            kp = gains.kp,
            ki = gains.ki,
            kd = gains.kd,
            "tick"
        );

        Ok(TickReport {
            state: self.state(),
            telemetry: Telemetry {
                time,
                angle: new_angle,
                force: terms.force,
                proportional: terms.proportional,
                integral_term: terms.integral_term,
                derivative_term: terms.derivative_term,
                alpha,
                integral: terms.integral,
                derivative: terms.derivative,
                error: terms.error,
                gains,
            },
            outcome: if settled {
                TickOutcome::Converged
            } else {
                TickOutcome::Continue
            },
        })
    }
}
