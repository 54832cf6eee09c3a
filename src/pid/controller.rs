// src/pid/controller.rs

//! # Angle PID Controller
//!
//! A stateful wrapper around [`piddiy::PidController`] driven by
//! [`compute_angle`]. The wrapper owns the bounded error history used for the
//! derivative and reports the individual P, I and D contributions of every
//! step, which the stepper records and logs.

use crate::pid::{compute_angle, AngleControlData};
use crate::Number;
use piddiy::PidController;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

// The window is user supplied; the history grows on demand past this.
const HISTORY_PREALLOCATION: usize = 16;

/// Proportional, integral and derivative gains.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControllerGains<T> {
    /// Proportional gain.
    pub kp: T,
    /// Integral gain.
    pub ki: T,
    /// Derivative gain.
    pub kd: T,
}

impl<T> ControllerGains<T> {
    /// Creates a gain triple.
    pub fn new(kp: T, ki: T, kd: T) -> Self {
        Self { kp, ki, kd }
    }
}

/// Everything one controller step produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidTerms<T> {
    /// Control force, the sum of the three weighted terms.
    pub force: T,
    /// Proportional contribution, `kp * error`.
    pub proportional: T,
    /// Integral contribution, `ki * integral`.
    pub integral_term: T,
    /// Derivative contribution, `kd * derivative`.
    pub derivative_term: T,
    /// Setpoint minus measurement.
    pub error: T,
    /// Clamped integral accumulator after this step.
    pub integral: T,
    /// Raw error derivative used for this step.
    pub derivative: T,
}

/// Angle PID controller with integral clamping and a windowed derivative.
pub struct AnglePid<T: Number> {
    pid: PidController<T, AngleControlData<T>>,
    gains: ControllerGains<T>,
    error_history: VecDeque<T>,
    derivative_window: usize,
    integral_limit: T,
}

impl<T: Number> AnglePid<T> {
    /// Creates a controller with a cleared state.
    ///
    /// `derivative_window` is the number of past errors kept; a window of one
    /// never produces a derivative.
    pub fn new(gains: ControllerGains<T>, integral_limit: T, derivative_window: usize) -> Self {
        let derivative_window = derivative_window.max(1);
        let mut pid = PidController::new();
        pid.compute_fn(compute_angle)
            .kp(gains.kp)
            .ki(gains.ki)
            .kd(gains.kd);

        AnglePid {
            pid,
            gains,
            error_history: VecDeque::with_capacity(derivative_window.min(HISTORY_PREALLOCATION)),
            derivative_window,
            integral_limit,
        }
    }

    /// The gains in use.
    pub fn gains(&self) -> ControllerGains<T> {
        self.gains
    }

    /// The clamped integral accumulator.
    pub fn integral(&self) -> T {
        self.pid.integral
    }

    /// The integral saturation limit.
    pub fn integral_limit(&self) -> T {
        self.integral_limit
    }

    /// Past errors, oldest first.
    pub fn error_history(&self) -> impl Iterator<Item = &T> + '_ {
        self.error_history.iter()
    }

    /// Clears the integral and the error history.
    pub fn reset(&mut self) {
        self.pid.integral = T::zero();
        self.pid.error = T::zero();
        self.error_history.clear();
    }

    /// Computes the control force driving `measurement` toward `set_point`.
    ///
    /// `dt` must be non-zero.
    pub fn step(&mut self, set_point: T, measurement: T, dt: T) -> PidTerms<T> {
        self.pid.set_point(set_point);

        let previous_error = if self.derivative_window > 1 {
            self.error_history.back().copied()
        } else {
            None
        };
        let data = AngleControlData {
            measurement,
            previous_error,
            dt,
            integral_limit: self.integral_limit,
        };
        let force = self.pid.compute(data);

        let error = self.pid.error;
        let integral = self.pid.integral;
        self.error_history.push_back(error);
        while self.error_history.len() > self.derivative_window {
            self.error_history.pop_front();
        }

        let derivative = match previous_error {
            Some(previous) => (error - previous) / dt,
            None => T::zero(),
        };

        PidTerms {
            force,
            proportional: self.gains.kp * error,
            integral_term: self.gains.ki * integral,
            derivative_term: self.gains.kd * derivative,
            error,
            integral,
            derivative,
        }
    }
}
