// src/pid/angle.rs

//! # Angle PID Control Module
//!
//! This module provides a compute function and control data structure
//! to perform angle-based PID (Proportional-Integral-Derivative) control
//! calculations with a clamped integral and a history-based derivative.

use crate::Number;
use piddiy::PidController;

/// Control data for the angle PID compute callback.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AngleControlData<T> {
    /// The current angle of the body.
    pub measurement: T,
    /// The error recorded on the previous step, if the derivative window
    /// holds one. `None` suppresses the derivative term.
    pub previous_error: Option<T>,
    /// The time delta since the last computation.
    pub dt: T,
    /// The maximum allowed magnitude of the integral, used to prevent integral windup.
    pub integral_limit: T,
}

/// Angle PID compute callback.
///
/// Returns `(error, integral, derivative)`. The integral is saturated to
/// `[-integral_limit, integral_limit]` and the derivative is zero until a
/// previous error is available.
pub fn compute_angle<T: Number>(
    pid: &mut PidController<T, AngleControlData<T>>,
    data: AngleControlData<T>,
) -> (T, T, T) {
    let error = pid.set_point - data.measurement;
    let integral =
        (pid.integral + error * data.dt).clamp(-data.integral_limit, data.integral_limit);
    let derivative = match data.previous_error {
        Some(previous) => (error - previous) / data.dt,
        None => T::zero(),
    };

    (error, integral, derivative)
}
