// src/lib.rs

//! # Pivot Arm PID Stabilization
//!
//! This crate simulates a single-axis rigid body (an arm rotating about a
//! pivot) held at an angular setpoint by a PID controller. Before a live run
//! starts, a grid-search calibration scores candidate gain triples against a
//! short fixed-length rollout and hands the best triple to the controller.
//!
//! The crate is organized leaves first:
//!
//! - [`model`]: moment of inertia and angular acceleration of the body.
//! - [`pid`]: the angle PID controller with integral clamping and a windowed
//!   derivative, built on `piddiy`.
//! - [`simulation`]: clock, stability monitor, time series recorder and the
//!   stepper that advances one control period.
//! - [`calibration`]: the gain grid search.
//! - [`session`]: the run state machine, scheduler and observer seams.
//! - [`config`]: TOML-backed configuration.

#![deny(missing_docs)]

pub mod calibration;
pub mod config;
pub mod error;
pub mod model;
pub mod number;
pub mod pid;
pub mod session;
pub mod simulation;

#[doc(inline)]
pub use calibration::{calibrate, CalibrationEngine, CalibrationResult, GainAxis, GainGrid};
#[doc(inline)]
pub use config::SimulationConfig;
#[doc(inline)]
pub use error::{ConfigError, SimulationError};
#[doc(inline)]
pub use model::PhysicalParameters;
#[doc(inline)]
pub use number::Number;
#[doc(inline)]
pub use pid::{AnglePid, ControllerGains, PidTerms};
#[doc(inline)]
pub use session::{
    Immediate, RealTime, RunObserver, RunState, RunSummary, Scheduler, Simulator, Snapshot,
    StopHandle, StopReason,
};
#[doc(inline)]
pub use simulation::{SimulationState, SimulationStepper, TickOutcome, TickReport, TimeSeries};

#[cfg(test)]
mod test_utils;
