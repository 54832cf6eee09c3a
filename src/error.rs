// src/error.rs

//! Error types for configuration loading and simulation runs.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that prevent a run from starting or continuing.
///
/// Every variant is structural: the arithmetic is deterministic, so nothing
/// here is worth retrying with the same inputs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// A physical parameter is zero, negative or not finite.
    #[error("invalid physical parameter `{name}`: {value} (must be finite and > 0)")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// The moment of inertia evaluated to zero or a non-finite value.
    #[error("degenerate moment of inertia: {0}")]
    DegenerateInertia(f64),

    /// The fixed time step is zero, negative or not finite.
    #[error("invalid time step: {0} (must be finite and > 0)")]
    InvalidTimeStep(f64),

    /// The integrated angle stopped being a finite number.
    #[error("simulation diverged at t = {time} s")]
    Diverged {
        /// Simulated time of the tick that diverged.
        time: f64,
    },

    /// A command was issued in a state that does not accept it.
    #[error("cannot {command} while {state}")]
    InvalidTransition {
        /// The rejected command.
        command: &'static str,
        /// The run state at the time of the command.
        state: &'static str,
    },

    /// Every calibration candidate produced a non-finite score.
    #[error("calibration found no candidate with a finite score")]
    CalibrationFailed,

    /// The configuration failed validation.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while loading or validating a [`SimulationConfig`](crate::SimulationConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A configuration value is out of range.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Human readable reason.
        reason: String,
    },
}

impl From<ConfigError> for SimulationError {
    fn from(err: ConfigError) -> Self {
        SimulationError::Config(err.to_string())
    }
}
