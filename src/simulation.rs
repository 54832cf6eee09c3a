// src/simulation.rs

//! # Simulation Module
//!
//! The pieces of a single control period: a fixed-step clock, a stability
//! monitor that decides when the run has settled, an append-only recorder of
//! the control signals, and the stepper that ties them to the controller and
//! the rigid body model.

pub mod clock;
pub use clock::*;
pub mod monitor;
pub use monitor::*;
pub mod recorder;
pub use recorder::*;
pub mod stepper;
pub use stepper::*;
