// src/pid.rs

//! # PID Control Module
//!
//! This module provides the compute function, control data structure and
//! stateful controller used to hold the arm at its angular setpoint.

pub mod angle;
pub use angle::*;
pub mod controller;
pub use controller::*;
