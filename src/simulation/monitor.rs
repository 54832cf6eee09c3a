// src/simulation/monitor.rs

//! Settling detection.

use serde::{Deserialize, Serialize};

// Summing a decimal step many times falls a few ulps short of the exact
// multiple; without slack 50 steps of 0.1 s would not reach 5 s.
const DWELL_TOLERANCE: f64 = 1e-9;

/// Tolerance band and dwell time that define a settled run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityWindow {
    /// Lower edge of the band in degrees, inclusive.
    pub band_low: f64,
    /// Upper edge of the band in degrees, inclusive.
    pub band_high: f64,
    /// Contiguous time inside the band, in seconds, needed to settle.
    pub dwell_time: f64,
}

impl Default for StabilityWindow {
    fn default() -> Self {
        Self {
            band_low: 85.0,
            band_high: 95.0,
            dwell_time: 5.0,
        }
    }
}

/// Tracks how long the angle has stayed inside the tolerance band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilityMonitor {
    window: StabilityWindow,
    stable_time: f64,
}

impl StabilityMonitor {
    /// Creates a monitor with no accumulated dwell.
    pub fn new(window: StabilityWindow) -> Self {
        Self {
            window,
            stable_time: 0.0,
        }
    }

    /// The band and dwell time in use.
    pub fn window(&self) -> StabilityWindow {
        self.window
    }

    /// Contiguous time spent inside the band so far.
    pub fn stable_time(&self) -> f64 {
        self.stable_time
    }

    /// Whether `angle` lies inside the band.
    pub fn in_band(&self, angle: f64) -> bool {
        self.window.band_low <= angle && angle <= self.window.band_high
    }

    /// Whether the dwell requirement is met.
    pub fn is_settled(&self) -> bool {
        self.stable_time + DWELL_TOLERANCE >= self.window.dwell_time
    }

    /// Folds in the angle reached after a step of `dt` and reports whether
    /// the run has settled.
    pub fn update(&mut self, angle: f64, dt: f64) -> bool {
        if self.in_band(angle) {
            self.stable_time += dt;
        } else {
            self.stable_time = 0.0;
        }
        self.is_settled()
    }

    /// Drops the accumulated dwell.
    pub fn reset(&mut self) {
        self.stable_time = 0.0;
    }
}
