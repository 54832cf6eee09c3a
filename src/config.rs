// src/config.rs

//! # Simulation Configuration
//!
//! Every tunable of a run, grouped the way a TOML file lays them out:
//!
//! ```toml
//! [body]
//! mass = 0.2
//! height = 0.01
//! length = 0.005
//!
//! [initial]
//! angle = 90.0
//!
//! [control]
//! dt = 0.1
//! integral_limit = 10.0
//! derivative_window = 5
//!
//! [stability]
//! band_low = 85.0
//! band_high = 95.0
//! dwell_time = 5.0
//!
//! [calibration]
//! enabled = true
//! rollout_steps = 100
//! ```
//!
//! Missing sections and fields fall back to their defaults.

use crate::calibration::{GainAxis, GainGrid};
use crate::error::ConfigError;
use crate::model::PhysicalParameters;
use crate::pid::ControllerGains;
use crate::simulation::StabilityWindow;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Mass and geometry of the body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Mass in kilograms.
    pub mass: f64,
    /// Cross-section height in meters.
    pub height: f64,
    /// Length in meters.
    pub length: f64,
    /// Inertia about the x axis as entered by the user. Reported at run
    /// start only; the dynamics use the computed moment of inertia.
    pub inertia_x: f64,
}

impl Default for BodyConfig {
    fn default() -> Self {
        let params = PhysicalParameters::default();
        Self {
            mass: params.mass,
            height: params.height,
            length: params.length,
            inertia_x: 0.1,
        }
    }
}

impl BodyConfig {
    /// The physical parameters described by this section.
    pub fn parameters(&self) -> PhysicalParameters {
        PhysicalParameters {
            mass: self.mass,
            height: self.height,
            length: self.length,
        }
    }
}

/// Starting pose of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialConfig {
    /// Initial angle in degrees.
    pub angle: f64,
    /// Horizontal position of the pivot on screen. Only renderers use it.
    pub x_position: f64,
}

impl Default for InitialConfig {
    fn default() -> Self {
        Self {
            angle: 90.0,
            x_position: 760.0,
        }
    }
}

/// Controller and timing settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Fixed step size in seconds.
    pub dt: f64,
    /// Target angle in degrees.
    pub set_point: f64,
    /// Magnitude limit of the integral accumulator.
    pub integral_limit: f64,
    /// Number of past errors kept for the derivative.
    pub derivative_window: usize,
    /// Gravitational acceleration in m/s^2. The torque model does not use it.
    pub gravity: f64,
    /// Proportional gain used when calibration is disabled.
    pub kp: f64,
    /// Integral gain used when calibration is disabled.
    pub ki: f64,
    /// Derivative gain used when calibration is disabled.
    pub kd: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            dt: 0.1,
            set_point: 90.0,
            integral_limit: 10.0,
            derivative_window: 5,
            gravity: 9.81,
            kp: 1.0,
            ki: 0.1,
            kd: 0.05,
        }
    }
}

impl ControlConfig {
    /// Gains used when calibration is disabled.
    pub fn default_gains(&self) -> ControllerGains<f64> {
        ControllerGains::new(self.kp, self.ki, self.kd)
    }
}

/// Calibration settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Run the grid search on start. When off, the default gains are used.
    pub enabled: bool,
    /// Steps per rollout.
    pub rollout_steps: usize,
    /// Angle each rollout starts from, in degrees.
    pub rollout_start_angle: f64,
    /// Candidate gains.
    pub grid: GainGrid,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rollout_steps: 100,
            rollout_start_angle: 90.0,
            grid: GainGrid::default(),
        }
    }
}

/// Complete configuration of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Body section.
    pub body: BodyConfig,
    /// Initial pose section.
    pub initial: InitialConfig,
    /// Controller and timing section.
    pub control: ControlConfig,
    /// Settling criteria section.
    pub stability: StabilityWindow,
    /// Calibration section.
    pub calibration: CalibrationConfig,
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn require_finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, format!("must be finite, got {}", value)))
    }
}

fn validate_axis(field: &'static str, axis: &GainAxis) -> Result<(), ConfigError> {
    require_finite(field, axis.start)?;
    require_finite(field, axis.stop)?;
    if axis.steps == 0 {
        return Err(invalid(field, "needs at least one step"));
    }
    Ok(())
}

impl SimulationConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// The physical parameters of the body section.
    pub fn parameters(&self) -> PhysicalParameters {
        self.body.parameters()
    }

    /// Checks every value a run depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parameters()
            .validate()
            .map_err(|err| invalid("body", err.to_string()))?;
        require_finite("body.inertia_x", self.body.inertia_x)?;
        require_finite("initial.angle", self.initial.angle)?;
        require_finite("initial.x_position", self.initial.x_position)?;

        let control = &self.control;
        if !control.dt.is_finite() || control.dt <= 0.0 {
            return Err(invalid("control.dt", format!("must be > 0, got {}", control.dt)));
        }
        require_finite("control.set_point", control.set_point)?;
        if !control.integral_limit.is_finite() || control.integral_limit < 0.0 {
            return Err(invalid(
                "control.integral_limit",
                format!("must be >= 0, got {}", control.integral_limit),
            ));
        }
        if control.derivative_window == 0 {
            return Err(invalid("control.derivative_window", "must be at least 1"));
        }
        require_finite("control.gravity", control.gravity)?;
        require_finite("control.kp", control.kp)?;
        require_finite("control.ki", control.ki)?;
        require_finite("control.kd", control.kd)?;

        let stability = &self.stability;
        require_finite("stability.band_low", stability.band_low)?;
        require_finite("stability.band_high", stability.band_high)?;
        if stability.band_low > stability.band_high {
            return Err(invalid(
                "stability",
                format!(
                    "band_low {} is above band_high {}",
                    stability.band_low, stability.band_high
                ),
            ));
        }
        if !stability.dwell_time.is_finite() || stability.dwell_time < 0.0 {
            return Err(invalid(
                "stability.dwell_time",
                format!("must be >= 0, got {}", stability.dwell_time),
            ));
        }

        let calibration = &self.calibration;
        require_finite("calibration.rollout_start_angle", calibration.rollout_start_angle)?;
        validate_axis("calibration.grid.kp", &calibration.grid.kp)?;
        validate_axis("calibration.grid.ki", &calibration.grid.ki)?;
        validate_axis("calibration.grid.kd", &calibration.grid.kd)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// The defaults describe the reference setup.
    #[test]
    fn test_defaults() {
        let config = SimulationConfig::default();
        assert_eq!(PhysicalParameters::default(), config.parameters());
        assert_eq!(90.0, config.initial.angle);
        assert_eq!(760.0, config.initial.x_position);
        assert_eq!(0.1, config.control.dt);
        assert_eq!(10.0, config.control.integral_limit);
        assert_eq!(5, config.control.derivative_window);
        assert_eq!(9.81, config.control.gravity);
        assert_eq!(ControllerGains::new(1.0, 0.1, 0.05), config.control.default_gains());
        assert_eq!(StabilityWindow::default(), config.stability);
        assert!(config.calibration.enabled);
        assert_eq!(100, config.calibration.rollout_steps);
        assert!(config.validate().is_ok());
    }

    /// A partial document overrides only what it names.
    #[test]
    fn test_partial_toml() {
        let config = SimulationConfig::from_toml_str(
            r#"
            [body]
            mass = 0.5

            [control]
            dt = 0.05

            [calibration.grid.kp]
            start = 0.5
            stop = 2.0
            steps = 4
            "#,
        )
        .unwrap();
        assert_eq!(0.5, config.body.mass);
        assert_eq!(0.01, config.body.height);
        assert_eq!(0.05, config.control.dt);
        assert_eq!(GainAxis::new(0.5, 2.0, 4), config.calibration.grid.kp);
        assert_eq!(GainGrid::default().ki, config.calibration.grid.ki);
    }

    /// Serialized defaults parse back to the defaults.
    #[test]
    fn test_serialized_defaults_parse() {
        let text = toml::to_string(&SimulationConfig::default()).unwrap();
        let parsed = SimulationConfig::from_toml_str(&text).unwrap();
        assert_eq!(SimulationConfig::default(), parsed);
    }

    /// Out of range values are reported by field.
    #[test]
    fn test_validation_errors() {
        let mut config = SimulationConfig::default();
        config.control.dt = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "control.dt", .. })
        ));

        let mut config = SimulationConfig::default();
        config.control.derivative_window = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "control.derivative_window", .. })
        ));

        let mut config = SimulationConfig::default();
        config.stability.band_low = 100.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "stability", .. })
        ));

        let mut config = SimulationConfig::default();
        config.body.mass = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "body", .. })
        ));
    }

    /// Malformed documents surface as parse errors.
    #[test]
    fn test_parse_error() {
        assert!(matches!(
            SimulationConfig::from_toml_str("[body]\nmass = \"heavy\""),
            Err(ConfigError::Parse(_))
        ));
    }

    /// Files are read from disk.
    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[initial]\nangle = 45.0").unwrap();
        let config = SimulationConfig::from_file(file.path()).unwrap();
        assert_eq!(45.0, config.initial.angle);

        let missing = SimulationConfig::from_file("/nonexistent/pivot-arm.toml");
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
