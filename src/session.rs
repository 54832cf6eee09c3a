// src/session.rs

//! # Run Session
//!
//! A [`Simulator`] owns one run at a time and moves it through
//! `Idle -> Running -> (Stable | Stopped) -> Idle`.
//!
//! - `start` calibrates (unless disabled) and builds a fresh stepper.
//! - `step` performs one scheduled tick. It checks the running state and the
//!   [`StopHandle`] before doing anything, so a stop requested between two
//!   ticks is honored on the next one and a tick that has begun always
//!   completes.
//! - `stop` halts ticking and hands the recorded series to the observer.
//! - `reset` stops first, then restores the configured defaults and drops the
//!   recorded series.
//!
//! Cadence belongs to a [`Scheduler`]; the simulator never sleeps on its own.
//! Everything runs on the caller's thread. Only the stop flag is shared, so
//! that an external event source such as a signal handler can raise it.

use crate::calibration::CalibrationEngine;
use crate::config::SimulationConfig;
use crate::error::SimulationError;
use crate::model::PhysicalParameters;
use crate::pid::{AnglePid, ControllerGains};
use crate::simulation::{
    SimulationClock, SimulationState, SimulationStepper, StabilityMonitor, TickOutcome,
    TickReport, TimeSeries,
};
use spin_sleep::SpinSleeper;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run in progress.
    Idle,
    /// Ticks are being scheduled.
    Running,
    /// The run settled inside the stability band.
    Stable,
    /// The run was halted before settling.
    Stopped,
}

impl RunState {
    /// Lower case name for messages.
    pub fn name(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Stable => "stable",
            RunState::Stopped => "stopped",
        }
    }
}

/// Why a run stopped ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The stability monitor declared convergence.
    Converged,
    /// A stop command or the stop handle halted the run.
    Requested,
    /// The tick budget given to [`Simulator::run`] ran out.
    TickBudget,
    /// A tick failed.
    Fault,
}

/// Cooperative cancellation flag shared with external event sources.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
}

impl StopHandle {
    /// Creates a lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the run to stop at its next tick.
    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }
}

/// Decides how long to wait between two ticks.
pub trait Scheduler {
    /// Waits before the next tick. `period` is the simulated step size.
    fn wait(&mut self, period: Duration);
}

/// Runs ticks back to back.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl Scheduler for Immediate {
    fn wait(&mut self, _period: Duration) {}
}

/// Paces ticks against the wall clock.
#[derive(Debug, Clone)]
pub struct RealTime {
    sleeper: SpinSleeper,
    time_scale: f64,
}

impl RealTime {
    /// Paces one simulated second as `time_scale` wall clock seconds.
    /// Non-positive or non-finite scales fall back to real time.
    pub fn new(time_scale: f64) -> Self {
        let time_scale = if time_scale.is_finite() && time_scale > 0.0 {
            time_scale
        } else {
            1.0
        };
        Self {
            sleeper: SpinSleeper::default(),
            time_scale,
        }
    }
}

impl Default for RealTime {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RealTime {
    /// Wall clock time for one simulated `period`, or `None` when it does not
    /// fit in a [`Duration`].
    pub fn scaled(&self, period: Duration) -> Option<Duration> {
        Duration::try_from_secs_f64(period.as_secs_f64() * self.time_scale).ok()
    }
}

impl Scheduler for RealTime {
    fn wait(&mut self, period: Duration) {
        match self.scaled(period) {
            Some(pause) => self.sleeper.sleep(pause),
            None => warn!(
                ?period,
                time_scale = self.time_scale,
                "scaled period out of range, not pacing"
            ),
        }
    }
}

/// What a renderer needs to draw the arm after a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    /// Elapsed simulated time.
    pub time: f64,
    /// Current angle in degrees.
    pub angle: f64,
    /// Horizontal pivot position on screen.
    pub x_position: f64,
    /// Contiguous time inside the stability band.
    pub stable_time: f64,
}

/// Receives the outputs of a run.
pub trait RunObserver {
    /// Called after every completed tick.
    fn on_tick(&mut self, _snapshot: &Snapshot) {}

    /// Called once when the run stops, with everything it recorded.
    fn on_stop(&mut self, _series: &TimeSeries, _reason: StopReason) {}
}

impl RunObserver for () {}

/// Outcome of [`Simulator::run`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Why the run ended.
    pub reason: StopReason,
    /// Completed ticks.
    pub ticks: u64,
    /// State after the last tick.
    pub state: SimulationState,
    /// Gains the run used.
    pub gains: ControllerGains<f64>,
}

/// Owns the configuration and the run in progress.
pub struct Simulator {
    config: SimulationConfig,
    params: PhysicalParameters,
    initial_angle: f64,
    gains: ControllerGains<f64>,
    state: RunState,
    stepper: Option<SimulationStepper>,
    stop: StopHandle,
    stop_reason: Option<StopReason>,
}

impl Simulator {
    /// Creates an idle simulator. The configuration is validated here.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        Ok(Simulator {
            params: config.parameters(),
            initial_angle: config.initial.angle,
            gains: config.control.default_gains(),
            config,
            state: RunState::Idle,
            stepper: None,
            stop: StopHandle::new(),
            stop_reason: None,
        })
    }

    /// The configuration the simulator restores on reset.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Why the last run stopped, if it has.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Gains of the current or most recent run.
    pub fn gains(&self) -> ControllerGains<f64> {
        self.gains
    }

    /// Physical parameters the next run will use.
    pub fn parameters(&self) -> PhysicalParameters {
        self.params
    }

    /// A handle that stops the run from outside the tick loop.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Replaces the physical parameters for the next run.
    pub fn set_parameters(&mut self, params: PhysicalParameters) -> Result<(), SimulationError> {
        self.require_not_running("change parameters")?;
        params.validate()?;
        self.params = params;
        Ok(())
    }

    /// Replaces the initial angle for the next run.
    pub fn set_initial_angle(&mut self, angle: f64) -> Result<(), SimulationError> {
        self.require_not_running("change the initial angle")?;
        if !angle.is_finite() {
            return Err(SimulationError::Config(format!(
                "initial angle must be finite, got {}",
                angle
            )));
        }
        self.initial_angle = angle;
        Ok(())
    }

    /// State of the current or most recent run.
    pub fn simulation_state(&self) -> Option<SimulationState> {
        self.stepper.as_ref().map(SimulationStepper::state)
    }

    /// Render data of the current or most recent run.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.simulation_state().map(|state| self.snapshot_of(state))
    }

    /// Signals recorded by the current or most recent run.
    pub fn series(&self) -> Option<&TimeSeries> {
        self.stepper.as_ref().map(SimulationStepper::series)
    }

    /// Calibrates and enters `Running`.
    ///
    /// Starting while already running is ignored. A finished run has to be
    /// reset before the next start. Calibration runs to completion; a stop
    /// requested meanwhile is discarded.
    pub fn start(&mut self) -> Result<ControllerGains<f64>, SimulationError> {
        match self.state {
            RunState::Idle => {}
            RunState::Running => {
                warn!("start ignored, simulation already running");
                return Ok(self.gains);
            }
            finished => {
                return Err(SimulationError::InvalidTransition {
                    command: "start",
                    state: finished.name(),
                })
            }
        }

        self.params.validate()?;
        let gains = if self.config.calibration.enabled {
            CalibrationEngine::from_config(&self.config).calibrate(&self.params)?
        } else {
            self.config.control.default_gains()
        };

        let control = &self.config.control;
        let stepper = SimulationStepper::new(
            self.params,
            AnglePid::new(gains, control.integral_limit, control.derivative_window),
            SimulationClock::new(control.dt)?,
            StabilityMonitor::new(self.config.stability),
            control.set_point,
            self.initial_angle,
        )?;

        info!(
            mass = self.params.mass,
            height = self.params.height,
            length = self.params.length,
            inertia = self.params.moment_of_inertia(),
            inertia_x = self.config.body.inertia_x,
            angle = stepper.state().angle,
            kp = gains.kp,
            ki = gains.ki,
            kd = gains.kd,
            "simulation started"
        );

        self.gains = gains;
        self.stepper = Some(stepper);
        self.stop_reason = None;
        self.stop.clear();
        self.state = RunState::Running;
        Ok(gains)
    }

    /// Performs one scheduled tick.
    ///
    /// Returns `None` without touching the run when it is not running or a
    /// stop has been requested; in the latter case the run is stopped here.
    pub fn step(
        &mut self,
        observer: &mut impl RunObserver,
    ) -> Result<Option<TickReport>, SimulationError> {
        if self.state != RunState::Running {
            return Ok(None);
        }
        if self.stop.is_stop_requested() {
            self.halt(StopReason::Requested, observer);
            return Ok(None);
        }
        let Some(stepper) = self.stepper.as_mut() else {
            return Ok(None);
        };

        let report = match stepper.tick() {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "tick failed");
                self.halt(StopReason::Fault, observer);
                return Err(err);
            }
        };

        observer.on_tick(&self.snapshot_of(report.state));
        if report.outcome == TickOutcome::Converged {
            self.halt(StopReason::Converged, observer);
        }
        Ok(Some(report))
    }

    /// Halts a running simulation and hands the recorded series to `observer`.
    pub fn stop(&mut self, observer: &mut impl RunObserver) {
        if self.state == RunState::Running {
            self.halt(StopReason::Requested, observer);
        } else {
            warn!(state = self.state.name(), "stop ignored, simulation not running");
        }
    }

    /// Returns to `Idle` with the configured defaults and no recorded data.
    ///
    /// A running simulation is stopped first.
    pub fn reset(&mut self, observer: &mut impl RunObserver) {
        if self.state == RunState::Running {
            self.halt(StopReason::Requested, observer);
        }

        self.stepper = None;
        self.params = self.config.parameters();
        self.initial_angle = self.config.initial.angle;
        self.gains = self.config.control.default_gains();
        self.stop_reason = None;
        self.stop.clear();
        self.state = RunState::Idle;
        info!("simulation reset");
    }

    /// Starts if idle, then ticks through `scheduler` until the run settles,
    /// is stopped, or `max_ticks` ticks have completed.
    pub fn run(
        &mut self,
        scheduler: &mut impl Scheduler,
        observer: &mut impl RunObserver,
        max_ticks: Option<u64>,
    ) -> Result<RunSummary, SimulationError> {
        if self.state == RunState::Idle {
            self.start()?;
        }
        if self.state != RunState::Running {
            return Err(SimulationError::InvalidTransition {
                command: "run",
                state: self.state.name(),
            });
        }

        let period = Duration::from_secs_f64(self.config.control.dt);
        let mut ticks = 0;
        while self.state == RunState::Running {
            if max_ticks.is_some_and(|max| ticks >= max) {
                self.halt(StopReason::TickBudget, observer);
                break;
            }
            if self.step(observer)?.is_none() {
                break;
            }
            ticks += 1;
            if self.state == RunState::Running {
                scheduler.wait(period);
            }
        }

        let state = self
            .simulation_state()
            .ok_or(SimulationError::InvalidTransition {
                command: "run",
                state: self.state.name(),
            })?;
        Ok(RunSummary {
            reason: self.stop_reason.unwrap_or(StopReason::Requested),
            ticks,
            state,
            gains: self.gains,
        })
    }

    fn halt(&mut self, reason: StopReason, observer: &mut impl RunObserver) {
        self.state = match reason {
            StopReason::Converged => RunState::Stable,
            _ => RunState::Stopped,
        };
        self.stop_reason = Some(reason);
        self.stop.request_stop();

        if let Some(stepper) = self.stepper.as_ref() {
            let state = stepper.state();
            info!(
                ?reason,
                time = state.time,
                angle = state.angle,
                samples = stepper.series().len(),
                "simulation stopped"
            );
            observer.on_stop(stepper.series(), reason);
        }
    }

    fn snapshot_of(&self, state: SimulationState) -> Snapshot {
        Snapshot {
            time: state.time,
            angle: state.angle,
            x_position: self.config.initial.x_position,
            stable_time: state.stable_time,
        }
    }

    fn require_not_running(&self, command: &'static str) -> Result<(), SimulationError> {
        if self.state == RunState::Running {
            return Err(SimulationError::InvalidTransition {
                command,
                state: self.state.name(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        ticks: Vec<Snapshot>,
        stops: Vec<(usize, StopReason)>,
    }

    impl RunObserver for Recorder {
        fn on_tick(&mut self, snapshot: &Snapshot) {
            self.ticks.push(*snapshot);
        }

        fn on_stop(&mut self, series: &TimeSeries, reason: StopReason) {
            self.stops.push((series.len(), reason));
        }
    }

    struct CountingScheduler {
        waits: Vec<Duration>,
    }

    impl Scheduler for CountingScheduler {
        fn wait(&mut self, period: Duration) {
            self.waits.push(period);
        }
    }

    fn simulator() -> Simulator {
        Simulator::new(SimulationConfig::default()).unwrap()
    }

    /// A fresh simulator is idle with the configured defaults.
    #[test]
    fn test_new_is_idle() {
        let sim = simulator();
        assert_eq!(RunState::Idle, sim.state());
        assert_eq!(PhysicalParameters::default(), sim.parameters());
        assert!(sim.series().is_none());
    }

    /// Start calibrates and enters Running.
    #[test]
    fn test_start_calibrates() {
        let mut sim = simulator();
        let gains = sim.start().unwrap();
        assert_eq!(ControllerGains::new(0.1, 0.0, 0.0), gains);
        assert_eq!(RunState::Running, sim.state());
        assert_eq!(Some(0), sim.series().map(TimeSeries::len));
    }

    /// With calibration disabled the configured gains are used.
    #[test]
    fn test_start_without_calibration() {
        let mut config = SimulationConfig::default();
        config.calibration.enabled = false;
        let mut sim = Simulator::new(config).unwrap();
        assert_eq!(ControllerGains::new(1.0, 0.1, 0.05), sim.start().unwrap());
    }

    /// Invalid parameters keep the simulator idle.
    #[test]
    fn test_start_rejects_invalid_parameters() {
        let mut config = SimulationConfig::default();
        config.body.height = 0.0;
        assert!(Simulator::new(config).is_err());

        let mut sim = simulator();
        assert!(sim
            .set_parameters(PhysicalParameters {
                mass: -0.2,
                ..Default::default()
            })
            .is_err());
        assert_eq!(PhysicalParameters::default(), sim.parameters());
    }

    /// The default run converges after 50 ticks and reports the series once.
    #[test]
    fn test_run_converges() {
        let mut sim = simulator();
        let mut observer = Recorder::default();
        let mut scheduler = CountingScheduler { waits: Vec::new() };

        let summary = sim.run(&mut scheduler, &mut observer, None).unwrap();

        assert_eq!(StopReason::Converged, summary.reason);
        assert_eq!(50, summary.ticks);
        assert_eq!(5.0, summary.state.time);
        assert_eq!(RunState::Stable, sim.state());
        assert_eq!(50, observer.ticks.len());
        assert!(observer.ticks.iter().all(|snapshot| snapshot.angle == 90.0));
        assert!(observer.ticks.iter().all(|snapshot| snapshot.x_position == 760.0));
        assert_eq!(vec![(50, StopReason::Converged)], observer.stops);
        assert_eq!(49, scheduler.waits.len());
        assert!(scheduler.waits.iter().all(|wait| *wait == Duration::from_millis(100)));
    }

    /// A stop requested through the handle is honored on the next tick.
    #[test]
    fn test_stop_handle_between_ticks() {
        let mut sim = simulator();
        let mut observer = Recorder::default();
        sim.start().unwrap();
        assert!(sim.step(&mut observer).unwrap().is_some());

        sim.stop_handle().request_stop();
        assert!(sim.step(&mut observer).unwrap().is_none());
        assert_eq!(RunState::Stopped, sim.state());
        assert_eq!(Some(StopReason::Requested), sim.stop_reason());
        assert_eq!(vec![(1, StopReason::Requested)], observer.stops);
        assert_eq!(Some(1), sim.series().map(TimeSeries::len));
    }

    /// A stop requested during calibration does not cancel the start.
    #[test]
    fn test_stop_before_start_is_discarded() {
        let mut sim = simulator();
        sim.stop_handle().request_stop();
        sim.start().unwrap();
        assert!(sim.step(&mut ()).unwrap().is_some());
    }

    /// Stop hands over the series and ticks become no-ops.
    #[test]
    fn test_stop_command() {
        let mut sim = simulator();
        let mut observer = Recorder::default();
        sim.start().unwrap();
        for _ in 0..3 {
            sim.step(&mut observer).unwrap();
        }
        sim.stop(&mut observer);
        assert_eq!(RunState::Stopped, sim.state());
        assert_eq!(vec![(3, StopReason::Requested)], observer.stops);
        assert!(sim.step(&mut observer).unwrap().is_none());

        sim.stop(&mut observer);
        assert_eq!(1, observer.stops.len());
    }

    /// A finished run must be reset before it can start again.
    #[test]
    fn test_restart_requires_reset() {
        let mut sim = simulator();
        sim.start().unwrap();
        sim.stop(&mut ());
        assert!(matches!(
            sim.start(),
            Err(SimulationError::InvalidTransition { command: "start", state: "stopped" })
        ));

        sim.reset(&mut ());
        assert_eq!(RunState::Idle, sim.state());
        assert!(sim.start().is_ok());
    }

    /// Reset stops a running simulation first, then clears everything.
    #[test]
    fn test_reset_while_running() {
        let mut sim = simulator();
        let mut observer = Recorder::default();
        sim.set_initial_angle(80.0).unwrap();
        sim.start().unwrap();
        sim.step(&mut observer).unwrap();

        sim.reset(&mut observer);
        assert_eq!(vec![(1, StopReason::Requested)], observer.stops);
        assert_eq!(RunState::Idle, sim.state());
        assert!(sim.series().is_none());
        assert!(!sim.stop_handle().is_stop_requested());

        sim.start().unwrap();
        assert_eq!(Some(90.0), sim.simulation_state().map(|state| state.angle));
    }

    /// Parameters cannot change under a running simulation.
    #[test]
    fn test_parameters_locked_while_running() {
        let mut sim = simulator();
        sim.start().unwrap();
        assert!(matches!(
            sim.set_parameters(PhysicalParameters::default()),
            Err(SimulationError::InvalidTransition { .. })
        ));
        assert!(sim.set_initial_angle(10.0).is_err());
    }

    /// The tick budget stops an unsettled run.
    #[test]
    fn test_tick_budget() {
        let mut sim = simulator();
        sim.set_initial_angle(0.0).unwrap();
        let mut observer = Recorder::default();
        let summary = sim.run(&mut Immediate, &mut observer, Some(10)).unwrap();
        assert_eq!(StopReason::TickBudget, summary.reason);
        assert_eq!(10, summary.ticks);
        assert_eq!(RunState::Stopped, sim.state());
        assert_eq!(vec![(10, StopReason::TickBudget)], observer.stops);
    }

    /// Starting twice is harmless.
    #[test]
    fn test_double_start_ignored() {
        let mut sim = simulator();
        let first = sim.start().unwrap();
        sim.step(&mut ()).unwrap();
        assert_eq!(first, sim.start().unwrap());
        assert_eq!(Some(1), sim.series().map(TimeSeries::len));
    }

    /// A tick that diverges ends the run as a fault.
    #[test]
    fn test_diverged_tick_is_fault() {
        let mut config = SimulationConfig::default();
        config.calibration.enabled = false;
        config.control.kp = 1e308;
        config.initial.angle = 0.0;
        let mut sim = Simulator::new(config).unwrap();
        let mut observer = Recorder::default();

        let result = sim.run(&mut Immediate, &mut observer, None);

        assert_eq!(Err(SimulationError::Diverged { time: 0.0 }), result);
        assert_eq!(RunState::Stopped, sim.state());
        assert_eq!(Some(StopReason::Fault), sim.stop_reason());
        assert_eq!(vec![(0, StopReason::Fault)], observer.stops);
        assert!(observer.ticks.is_empty());
        assert!(sim.step(&mut observer).unwrap().is_none());
    }

    /// A huge derivative window is accepted and runs like any other.
    #[test]
    fn test_huge_derivative_window() {
        let config =
            SimulationConfig::from_toml_str("[control]\nderivative_window = 9223372036854775807")
                .unwrap();
        let mut sim = Simulator::new(config).unwrap();
        assert_eq!(ControllerGains::new(0.1, 0.0, 0.0), sim.start().unwrap());
        assert!(sim.step(&mut ()).unwrap().is_some());
    }

    /// Pacing scales the period and skips waits that cannot be represented.
    #[test]
    fn test_real_time_scaling() {
        let half = RealTime::new(0.5);
        assert_eq!(
            Some(Duration::from_millis(50)),
            half.scaled(Duration::from_millis(100))
        );

        let mut huge = RealTime::new(1e30);
        assert_eq!(None, huge.scaled(Duration::from_millis(100)));
        huge.wait(Duration::from_millis(100));

        assert_eq!(
            Some(Duration::from_millis(100)),
            RealTime::new(-1.0).scaled(Duration::from_millis(100))
        );
    }
}
