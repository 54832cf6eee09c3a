// tests/session_tests.rs

//! Run state machine driven from outside the crate.

use pivot_arm_stabilization::{
    PhysicalParameters, RunState, Scheduler, SimulationConfig, SimulationError, Simulator,
    StopReason,
};
use std::time::Duration;

/// Raises the stop flag after a fixed number of waits.
struct StopAfter {
    remaining: usize,
    handle: pivot_arm_stabilization::StopHandle,
}

impl Scheduler for StopAfter {
    fn wait(&mut self, _period: Duration) {
        if self.remaining == 0 {
            self.handle.request_stop();
        } else {
            self.remaining -= 1;
        }
    }
}

/// A stop raised between ticks leaves the tick that began complete.
#[test]
fn stop_handle_ends_run_between_ticks() {
    let mut config = SimulationConfig::default();
    config.initial.angle = 10.0;
    let mut simulator = Simulator::new(config).unwrap();
    let mut scheduler = StopAfter {
        remaining: 2,
        handle: simulator.stop_handle(),
    };

    let summary = simulator.run(&mut scheduler, &mut (), None).unwrap();

    assert_eq!(StopReason::Requested, summary.reason);
    assert_eq!(3, summary.ticks);
    assert_eq!(RunState::Stopped, simulator.state());
    assert_eq!(Some(3), simulator.series().map(|series| series.len()));
}

/// Start, stop, reset and start again.
#[test]
fn full_lifecycle() {
    let mut simulator = Simulator::new(SimulationConfig::default()).unwrap();
    assert_eq!(RunState::Idle, simulator.state());

    simulator.start().unwrap();
    assert_eq!(RunState::Running, simulator.state());
    simulator.step(&mut ()).unwrap();
    simulator.stop(&mut ());
    assert_eq!(RunState::Stopped, simulator.state());
    assert!(simulator.step(&mut ()).unwrap().is_none());

    assert!(matches!(
        simulator.start(),
        Err(SimulationError::InvalidTransition { .. })
    ));

    simulator.reset(&mut ());
    assert_eq!(RunState::Idle, simulator.state());
    assert!(simulator.series().is_none());

    simulator.start().unwrap();
    assert_eq!(Some(0), simulator.series().map(|series| series.len()));
}

/// New parameters take effect on the next start and are undone by reset.
#[test]
fn parameters_apply_between_runs() {
    let mut simulator = Simulator::new(SimulationConfig::default()).unwrap();
    let heavy = PhysicalParameters::new(1.0, 0.02, 0.01).unwrap();
    simulator.set_parameters(heavy).unwrap();
    simulator.set_initial_angle(45.0).unwrap();

    simulator.start().unwrap();
    assert_eq!(heavy, simulator.parameters());
    assert_eq!(Some(45.0), simulator.snapshot().map(|snapshot| snapshot.angle));
    assert!(simulator.set_parameters(PhysicalParameters::default()).is_err());

    simulator.reset(&mut ());
    assert_eq!(PhysicalParameters::default(), simulator.parameters());
}

/// A configuration that cannot produce a valid body is refused up front.
#[test]
fn invalid_configuration_refused() {
    let mut config = SimulationConfig::default();
    config.body.length = -0.005;
    assert!(Simulator::new(config).is_err());

    let mut config = SimulationConfig::default();
    config.control.dt = 0.0;
    assert!(matches!(
        Simulator::new(config),
        Err(SimulationError::Config(_))
    ));
}
