// src/simulation/recorder.rs

//! Append-only record of the control signals of a run.

/// One recorded tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Simulated time at the start of the tick.
    pub time: f64,
    /// Angle reached at the end of the tick, in degrees.
    pub angle: f64,
    /// Control force applied during the tick.
    pub force: f64,
    /// Proportional contribution.
    pub proportional: f64,
    /// Integral contribution.
    pub integral: f64,
    /// Derivative contribution.
    pub derivative: f64,
}

/// Parallel time series of a run. Index `i` of every series refers to the
/// same tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    time: Vec<f64>,
    angle: Vec<f64>,
    force: Vec<f64>,
    proportional: Vec<f64>,
    integral: Vec<f64>,
    derivative: Vec<f64>,
}

/// The four aligned series a plot of the run shows: angle, P, I and D against time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotSeries<'a> {
    /// Time axis shared by every series.
    pub time: &'a [f64],
    /// Angle in degrees.
    pub angle: &'a [f64],
    /// Proportional contribution.
    pub proportional: &'a [f64],
    /// Integral contribution.
    pub integral: &'a [f64],
    /// Derivative contribution.
    pub derivative: &'a [f64],
}

impl TimeSeries {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one tick.
    pub fn push(&mut self, sample: Sample) {
        self.time.push(sample.time);
        self.angle.push(sample.angle);
        self.force.push(sample.force);
        self.proportional.push(sample.proportional);
        self.integral.push(sample.integral);
        self.derivative.push(sample.derivative);
    }

    /// Number of recorded ticks.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Drops every recorded tick.
    pub fn clear(&mut self) {
        self.time.clear();
        self.angle.clear();
        self.force.clear();
        self.proportional.clear();
        self.integral.clear();
        self.derivative.clear();
    }

    /// Tick start times.
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Angles reached.
    pub fn angle(&self) -> &[f64] {
        &self.angle
    }

    /// Control forces.
    pub fn force(&self) -> &[f64] {
        &self.force
    }

    /// Proportional contributions.
    pub fn proportional(&self) -> &[f64] {
        &self.proportional
    }

    /// Integral contributions.
    pub fn integral(&self) -> &[f64] {
        &self.integral
    }

    /// Derivative contributions.
    pub fn derivative(&self) -> &[f64] {
        &self.derivative
    }

    /// The recorded tick at `index`.
    pub fn get(&self, index: usize) -> Option<Sample> {
        Some(Sample {
            time: *self.time.get(index)?,
            angle: self.angle[index],
            force: self.force[index],
            proportional: self.proportional[index],
            integral: self.integral[index],
            derivative: self.derivative[index],
        })
    }

    /// The most recent tick.
    pub fn last(&self) -> Option<Sample> {
        self.len().checked_sub(1).and_then(|index| self.get(index))
    }

    /// Recorded ticks in order.
    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        (0..self.len()).filter_map(move |index| self.get(index))
    }

    /// The series handed to a plotting collaborator.
    pub fn plot_series(&self) -> PlotSeries<'_> {
        PlotSeries {
            time: &self.time,
            angle: &self.angle,
            proportional: &self.proportional,
            integral: &self.integral,
            derivative: &self.derivative,
        }
    }
}
