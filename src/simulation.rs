//! Simulation driver: holds rotor commands piecewise constant over a time
//! grid and integrates the dynamics between grid points with `fast_ode`.

use std::path::Path;

use nalgebra::Vector4;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dynamics::{output, OutputMode, QuadcopterOde, State};
use crate::error::{ConfigError, ModelError, SimulationError};
use crate::frames::{crosses_gimbal_lock, is_near_gimbal_lock};
use crate::params::Params;
use crate::telemetry;

/// Pitch margin (rad) inside which the driver warns about gimbal lock.
const GIMBAL_LOCK_MARGIN: f64 = 1e-3;

/// Upper bound on the number of samples a uniform grid may hold.
pub const MAX_SAMPLES: usize = 10_000_000;

/// Rotor speed command as a function of time.
pub trait InputSignal {
    /// Commanded rotor speeds `[ω1, ω2, ω3, ω4]` (rad/s) at time `t`.
    fn rotor_speeds(&self, t: f64) -> Vector4<f64>;
}

impl<F> InputSignal for F
where
    F: Fn(f64) -> Vector4<f64>,
{
    fn rotor_speeds(&self, t: f64) -> Vector4<f64> {
        self(t)
    }
}

/// Same rotor speeds for the whole run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantInput(pub Vector4<f64>);

impl InputSignal for ConstantInput {
    fn rotor_speeds(&self, _t: f64) -> Vector4<f64> {
        self.0
    }
}

/// One switch of a [`StepSchedule`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Time from which `speeds` apply (s)
    pub time: f64,
    pub speeds: [f64; 4],
}

/// Piecewise-constant rotor command script.
///
/// Before the first step the `initial` speeds apply.
///
/// ```yaml
/// initial: [0.0, 0.0, 0.0, 0.0]
/// steps:
///   - time: 1.0
///     speeds: [606.0, 606.0, 606.0, 606.0]
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StepSchedule {
    pub initial: [f64; 4],
    pub steps: Vec<Step>,
}

impl StepSchedule {
    /// Builds a schedule, rejecting unordered or non-finite switch times.
    pub fn new(initial: [f64; 4], steps: Vec<Step>) -> Result<Self, ModelError> {
        let schedule = Self { initial, steps };
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let schedule: Self = serde_yaml::from_str(yaml)?;
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file_contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&file_contents)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.steps.iter().any(|s| !s.time.is_finite()) {
            return Err(ModelError::InvalidParameter(
                "schedule step times must be finite".to_string(),
            ));
        }
        if self.steps.windows(2).any(|w| w[1].time < w[0].time) {
            return Err(ModelError::InvalidParameter(
                "schedule steps must be ordered by time".to_string(),
            ));
        }
        Ok(())
    }
}

impl InputSignal for StepSchedule {
    fn rotor_speeds(&self, t: f64) -> Vector4<f64> {
        let speeds = self
            .steps
            .iter()
            .take_while(|s| s.time <= t)
            .last()
            .map_or(self.initial, |s| s.speeds);
        Vector4::from(speeds)
    }
}

/// Increasing sample times at which the trajectory is reported.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeGrid {
    times: Vec<f64>,
}

impl TimeGrid {
    /// Evenly spaced samples from `start` to `end` inclusive (the last sample
    /// lands on `end` when the span is a whole number of steps).
    ///
    /// Fails when the span holds less than one step or more than
    /// [`MAX_SAMPLES`] of them.
    pub fn uniform(start: f64, end: f64, step: f64) -> Result<Self, SimulationError> {
        if !(start.is_finite() && end.is_finite() && step.is_finite()) {
            return Err(SimulationError::InvalidTimeGrid(
                "bounds and step must be finite".to_string(),
            ));
        }
        if step <= 0.0 {
            return Err(SimulationError::InvalidTimeGrid(format!(
                "step must be positive, got {step}"
            )));
        }
        if end <= start {
            return Err(SimulationError::InvalidTimeGrid(format!(
                "end ({end}) must be after start ({start})"
            )));
        }
        let intervals = ((end - start) / step + 1e-9).floor();
        if intervals < 1.0 {
            return Err(SimulationError::InvalidTimeGrid(format!(
                "step {step} is longer than the span [{start}, {end}]"
            )));
        }
        if intervals >= MAX_SAMPLES as f64 {
            return Err(SimulationError::InvalidTimeGrid(format!(
                "grid would need {intervals} intervals, limit is {MAX_SAMPLES}"
            )));
        }
        let intervals = intervals as usize;
        let times = (0..=intervals).map(|i| start + i as f64 * step).collect();
        Ok(Self { times })
    }

    /// Explicit sample times. At least two, strictly increasing.
    pub fn from_times(times: Vec<f64>) -> Result<Self, SimulationError> {
        if times.len() < 2 {
            return Err(SimulationError::InvalidTimeGrid(
                "need at least two sample times".to_string(),
            ));
        }
        if times.iter().any(|t| !t.is_finite()) || times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SimulationError::InvalidTimeGrid(
                "sample times must be finite and strictly increasing".to_string(),
            ));
        }
        Ok(Self { times })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn start(&self) -> f64 {
        self.times[0]
    }

    pub fn end(&self) -> f64 {
        self.times[self.times.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationOptions {
    /// Solver tolerance. The second solver bound is set ten times looser.
    pub tolerance: f64,
    pub output_mode: OutputMode,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            output_mode: OutputMode::States,
        }
    }
}

/// Samples of one simulation run. Index `k` of every vector refers to the same
/// sample time.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub states: Vec<State>,
    /// Commanded rotor speeds at each sample time, before clamping.
    pub inputs: Vec<Vector4<f64>>,
    /// Output vectors, laid out as [`Trajectory::labels`].
    pub outputs: Vec<Vec<f64>>,
    pub output_mode: OutputMode,
}

impl Trajectory {
    fn with_capacity(capacity: usize, output_mode: OutputMode) -> Self {
        Self {
            times: Vec::with_capacity(capacity),
            states: Vec::with_capacity(capacity),
            inputs: Vec::with_capacity(capacity),
            outputs: Vec::with_capacity(capacity),
            output_mode,
        }
    }

    fn push(&mut self, t: f64, state: State, input: Vector4<f64>, params: &Params) {
        self.outputs
            .push(output(t, &state, &input, params, self.output_mode));
        self.times.push(t);
        self.states.push(state);
        self.inputs.push(input);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn final_state(&self) -> Option<&State> {
        self.states.last()
    }

    pub fn labels(&self) -> &'static [&'static str] {
        telemetry::labels(self.output_mode)
    }

    /// One output signal over time, looked up by label (for example `"pos_z"`
    /// or `"thrust"`).
    pub fn column(&self, label: &str) -> Option<Vec<f64>> {
        let index = self.labels().iter().position(|l| *l == label)?;
        Some(self.outputs.iter().map(|row| row[index]).collect())
    }

    pub fn samples(&self) -> impl Iterator<Item = (f64, &State, &Vector4<f64>, &[f64])> + '_ {
        self.times
            .iter()
            .zip(&self.states)
            .zip(&self.inputs)
            .zip(&self.outputs)
            .map(|(((t, state), input), out)| (*t, state, input, out.as_slice()))
    }
}

/// Integrates the model across `grid`.
///
/// Over each interval `[t_k, t_k+1]` the rotor command sampled at `t_k` is
/// held constant and the interval is integrated with the adaptive solver.
/// The model is evaluated at trial states the solver never accepts; only
/// the states at grid points are recorded.
///
/// # Errors
///
/// [`SimulationError::IntegrationFailed`] as soon as the solver does not
/// reach the end of an interval. Samples up to that point are discarded.
pub fn simulate<I>(
    params: &Params,
    initial_state: &State,
    grid: &TimeGrid,
    input: &I,
    options: &SimulationOptions,
) -> Result<Trajectory, SimulationError>
where
    I: InputSignal + ?Sized,
{
    info!(
        start = grid.start(),
        end = grid.end(),
        samples = grid.len(),
        "starting simulation"
    );

    let mut warned = false;
    // Checks the sample and the interval leading to it.
    let mut check_attitude = |t: f64, previous_pitch: f64, state: &State| {
        let singular = is_near_gimbal_lock(state.pitch, GIMBAL_LOCK_MARGIN)
            || crosses_gimbal_lock(previous_pitch, state.pitch);
        if !warned && singular {
            warn!(t, pitch = state.pitch, "pitch at gimbal lock, Euler rates are singular");
            warned = true;
        }
    };

    let times = grid.times();
    let mut trajectory = Trajectory::with_capacity(times.len(), options.output_mode);
    let mut state = *initial_state;

    check_attitude(times[0], state.pitch, &state);
    trajectory.push(times[0], state, input.rotor_speeds(times[0]), params);

    for window in times.windows(2) {
        let (t0, t1) = (window[0], window[1]);
        let rotor_speeds = input.rotor_speeds(t0);
        let previous_pitch = state.pitch;
        state = integrate_interval(params, &state, rotor_speeds, (t0, t1), options.tolerance)?;

        check_attitude(t1, previous_pitch, &state);
        trajectory.push(t1, state, input.rotor_speeds(t1), params);
    }

    if let Some(last) = trajectory.final_state() {
        debug!(
            x = last.position_x,
            y = last.position_y,
            z = last.position_z,
            "simulation finished"
        );
    }
    Ok(trajectory)
}

/// Integrates from `time_span.0` to `time_span.1` under constant rotor speeds
/// and returns only the final state.
pub fn simulate_final(
    params: &Params,
    initial_state: &State,
    rotor_speeds: Vector4<f64>,
    time_span: (f64, f64),
    tolerance: f64,
) -> Result<State, SimulationError> {
    integrate_interval(params, initial_state, rotor_speeds, time_span, tolerance)
}

fn integrate_interval(
    params: &Params,
    initial_state: &State,
    rotor_speeds: Vector4<f64>,
    time_span: (f64, f64),
    tolerance: f64,
) -> Result<State, SimulationError> {
    let ode = QuadcopterOde {
        params,
        rotor_speeds,
    };

    let initial_coord = fast_ode::Coord(initial_state.to_array());

    let result = fast_ode::solve_ivp(
        &ode,
        time_span,
        initial_coord,
        |_, _| true,
        tolerance,
        tolerance * 10.0,
    );

    match result {
        fast_ode::IvpResult::FinalTimeReached(final_coord) => Ok(State::from_array(&final_coord.0)),
        _ => {
            warn!(
                t = time_span.0,
                pitch = initial_state.pitch,
                near_gimbal_lock = is_near_gimbal_lock(initial_state.pitch, GIMBAL_LOCK_MARGIN),
                "integration failed"
            );
            Err(SimulationError::IntegrationFailed { time: time_span.0 })
        }
    }
}
