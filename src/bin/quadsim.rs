//! quadsim - run scripted quadcopter simulations from the command line

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use nalgebra::{Vector3, Vector4};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quadsim::telemetry::write_csv_file;
use quadsim::{
    simulate, InputSignal, OutputMode, Params, QuadcopterConfig, SimulationOptions, State,
    StepSchedule, TimeGrid, Trajectory, Wrench,
};

#[derive(Parser, Debug)]
#[command(name = "quadsim")]
#[command(about = "Nonlinear 6-DOF quadcopter simulation under scripted rotor inputs")]
#[command(version)]
struct Args {
    /// Vehicle configuration (YAML). Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scripted experiment to run
    #[arg(short, long, value_enum, default_value = "hover")]
    scenario: Scenario,

    /// Rotor command schedule (YAML), required by the `schedule` scenario
    #[arg(long)]
    schedule: Option<PathBuf>,

    /// Simulated time (s)
    #[arg(long, default_value_t = 10.0)]
    duration: f64,

    /// Output sample interval (s)
    #[arg(long, default_value_t = 0.01)]
    dt: f64,

    #[arg(long, default_value_t = 1e-6)]
    tolerance: f64,

    /// Also record rotor speeds, thrust and torques
    #[arg(long)]
    instrumented: bool,

    /// Write the trajectory to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Initial pitch for the `pitch` scenario (rad)
    #[arg(long, default_value_t = 0.1)]
    pitch: f64,

    /// Yaw torque for the `yaw` scenario (N⋅m)
    #[arg(long, default_value_t = 0.005)]
    yaw_torque: f64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Scenario {
    /// Equal rotor speeds balancing the weight
    Hover,
    /// All rotors stopped
    FreeFall,
    /// Hover thrust with a net yaw torque
    Yaw,
    /// Hover thrust from a pitched initial attitude
    Pitch,
    /// Hover, then a 5 % rotor speed step at half time
    Step,
    /// Rotor speeds read from --schedule
    Schedule,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => QuadcopterConfig::from_file(path)
            .with_context(|| format!("loading vehicle config {}", path.display()))?,
        None => QuadcopterConfig::default(),
    };
    let params = Params::new(&config).context("invalid vehicle parameters")?;

    let (initial_state, input) = build_scenario(&args, &params)?;
    let grid = TimeGrid::uniform(0.0, args.duration, args.dt)?;
    let options = SimulationOptions {
        tolerance: args.tolerance,
        output_mode: if args.instrumented {
            OutputMode::Instrumented
        } else {
            OutputMode::States
        },
    };

    info!(scenario = ?args.scenario, mass = params.mass(), "running");
    let trajectory = simulate(&params, &initial_state, &grid, &*input, &options)?;

    print_summary(&trajectory);

    if let Some(path) = &args.output {
        write_csv_file(&trajectory, path)
            .with_context(|| format!("writing trajectory to {}", path.display()))?;
        info!(path = %path.display(), "trajectory saved");
    }
    Ok(())
}

fn build_scenario(args: &Args, params: &Params) -> Result<(State, Box<dyn InputSignal>)> {
    let hover = params.hover_speeds()?;
    let level = State::default();

    let scenario: (State, Box<dyn InputSignal>) = match args.scenario {
        Scenario::Hover => (level, Box::new(move |_t: f64| hover)),
        Scenario::FreeFall => (level, Box::new(|_t: f64| Vector4::<f64>::zeros())),
        Scenario::Yaw => {
            let wrench = Wrench::new(params.weight(), Vector3::new(0.0, 0.0, args.yaw_torque));
            let speeds = params
                .rotors()
                .speeds(&wrench)
                .context("yaw torque not reachable at hover thrust")?;
            (level, Box::new(move |_t: f64| speeds))
        }
        Scenario::Pitch => {
            if args.pitch.abs() >= std::f64::consts::FRAC_PI_2 {
                bail!("initial pitch must lie inside (-π/2, π/2)");
            }
            let pitched = State {
                pitch: args.pitch,
                ..Default::default()
            };
            (pitched, Box::new(move |_t: f64| hover))
        }
        Scenario::Step => {
            let switch_time = args.duration / 2.0;
            let boosted = hover * 1.05;
            (
                level,
                Box::new(move |t: f64| if t < switch_time { hover } else { boosted }),
            )
        }
        Scenario::Schedule => {
            let path = args
                .schedule
                .as_ref()
                .context("the schedule scenario needs --schedule <file>")?;
            let schedule = StepSchedule::from_file(path)
                .with_context(|| format!("loading schedule {}", path.display()))?;
            (level, Box::new(schedule))
        }
    };
    Ok(scenario)
}

fn print_summary(trajectory: &Trajectory) {
    let Some(final_state) = trajectory.final_state() else {
        return;
    };
    let t = trajectory.times.last().copied().unwrap_or_default();

    println!("Final state at t = {:.3} s:", t);
    println!(
        "Position: ({:.3}, {:.3}, {:.3}) m",
        final_state.position_x, final_state.position_y, final_state.position_z
    );
    println!(
        "Velocity: ({:.3}, {:.3}, {:.3}) m/s",
        final_state.velocity_x, final_state.velocity_y, final_state.velocity_z
    );
    println!(
        "Attitude: ({:.2}, {:.2}, {:.2}) deg",
        final_state.roll.to_degrees(),
        final_state.pitch.to_degrees(),
        final_state.yaw.to_degrees()
    );
    println!(
        "Rates: ({:.2}, {:.2}, {:.2}) deg/s",
        final_state.roll_rate.to_degrees(),
        final_state.pitch_rate.to_degrees(),
        final_state.yaw_rate.to_degrees()
    );
}
