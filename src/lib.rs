//! Nonlinear 6-DOF quadcopter flight dynamics.
//!
//! The model is a pure state-derivative function over a 12-component state
//! `[x, y, z, vx, vy, vz, φ, θ, ψ, p, q, r]` driven by four rotor speeds.
//! Conventions: right-handed z-up inertial frame, thrust along body +z,
//! gravity `[0, 0, -g]`, 3-2-1 Euler angles, SI units throughout.
//!
//! ```no_run
//! use quadsim::{simulate, ConstantInput, Params, QuadcopterConfig, SimulationOptions, State, TimeGrid};
//!
//! let params = Params::new(&QuadcopterConfig::default()).unwrap();
//! let hover = params.hover_speeds().unwrap();
//! let grid = TimeGrid::uniform(0.0, 5.0, 0.01).unwrap();
//! let trajectory = simulate(
//!     &params,
//!     &State::default(),
//!     &grid,
//!     &ConstantInput(hover),
//!     &SimulationOptions::default(),
//! )
//! .unwrap();
//! println!("{:?}", trajectory.final_state());
//! ```

pub mod dynamics;
pub mod error;
pub mod frames;
pub mod params;
pub mod rotors;
pub mod simulation;
pub mod telemetry;

pub use dynamics::{derivative, derivative_from_wrench, output, OutputMode, State};
pub use error::{ConfigError, ModelError, SimulationError};
pub use params::{Params, QuadcopterConfig};
pub use rotors::{NormalizedThrust, RotorLayout, RotorMap, Wrench};
pub use simulation::{
    simulate, simulate_final, ConstantInput, InputSignal, SimulationOptions, StepSchedule,
    TimeGrid, Trajectory,
};
