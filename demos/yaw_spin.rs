use nalgebra::Vector3;
use quadsim::telemetry::write_csv;
use quadsim::{
    simulate, ConstantInput, OutputMode, Params, QuadcopterConfig, SimulationOptions, State,
    TimeGrid, Wrench,
};

// Hover thrust with a net yaw torque, instrumented trajectory printed as CSV
fn main() -> anyhow::Result<()> {
    let params = Params::new(&QuadcopterConfig::default())?;

    let wrench = Wrench::new(params.weight(), Vector3::new(0.0, 0.0, 0.005));
    let speeds = params.rotors().speeds(&wrench)?;
    println!("Rotor speeds (rad/s): {:?}", speeds.as_slice());

    let grid = TimeGrid::uniform(0.0, 3.0, 0.1)?;
    let options = SimulationOptions {
        output_mode: OutputMode::Instrumented,
        ..Default::default()
    };
    let trajectory = simulate(
        &params,
        &State::default(),
        &grid,
        &ConstantInput(speeds),
        &options,
    )?;

    write_csv(&trajectory, std::io::stdout())?;
    Ok(())
}
