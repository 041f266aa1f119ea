use quadsim::{simulate_final, Params, QuadcopterConfig, State};

// Hover with a small initial roll and no corrective input
fn main() {
    let initial_state = State {
        position_z: 1.0,
        roll: 0.1, // Small initial roll
        ..Default::default()
    };

    let params = match Params::new(&QuadcopterConfig::default()) {
        Ok(params) => params,
        Err(e) => {
            println!("Invalid parameters: {}", e);
            return;
        }
    };
    let hover = match params.hover_speeds() {
        Ok(speeds) => speeds,
        Err(e) => {
            println!("No hover trim: {}", e);
            return;
        }
    };

    match simulate_final(&params, &initial_state, hover, (0.0, 2.0), 1e-6) {
        Ok(final_state) => {
            println!("Final state:");
            println!(
                "Position: ({:.3}, {:.3}, {:.3})",
                final_state.position_x, final_state.position_y, final_state.position_z
            );
            println!(
                "Velocity: ({:.3}, {:.3}, {:.3})",
                final_state.velocity_x, final_state.velocity_y, final_state.velocity_z
            );
            println!(
                "Attitude: ({:.3}, {:.3}, {:.3})",
                final_state.roll, final_state.pitch, final_state.yaw
            );
            println!(
                "Rates: ({:.3}, {:.3}, {:.3})",
                final_state.roll_rate, final_state.pitch_rate, final_state.yaw_rate
            );
        }
        Err(e) => println!("Simulation failed: {}", e),
    }
}
