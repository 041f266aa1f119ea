use nalgebra::{Vector3, Vector4};

use crate::frames::{body_to_inertial, euler_rates, gravity_in_body, skew};
use crate::params::Params;
use crate::rotors::Wrench;

/// Number of state components.
pub const STATE_DIM: usize = 12;

/// Width of the instrumented output: states, rotor speeds, thrust and torques.
pub const INSTRUMENTED_DIM: usize = STATE_DIM + 4 + 4;

/// Represents the complete state of a quadcopter in 3D space.
///
/// # Fields
///
/// * `position_x`, `position_y`, `position_z` - Position in the inertial frame (m), z up
/// * `velocity_x`, `velocity_y`, `velocity_z` - Velocity in the inertial frame (m/s)
/// * `roll`, `pitch`, `yaw` - 3-2-1 Euler angles φ, θ, ψ (rad). Pitch must stay
///   inside (-π/2, π/2); the attitude kinematics are singular at the boundary.
/// * `roll_rate`, `pitch_rate`, `yaw_rate` - Body-frame angular rates p, q, r (rad/s)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct State {
    pub position_x: f64,
    pub position_y: f64,
    pub position_z: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub velocity_z: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub roll_rate: f64,
    pub pitch_rate: f64,
    pub yaw_rate: f64,
}

impl State {
    /// Converts the state to the array layout used by the integrator:
    /// `[x, y, z, vx, vy, vz, φ, θ, ψ, p, q, r]`.
    pub fn to_array(&self) -> [f64; STATE_DIM] {
        [
            self.position_x,
            self.position_y,
            self.position_z,
            self.velocity_x,
            self.velocity_y,
            self.velocity_z,
            self.roll,
            self.pitch,
            self.yaw,
            self.roll_rate,
            self.pitch_rate,
            self.yaw_rate,
        ]
    }

    /// Inverse of [`State::to_array`].
    pub fn from_array(arr: &[f64; STATE_DIM]) -> Self {
        State {
            position_x: arr[0],
            position_y: arr[1],
            position_z: arr[2],
            velocity_x: arr[3],
            velocity_y: arr[4],
            velocity_z: arr[5],
            roll: arr[6],
            pitch: arr[7],
            yaw: arr[8],
            roll_rate: arr[9],
            pitch_rate: arr[10],
            yaw_rate: arr[11],
        }
    }

    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.position_x, self.position_y, self.position_z)
    }

    pub fn velocity(&self) -> Vector3<f64> {
        Vector3::new(self.velocity_x, self.velocity_y, self.velocity_z)
    }

    /// `[φ, θ, ψ]`
    pub fn attitude(&self) -> Vector3<f64> {
        Vector3::new(self.roll, self.pitch, self.yaw)
    }

    /// `[p, q, r]`
    pub fn body_rates(&self) -> Vector3<f64> {
        Vector3::new(self.roll_rate, self.pitch_rate, self.yaw_rate)
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|x| x.is_finite())
    }
}

/// What [`output`] reports alongside the state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// The 12 state components only.
    #[default]
    States,
    /// States followed by the four clamped rotor speeds, thrust and the three
    /// body torques.
    Instrumented,
}

impl OutputMode {
    pub fn width(&self) -> usize {
        match self {
            OutputMode::States => STATE_DIM,
            OutputMode::Instrumented => INSTRUMENTED_DIM,
        }
    }
}

/// State derivative under four rotor speeds (rad/s).
///
/// Rotor speeds are clamped to the configured range and mixed into a body
/// wrench, then handed to [`derivative_from_wrench`]. The model is
/// time-invariant; `_t` is accepted so the signature matches what an
/// integrator calls.
pub fn derivative(
    _t: f64,
    state: &State,
    rotor_speeds: &Vector4<f64>,
    params: &Params,
) -> [f64; STATE_DIM] {
    let wrench = params.rotors().forces(rotor_speeds);
    derivative_from_wrench(state, &wrench, params)
}

/// State derivative under an already-mixed body wrench.
///
/// 1. Position derivatives: ẋ = v
/// 2. Velocity derivatives: v̇ = R⋅([0, 0, T] + D(Rᵀv) + m⋅g_b)/m, with g_b the
///    gravity vector projected into the body frame
/// 3. Attitude derivatives: Euler angle kinematics
/// 4. Angular velocity derivatives: ω̇ = I⁻¹(τ - ω × Iω)
///
/// Near θ = ±π/2 the attitude rates become huge or non-finite. That is
/// propagated as-is rather than masked.
pub fn derivative_from_wrench(state: &State, wrench: &Wrench, params: &Params) -> [f64; STATE_DIM] {
    let phi = state.roll;
    let theta = state.pitch;
    let psi = state.yaw;

    let velocity = state.velocity();
    let omega = state.body_rates();

    let body_to_world = body_to_inertial(phi, theta, psi);

    // Quadratic drag, per body axis
    let velocity_body = body_to_world.transpose() * velocity;
    let drag_body = -params.drag_factor() * velocity_body.component_mul(&velocity_body.abs());

    let weight_body = params.mass() * gravity_in_body(phi, theta, psi, params.gravity());
    let force_body = Vector3::new(0.0, 0.0, wrench.thrust) + drag_body + weight_body;

    let acceleration = body_to_world * force_body / params.mass();
    let attitude_rate = euler_rates(phi, theta, psi) * omega;

    let inertia = params.inertia();
    let angular_acceleration =
        params.inertia_inverse() * (wrench.torque - skew(&omega) * (inertia * omega));

    [
        velocity.x,
        velocity.y,
        velocity.z,
        acceleration.x,
        acceleration.y,
        acceleration.z,
        attitude_rate.x,
        attitude_rate.y,
        attitude_rate.z,
        angular_acceleration.x,
        angular_acceleration.y,
        angular_acceleration.z,
    ]
}

/// Output map of the model.
///
/// Columns follow [`crate::telemetry::labels`] for the same `mode`.
pub fn output(
    _t: f64,
    state: &State,
    rotor_speeds: &Vector4<f64>,
    params: &Params,
    mode: OutputMode,
) -> Vec<f64> {
    let mut out = Vec::with_capacity(mode.width());
    out.extend_from_slice(&state.to_array());

    if mode == OutputMode::Instrumented {
        // Commanded speeds as given; the wrench reflects the clamped ones.
        out.extend(rotor_speeds.iter().copied());
        out.extend_from_slice(&params.rotors().forces(rotor_speeds).to_array());
    }
    out
}

/// Rotor-speed driven model in the form `fast_ode` integrates.
///
/// Rotor speeds are held constant over one integration call.
pub struct QuadcopterOde<'a> {
    pub params: &'a Params,
    pub rotor_speeds: Vector4<f64>,
}

impl fast_ode::DifferentialEquation<STATE_DIM> for QuadcopterOde<'_> {
    fn ode_dot_y(&self, t: f64, y: &fast_ode::Coord<STATE_DIM>) -> (fast_ode::Coord<STATE_DIM>, bool) {
        let state = State::from_array(&y.0);
        let dot_y = derivative(t, &state, &self.rotor_speeds, self.params);

        // Report non-finite derivatives so the solver can shrink its step or fail.
        let valid = dot_y.iter().all(|x| x.is_finite());
        (fast_ode::Coord(dot_y), valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::QuadcopterConfig;
    use approx::assert_relative_eq;
    use fast_ode::DifferentialEquation;
    use std::f64::consts::FRAC_PI_2;

    fn params() -> Params {
        Params::new(&QuadcopterConfig::default()).unwrap()
    }

    fn no_drag() -> Params {
        Params::new(&QuadcopterConfig {
            drag_coefficient: 0.0,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_free_fall_at_rest() {
        let params = params();
        let dot = derivative(0.0, &State::default(), &Vector4::zeros(), &params);

        assert_relative_eq!(dot[3], 0.0);
        assert_relative_eq!(dot[4], 0.0);
        assert_relative_eq!(dot[5], -params.gravity());
        for i in 9..12 {
            assert_relative_eq!(dot[i], 0.0);
        }
    }

    #[test]
    fn test_position_derivative_is_velocity() {
        let params = params();
        let state = State {
            velocity_x: 1.0,
            velocity_y: -2.0,
            velocity_z: 0.5,
            ..Default::default()
        };
        let dot = derivative(3.0, &state, &Vector4::zeros(), &params);
        assert_eq!(&dot[0..3], &[1.0, -2.0, 0.5]);
    }

    #[test]
    fn test_level_hover_is_equilibrium() {
        let params = params();
        let hover = params.hover_speeds().unwrap();
        let dot = derivative(0.0, &State::default(), &hover, &params);
        for value in dot.iter() {
            assert_relative_eq!(*value, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_pitch_tilts_acceleration_forward() {
        let params = no_drag();
        let thrust = params.weight();
        let wrench = Wrench::new(thrust, Vector3::zeros());

        for theta in [0.1, -0.1] {
            let state = State {
                pitch: theta,
                ..Default::default()
            };
            let dot = derivative_from_wrench(&state, &wrench, &params);
            assert_relative_eq!(dot[3], thrust / params.mass() * theta.sin(), epsilon = 1e-12);
            assert_eq!(dot[3].signum(), theta.signum());
            assert_relative_eq!(dot[4], 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_drag_opposes_motion() {
        let params = params();
        let state = State {
            velocity_x: 10.0,
            velocity_y: -5.0,
            ..Default::default()
        };
        let dot = derivative(0.0, &state, &Vector4::zeros(), &params);
        let k = params.drag_factor() / params.mass();
        assert_relative_eq!(dot[3], -k * 100.0, epsilon = 1e-12);
        assert_relative_eq!(dot[4], k * 25.0, epsilon = 1e-12);
    }

    #[test]
    fn test_yaw_torque_only_spins_yaw() {
        let params = params();
        let wrench = Wrench::new(params.weight(), Vector3::new(0.0, 0.0, 0.01));
        let dot = derivative_from_wrench(&State::default(), &wrench, &params);

        assert_relative_eq!(dot[11], 0.01 / params.inertia()[(2, 2)], epsilon = 1e-12);
        assert_relative_eq!(dot[9], 0.0);
        assert_relative_eq!(dot[10], 0.0);
        assert_relative_eq!(dot[5], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gyroscopic_coupling() {
        let params = params();
        let state = State {
            roll_rate: 1.0,
            yaw_rate: 2.0,
            ..Default::default()
        };
        let dot = derivative_from_wrench(&state, &Wrench::default(), &params);
        let i = params.inertia();
        // q̇ = (Izz - Ixx) r p / Iyy
        let expected = (i[(2, 2)] - i[(0, 0)]) * 2.0 * 1.0 / i[(1, 1)];
        assert_relative_eq!(dot[10], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_gimbal_lock_does_not_panic() {
        let params = params();
        let state = State {
            pitch: FRAC_PI_2,
            roll_rate: 0.1,
            yaw_rate: 0.2,
            ..Default::default()
        };
        let dot = derivative(0.0, &state, &Vector4::repeat(500.0), &params);
        // Translational and rotational dynamics are unaffected by the kinematic singularity.
        assert!(dot[0..6].iter().all(|x| x.is_finite()));
        assert!(dot[9..12].iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_output_widths() {
        let params = params();
        let state = State {
            position_z: 2.0,
            ..Default::default()
        };
        let speeds = Vector4::new(100.0, 2000.0, -3.0, 400.0);

        let basic = output(0.0, &state, &speeds, &params, OutputMode::States);
        assert_eq!(basic.len(), STATE_DIM);
        assert_eq!(basic[2], 2.0);

        let full = output(0.0, &state, &speeds, &params, OutputMode::Instrumented);
        assert_eq!(full.len(), INSTRUMENTED_DIM);
        assert_eq!(&full[12..16], &[100.0, 2000.0, -3.0, 400.0]);
        let saturated = params.rotors().forces(&Vector4::new(100.0, 1000.0, 0.0, 400.0));
        assert_relative_eq!(full[16], saturated.thrust);
        assert_relative_eq!(full[19], saturated.torque.z);
    }

    #[test]
    fn test_nan_rotor_command_propagates() {
        let params = params();
        let speeds = Vector4::new(f64::NAN, 600.0, 600.0, 600.0);
        let dot = derivative(0.0, &State::default(), &speeds, &params);
        assert!(dot[5].is_nan());
        assert!(!QuadcopterOde { params: &params, rotor_speeds: speeds }
            .ode_dot_y(0.0, &fast_ode::Coord([0.0; STATE_DIM]))
            .1);

        let full = output(0.0, &State::default(), &speeds, &params, OutputMode::Instrumented);
        assert!(full[12].is_nan());
        assert!(full[16].is_nan());
    }

    #[test]
    fn test_state_array_layout() {
        let arr = [1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.1, 0.2, 0.3, 0.0, 0.0, 0.0];
        let state = State::from_array(&arr);
        assert_eq!(state.position_x, 1.0);
        assert_eq!(state.yaw, 0.3);
        assert_eq!(state.to_array(), arr);
    }
}
