use nalgebra::{Matrix4, Vector3, Vector4};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Rotor arrangement around the body z-axis.
///
/// Rotors 1 and 3 spin counter-clockwise seen from above, rotors 2 and 4
/// clockwise. The reaction torque of each rotor on the airframe opposes its
/// spin.
///
/// # Plus layout
///
/// ```text
///            1 (+X)
///            |
///   (+Y) 2 --+-- 4
///            |
///            3
/// ```
///
/// # Cross layout
///
/// ```text
///   2 (CW)    1 (CCW)
///       \  +X  /
///        \    /
///   +Y     \/
///          /\
///        /    \
///   3 (CCW)    4 (CW)
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotorLayout {
    Plus,
    #[default]
    Cross,
}

/// Net thrust along body +z and torques about the body axes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Wrench {
    /// Collective thrust (N)
    pub thrust: f64,
    /// Body torques [τx, τy, τz] (N⋅m)
    pub torque: Vector3<f64>,
}

impl Wrench {
    pub fn new(thrust: f64, torque: Vector3<f64>) -> Self {
        Self { thrust, torque }
    }

    pub fn from_vector(v: &Vector4<f64>) -> Self {
        Self {
            thrust: v[0],
            torque: Vector3::new(v[1], v[2], v[3]),
        }
    }

    /// `[thrust, τx, τy, τz]`
    pub fn to_vector(&self) -> Vector4<f64> {
        Vector4::new(self.thrust, self.torque.x, self.torque.y, self.torque.z)
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.thrust, self.torque.x, self.torque.y, self.torque.z]
    }
}

/// Builds the map from squared rotor speeds `[ω1², ω2², ω3², ω4²]` to
/// `[thrust, τx, τy, τz]`.
///
/// # Arguments
///
/// * `kf` - Thrust coefficient, thrust = kf⋅ω² (N⋅s²)
/// * `kd` - Rotor drag (yaw) coefficient, reaction torque = kd⋅ω² (N⋅m⋅s²)
/// * `arm_length` - Distance from the centre of mass to each rotor hub (m)
/// * `layout` - Rotor arrangement, fixes the sign pattern
pub fn mixing_matrix(kf: f64, kd: f64, arm_length: f64, layout: RotorLayout) -> Matrix4<f64> {
    match layout {
        RotorLayout::Plus => {
            let lk = arm_length * kf;
            Matrix4::new(
                kf, kf, kf, kf, //
                0.0, lk, 0.0, -lk, //
                -lk, 0.0, lk, 0.0, //
                -kd, kd, -kd, kd,
            )
        }
        RotorLayout::Cross => {
            let lk = arm_length / 2.0_f64.sqrt() * kf;
            Matrix4::new(
                kf, kf, kf, kf, //
                -lk, lk, lk, -lk, //
                -lk, -lk, lk, lk, //
                -kd, kd, -kd, kd,
            )
        }
    }
}

/// Converts rotor speeds into the net body wrench.
///
/// Each speed is clamped to `[0, max_speed]` (or just to `[0, ∞)` when no
/// maximum is configured) before squaring.
pub fn rotor_speeds_to_forces(
    speeds: &Vector4<f64>,
    matrix: &Matrix4<f64>,
    max_speed: Option<f64>,
) -> Wrench {
    let squared = clamp_speeds(speeds, max_speed).map(|w| w * w);
    Wrench::from_vector(&(matrix * squared))
}

/// Recovers non-negative rotor speeds producing `wrench`.
///
/// # Errors
///
/// * [`ModelError::DegenerateGeometry`] if `matrix` is singular
/// * [`ModelError::InfeasibleWrench`] if a rotor would need a negative ω²
pub fn forces_to_rotor_speeds(
    wrench: &Wrench,
    matrix: &Matrix4<f64>,
) -> Result<Vector4<f64>, ModelError> {
    let inverse = invert(matrix)?;
    speeds_from_inverse(wrench, &inverse)
}

/// Clamps each rotor speed to the admissible range. NaN commands pass through
/// unchanged.
pub fn clamp_speeds(speeds: &Vector4<f64>, max_speed: Option<f64>) -> Vector4<f64> {
    let upper = max_speed.unwrap_or(f64::INFINITY);
    speeds.map(|w| clamp_speed(w, upper))
}

fn clamp_speed(omega: f64, upper: f64) -> f64 {
    if omega.is_nan() {
        omega
    } else {
        omega.max(0.0).min(upper)
    }
}

/// Thrust and drag torque of a single rotor.
///
/// `thrust = kf⋅ω²`, `torque = kd⋅ω²⋅arm_length`, with ω clamped to
/// `[0, max_speed]`.
pub fn single_rotor(omega: f64, kf: f64, kd: f64, arm_length: f64, max_speed: f64) -> (f64, f64) {
    let omega_squared = clamp_speed(omega, max_speed).powi(2);
    (kf * omega_squared, kd * omega_squared * arm_length)
}

/// Thrust source driven by a normalized command.
///
/// `thrust = u⋅max_thrust` and `moment = lever_arm⋅thrust`, with `u` clamped
/// to `[0, 1]`. NaN commands propagate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedThrust {
    max_thrust: f64,
    lever_arm: f64,
}

impl NormalizedThrust {
    /// # Errors
    ///
    /// [`ModelError::InvalidParameter`] unless `max_thrust` is positive and
    /// finite and `lever_arm` is finite.
    pub fn new(max_thrust: f64, lever_arm: f64) -> Result<Self, ModelError> {
        if !(max_thrust.is_finite() && max_thrust > 0.0) {
            return Err(ModelError::InvalidParameter(format!(
                "max_thrust must be positive and finite, got {max_thrust}"
            )));
        }
        if !lever_arm.is_finite() {
            return Err(ModelError::InvalidParameter(format!(
                "lever_arm must be finite, got {lever_arm}"
            )));
        }
        Ok(Self {
            max_thrust,
            lever_arm,
        })
    }

    pub fn max_thrust(&self) -> f64 {
        self.max_thrust
    }

    pub fn lever_arm(&self) -> f64 {
        self.lever_arm
    }

    /// Thrust and moment for `command`.
    pub fn output(&self, command: f64) -> (f64, f64) {
        let thrust = clamp_speed(command, 1.0) * self.max_thrust;
        (thrust, self.lever_arm * thrust)
    }
}

fn invert(matrix: &Matrix4<f64>) -> Result<Matrix4<f64>, ModelError> {
    match matrix.try_inverse() {
        Some(inverse) if inverse.iter().all(|x| x.is_finite()) => Ok(inverse),
        _ => Err(ModelError::DegenerateGeometry),
    }
}

fn speeds_from_inverse(
    wrench: &Wrench,
    inverse: &Matrix4<f64>,
) -> Result<Vector4<f64>, ModelError> {
    let squared = inverse * wrench.to_vector();
    // Round-off around a rotor at rest can come back slightly negative.
    let tolerance = 1e-9 * squared.amax().max(1.0);

    let mut speeds = Vector4::zeros();
    for (i, &w2) in squared.iter().enumerate() {
        if w2 < -tolerance {
            return Err(ModelError::InfeasibleWrench {
                rotor: i + 1,
                speed_squared: w2,
            });
        }
        speeds[i] = if w2.is_nan() { w2 } else { w2.max(0.0).sqrt() };
    }
    Ok(speeds)
}

/// Validated rotor mixing map: the mixing matrix, its inverse and the rotor
/// speed limit.
#[derive(Clone, Debug, PartialEq)]
pub struct RotorMap {
    matrix: Matrix4<f64>,
    inverse: Matrix4<f64>,
    max_speed: Option<f64>,
}

impl RotorMap {
    /// # Errors
    ///
    /// [`ModelError::DegenerateGeometry`] when the coefficients and layout
    /// produce a singular mixing matrix (for example a zero arm length).
    pub fn new(
        kf: f64,
        kd: f64,
        arm_length: f64,
        layout: RotorLayout,
        max_speed: Option<f64>,
    ) -> Result<Self, ModelError> {
        Self::from_matrix(mixing_matrix(kf, kd, arm_length, layout), max_speed)
    }

    pub fn from_matrix(matrix: Matrix4<f64>, max_speed: Option<f64>) -> Result<Self, ModelError> {
        let inverse = invert(&matrix)?;
        Ok(Self {
            matrix,
            inverse,
            max_speed,
        })
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    pub fn inverse(&self) -> &Matrix4<f64> {
        &self.inverse
    }

    pub fn max_speed(&self) -> Option<f64> {
        self.max_speed
    }

    pub fn clamp(&self, speeds: &Vector4<f64>) -> Vector4<f64> {
        clamp_speeds(speeds, self.max_speed)
    }

    /// Wrench produced by `speeds`, after clamping to the speed limit.
    pub fn forces(&self, speeds: &Vector4<f64>) -> Wrench {
        rotor_speeds_to_forces(speeds, &self.matrix, self.max_speed)
    }

    /// Rotor speeds producing `wrench`, using the precomputed inverse.
    pub fn speeds(&self, wrench: &Wrench) -> Result<Vector4<f64>, ModelError> {
        speeds_from_inverse(wrench, &self.inverse)
    }

    /// Four equal rotor speeds whose collective thrust equals `weight` with
    /// zero net torque.
    pub fn hover_speeds(&self, weight: f64) -> Result<Vector4<f64>, ModelError> {
        self.speeds(&Wrench::new(weight, Vector3::zeros()))
    }
}
