//! Reference frame transforms for 3-2-1 (yaw-pitch-roll) Euler angles.
//!
//! All functions are pure: they take the three attitude angles in radians and
//! return a matrix. Non-finite angles are not rejected, they simply propagate.

use nalgebra::{Matrix3, Vector3};

/// Rotation matrix taking a vector expressed in the body frame to the inertial frame.
///
/// R = Rz(ψ) * Ry(θ) * Rx(φ)
///
/// # Arguments
///
/// * `phi` - Roll angle about the body x-axis (radians)
/// * `theta` - Pitch angle about the body y-axis (radians)
/// * `psi` - Yaw angle about the inertial z-axis (radians)
///
/// # Returns
///
/// An orthonormal 3x3 matrix with determinant +1.
pub fn body_to_inertial(phi: f64, theta: f64, psi: f64) -> Matrix3<f64> {
    let (sin_phi, cos_phi) = phi.sin_cos();
    let (sin_theta, cos_theta) = theta.sin_cos();
    let (sin_psi, cos_psi) = psi.sin_cos();

    Matrix3::new(
        cos_theta * cos_psi,
        sin_phi * sin_theta * cos_psi - cos_phi * sin_psi,
        cos_phi * sin_theta * cos_psi + sin_phi * sin_psi,
        cos_theta * sin_psi,
        sin_phi * sin_theta * sin_psi + cos_phi * cos_psi,
        cos_phi * sin_theta * sin_psi - sin_phi * cos_psi,
        -sin_theta,
        sin_phi * cos_theta,
        cos_phi * cos_theta,
    )
}

/// Rotation matrix taking an inertial-frame vector into the body frame.
///
/// Rotation matrices are orthonormal, so this is the transpose of
/// [`body_to_inertial`].
pub fn inertial_to_body(phi: f64, theta: f64, psi: f64) -> Matrix3<f64> {
    body_to_inertial(phi, theta, psi).transpose()
}

/// Kinematic matrix mapping body rates `[p, q, r]` to Euler angle rates
/// `[φ̇, θ̇, ψ̇]`.
///
/// ```text
/// [1  sinφ tanθ   cosφ tanθ]
/// [0  cosφ       -sinφ     ]
/// [0  sinφ/cosθ   cosφ/cosθ]
/// ```
///
/// Singular at θ = ±π/2 (gimbal lock). No guard is applied: the entries blow
/// up or become non-finite, and callers are expected to keep pitch inside
/// (-π/2, π/2).
pub fn euler_rates(phi: f64, theta: f64, _psi: f64) -> Matrix3<f64> {
    let (sin_phi, cos_phi) = phi.sin_cos();
    let cos_theta = theta.cos();
    let tan_theta = theta.tan();

    Matrix3::new(
        1.0,
        sin_phi * tan_theta,
        cos_phi * tan_theta,
        0.0,
        cos_phi,
        -sin_phi,
        0.0,
        sin_phi / cos_theta,
        cos_phi / cos_theta,
    )
}

/// Expresses a body-frame vector in the inertial frame.
pub fn rotate_to_inertial(v: &Vector3<f64>, attitude: &Vector3<f64>) -> Vector3<f64> {
    body_to_inertial(attitude.x, attitude.y, attitude.z) * v
}

/// Expresses an inertial-frame vector in the body frame.
pub fn rotate_to_body(v: &Vector3<f64>, attitude: &Vector3<f64>) -> Vector3<f64> {
    inertial_to_body(attitude.x, attitude.y, attitude.z) * v
}

/// Gravitational acceleration `[0, 0, -g]` expressed in the body frame.
///
/// At level attitude this is `[0, 0, -g]`; a positive pitch moves part of it
/// onto body +x.
pub fn gravity_in_body(phi: f64, theta: f64, psi: f64, gravity: f64) -> Vector3<f64> {
    inertial_to_body(phi, theta, psi) * Vector3::new(0.0, 0.0, -gravity)
}

/// Skew-symmetric matrix from vector (hat operator), so that `skew(a) * b == a × b`.
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// True when pitch is within `margin` radians of ±π/2.
pub fn is_near_gimbal_lock(theta: f64, margin: f64) -> bool {
    std::f64::consts::FRAC_PI_2 - theta.abs() <= margin
}

/// True when pitch passes through ±π/2 going from `theta_start` to `theta_end`.
pub fn crosses_gimbal_lock(theta_start: f64, theta_end: f64) -> bool {
    use std::f64::consts::FRAC_PI_2;
    [FRAC_PI_2, -FRAC_PI_2]
        .iter()
        .any(|&lock| (theta_start - lock) * (theta_end - lock) <= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    const ANGLES: [(f64, f64, f64); 6] = [
        (0.0, 0.0, 0.0),
        (0.3, -0.2, 1.1),
        (-1.2, 0.9, -2.5),
        (PI, 1.4, PI / 3.0),
        (2.7, -1.5, 0.01),
        (-0.05, 0.4, 6.0),
    ];

    #[test]
    fn test_identity_at_zero_attitude() {
        assert_relative_eq!(body_to_inertial(0.0, 0.0, 0.0), Matrix3::identity());
        assert_relative_eq!(euler_rates(0.0, 0.0, 0.0), Matrix3::identity());
    }

    #[test]
    fn test_rotation_orthonormal() {
        for &(phi, theta, psi) in ANGLES.iter() {
            let r = body_to_inertial(phi, theta, psi);
            assert_relative_eq!(r * r.transpose(), Matrix3::identity(), epsilon = 1e-9);
            assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_inertial_to_body_is_exact_transpose() {
        for &(phi, theta, psi) in ANGLES.iter() {
            assert_eq!(
                inertial_to_body(phi, theta, psi),
                body_to_inertial(phi, theta, psi).transpose()
            );
        }
    }

    #[test]
    fn test_round_trip() {
        let v = Vector3::new(1.5, -4.0, 0.25);
        for &(phi, theta, psi) in ANGLES.iter() {
            let attitude = Vector3::new(phi, theta, psi);
            let back = rotate_to_body(&rotate_to_inertial(&v, &attitude), &attitude);
            assert_relative_eq!(back, v, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_yaw_rotates_body_x_into_inertial_y() {
        let x_inertial = rotate_to_inertial(&Vector3::x(), &Vector3::new(0.0, 0.0, FRAC_PI_2));
        assert_relative_eq!(x_inertial, Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_positive_pitch_tilts_thrust_forward() {
        let theta = 0.2;
        let z_inertial = rotate_to_inertial(&Vector3::z(), &Vector3::new(0.0, theta, 0.0));
        assert_relative_eq!(z_inertial.x, theta.sin(), epsilon = 1e-12);
        assert_relative_eq!(z_inertial.z, theta.cos(), epsilon = 1e-12);
    }

    #[test]
    fn test_euler_rates_level_roll() {
        // With zero pitch, roll rate maps directly to φ̇ and yaw rate to ψ̇.
        let t = euler_rates(0.0, 0.0, 0.7);
        let rates = t * Vector3::new(0.1, 0.0, -0.3);
        assert_relative_eq!(rates, Vector3::new(0.1, 0.0, -0.3), epsilon = 1e-12);
    }

    #[test]
    fn test_euler_rates_at_gimbal_lock_does_not_panic() {
        let t = euler_rates(0.1, FRAC_PI_2, 0.0);
        // cos(π/2) is ~6e-17 in floating point, so entries are huge but the call returns.
        assert!(t[(2, 2)].abs() > 1e10 || !t[(2, 2)].is_finite());
        assert!(is_near_gimbal_lock(FRAC_PI_2, 1e-6));
        assert!(!is_near_gimbal_lock(0.3, 1e-3));
    }

    #[test]
    fn test_gravity_in_body() {
        let g = 9.81;
        assert_relative_eq!(gravity_in_body(0.0, 0.0, 1.3, g), Vector3::new(0.0, 0.0, -g), epsilon = 1e-12);

        for &(phi, theta, psi) in ANGLES.iter() {
            let g_body = gravity_in_body(phi, theta, psi, g);
            assert_relative_eq!(g_body.norm(), g, epsilon = 1e-9);
            assert_relative_eq!(
                g_body,
                Vector3::new(
                    g * theta.sin(),
                    -g * phi.sin() * theta.cos(),
                    -g * phi.cos() * theta.cos()
                ),
                epsilon = 1e-9
            );
            let back = rotate_to_inertial(&g_body, &Vector3::new(phi, theta, psi));
            assert_relative_eq!(back, Vector3::new(0.0, 0.0, -g), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_crossing_gimbal_lock_between_samples() {
        assert!(crosses_gimbal_lock(1.5, 1.7));
        assert!(crosses_gimbal_lock(-1.2, -2.0));
        assert!(crosses_gimbal_lock(FRAC_PI_2, 0.0));
        assert!(!crosses_gimbal_lock(0.2, 1.4));
        assert!(!crosses_gimbal_lock(-1.0, 1.0));
        assert!(!crosses_gimbal_lock(1.6, 3.0));
    }

    #[test]
    fn test_skew_matches_cross_product() {
        let a = Vector3::new(1.0, -2.0, 0.5);
        let b = Vector3::new(0.3, 0.7, -1.1);
        assert_relative_eq!(skew(&a) * b, a.cross(&b), epsilon = 1e-12);
    }

    #[test]
    fn test_nan_propagates() {
        let r = body_to_inertial(f64::NAN, 0.0, 0.0);
        assert!(r.iter().any(|x| x.is_nan()));
    }
}
