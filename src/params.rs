//! Vehicle parameters: the plain configuration read from YAML and the
//! validated, immutable parameter set the dynamics are evaluated with.

use std::path::Path;

use nalgebra::{Matrix3, Vector3, Vector4};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ModelError};
use crate::rotors::{NormalizedThrust, RotorLayout, RotorMap};

/// Physical description of a quadcopter as written in a configuration file.
///
/// Nothing here is checked; pass it through [`Params::new`] before simulating.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuadcopterConfig {
    /// Total mass (kg)
    pub mass: f64,
    /// Gravitational acceleration (m/s²)
    pub gravity: f64,
    /// Centre of mass to rotor hub distance (m)
    pub arm_length: f64,
    /// Air density (kg/m³)
    pub air_density: f64,
    /// Quadratic drag coefficient (dimensionless)
    pub drag_coefficient: f64,
    /// Drag reference area (m²)
    pub reference_area: f64,
    /// Principal moments of inertia [Ixx, Iyy, Izz] (kg⋅m²)
    pub inertia: [f64; 3],
    /// Full inertia tensor, rows first. Overrides `inertia` when present.
    pub inertia_matrix: Option<[[f64; 3]; 3]>,
    /// Rotor thrust coefficient kf (N⋅s²)
    pub thrust_coefficient: f64,
    /// Rotor drag torque coefficient kd (N⋅m⋅s²)
    pub torque_coefficient: f64,
    /// Rotor speed limit (rad/s)
    pub max_rotor_speed: Option<f64>,
    pub layout: RotorLayout,
}

impl Default for QuadcopterConfig {
    fn default() -> Self {
        Self {
            mass: 1.5,
            gravity: 9.81,
            arm_length: 0.25,
            air_density: 1.225,
            drag_coefficient: 0.1,
            reference_area: 0.05,
            inertia: [0.0213, 0.0213, 0.0405],
            inertia_matrix: None,
            thrust_coefficient: 1e-5,
            torque_coefficient: 1e-7,
            max_rotor_speed: Some(1000.0),
            layout: RotorLayout::Cross,
        }
    }
}

impl QuadcopterConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file_contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&file_contents)
    }

    /// Loads and validates in one go.
    pub fn load_params<P: AsRef<Path>>(path: P) -> Result<Params, ConfigError> {
        let config = Self::from_file(path)?;
        Ok(Params::new(&config)?)
    }

    fn inertia_tensor(&self) -> Matrix3<f64> {
        match self.inertia_matrix {
            Some(rows) => Matrix3::from_fn(|i, j| rows[i][j]),
            None => Matrix3::from_diagonal(&Vector3::from(self.inertia)),
        }
    }
}

/// Validated, immutable parameter set.
///
/// Built once per simulation run and shared by reference with every
/// evaluation of the dynamics.
#[derive(Clone, Debug, PartialEq)]
pub struct Params {
    mass: f64,
    gravity: f64,
    arm_length: f64,
    air_density: f64,
    drag_coefficient: f64,
    reference_area: f64,
    inertia: Matrix3<f64>,
    inertia_inverse: Matrix3<f64>,
    thrust_coefficient: f64,
    rotors: RotorMap,
}

impl Params {
    /// Validates `config` and precomputes the inverse inertia and mixing map.
    ///
    /// # Errors
    ///
    /// [`ModelError::InvalidParameter`] naming the first offending field:
    /// non-positive mass, gravity, arm length or rotor coefficients, negative
    /// aerodynamic terms, an inertia tensor that is not symmetric
    /// positive-definite, or a singular mixing matrix.
    pub fn new(config: &QuadcopterConfig) -> Result<Self, ModelError> {
        positive("mass", config.mass)?;
        positive("gravity", config.gravity)?;
        positive("arm_length", config.arm_length)?;
        non_negative("air_density", config.air_density)?;
        non_negative("drag_coefficient", config.drag_coefficient)?;
        non_negative("reference_area", config.reference_area)?;
        positive("thrust_coefficient", config.thrust_coefficient)?;
        positive("torque_coefficient", config.torque_coefficient)?;
        if let Some(max_speed) = config.max_rotor_speed {
            positive("max_rotor_speed", max_speed)?;
        }

        let inertia = config.inertia_tensor();
        let inertia_inverse = validate_inertia(&inertia)?;

        let rotors = RotorMap::new(
            config.thrust_coefficient,
            config.torque_coefficient,
            config.arm_length,
            config.layout,
            config.max_rotor_speed,
        )
        .map_err(|e| ModelError::InvalidParameter(format!("rotor mixing: {e}")))?;

        Ok(Self {
            mass: config.mass,
            gravity: config.gravity,
            arm_length: config.arm_length,
            air_density: config.air_density,
            drag_coefficient: config.drag_coefficient,
            reference_area: config.reference_area,
            inertia,
            inertia_inverse,
            thrust_coefficient: config.thrust_coefficient,
            rotors,
        })
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn gravity(&self) -> f64 {
        self.gravity
    }

    pub fn arm_length(&self) -> f64 {
        self.arm_length
    }

    pub fn air_density(&self) -> f64 {
        self.air_density
    }

    pub fn drag_coefficient(&self) -> f64 {
        self.drag_coefficient
    }

    pub fn reference_area(&self) -> f64 {
        self.reference_area
    }

    pub fn inertia(&self) -> &Matrix3<f64> {
        &self.inertia
    }

    pub fn inertia_inverse(&self) -> &Matrix3<f64> {
        &self.inertia_inverse
    }

    pub fn thrust_coefficient(&self) -> f64 {
        self.thrust_coefficient
    }

    pub fn rotors(&self) -> &RotorMap {
        &self.rotors
    }

    /// Weight mg (N).
    pub fn weight(&self) -> f64 {
        self.mass * self.gravity
    }

    /// ½⋅ρ⋅A⋅Cd, the factor multiplying v|v| in the drag force.
    pub fn drag_factor(&self) -> f64 {
        0.5 * self.air_density * self.reference_area * self.drag_coefficient
    }

    /// Equal rotor speeds holding the vehicle in level hover.
    pub fn hover_speeds(&self) -> Result<Vector4<f64>, ModelError> {
        self.rotors.hover_speeds(self.weight())
    }

    /// Normalized-command thrust model of one rotor: full command is
    /// `kf⋅max_rotor_speed²`, acting at the arm length.
    ///
    /// # Errors
    ///
    /// [`ModelError::InvalidParameter`] when no maximum rotor speed is configured.
    pub fn normalized_thrust(&self) -> Result<NormalizedThrust, ModelError> {
        let max_speed = self.rotors.max_speed().ok_or_else(|| {
            ModelError::InvalidParameter(
                "normalized thrust needs max_rotor_speed".to_string(),
            )
        })?;
        NormalizedThrust::new(self.thrust_coefficient * max_speed * max_speed, self.arm_length)
    }
}

fn positive(name: &str, value: f64) -> Result<(), ModelError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ModelError::InvalidParameter(format!(
            "{name} must be positive and finite, got {value}"
        )))
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), ModelError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ModelError::InvalidParameter(format!(
            "{name} must be non-negative and finite, got {value}"
        )))
    }
}

fn validate_inertia(inertia: &Matrix3<f64>) -> Result<Matrix3<f64>, ModelError> {
    if inertia.iter().any(|x| !x.is_finite()) {
        return Err(ModelError::InvalidParameter(
            "inertia must be finite".to_string(),
        ));
    }
    let asymmetry = (inertia - inertia.transpose()).amax();
    if asymmetry > 1e-12 * inertia.amax() {
        return Err(ModelError::InvalidParameter(
            "inertia must be symmetric".to_string(),
        ));
    }
    let cholesky = (*inertia).cholesky().ok_or_else(|| {
        ModelError::InvalidParameter("inertia must be positive-definite".to_string())
    })?;
    Ok(cholesky.inverse())
}
