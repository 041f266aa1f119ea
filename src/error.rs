use thiserror::Error;

/// Errors raised while building a vehicle model.
///
/// Evaluation of the dynamics never fails; everything that could make it
/// produce garbage is rejected here, once, at construction time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Rotor mixing matrix is singular (degenerate rotor geometry)")]
    DegenerateGeometry,

    #[error("Wrench not producible by rotors: rotor {rotor} needs speed² = {speed_squared}")]
    InfeasibleWrench { rotor: usize, speed_squared: f64 },
}

/// Errors raised while loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),
    #[error("Invalid vehicle configuration: {0}")]
    ValidationError(#[from] ModelError),
}

/// Errors raised by the simulation driver or the integrator it wraps.
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Invalid time grid: {0}")]
    InvalidTimeGrid(String),

    #[error("Integration failed on the interval starting at t = {time}")]
    IntegrationFailed { time: f64 },

    #[error("Failed to export trajectory: {0}")]
    Export(#[from] csv::Error),

    #[error("Failed to export trajectory: {0}")]
    Io(#[from] std::io::Error),
}
