//! Error types for the localization filter and its harness

use thiserror::Error;

/// Errors raised by the particle filter and the simulation harness
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Number of particles must be positive, got {0}")]
    InvalidParticleCount(usize),

    #[error("Time step must be positive and finite, got {0}")]
    InvalidTimeStep(f64),

    #[error("Standard deviation '{name}' is invalid: {value}")]
    InvalidStdDev { name: &'static str, value: f64 },

    #[error("Sensor range must be positive, got {0}")]
    InvalidSensorRange(f64),

    #[error("Control input '{name}' must be finite, got {value}")]
    InvalidControl { name: &'static str, value: f64 },

    #[error("Pose component '{name}' must be finite, got {value}")]
    InvalidPose { name: &'static str, value: f64 },

    #[error("Particle filter has not been initialized")]
    NotInitialized,

    #[error("Resample requires a weight for every particle: expected {expected}, found {found}")]
    WeightsNotUpdated { expected: usize, found: usize },

    #[error("Degenerate weights: {0}")]
    DegenerateWeights(String),

    #[error("Particle set is empty")]
    EmptyParticleSet,

    #[error("Scenario streams have inconsistent lengths: {0}")]
    InvalidScenario(String),

    #[error("Particle index {index} out of range for {len} particles")]
    ParticleIndex { index: usize, len: usize },

    #[error(
        "Association trace sequences must have equal lengths: associations={associations}, sense_x={sense_x}, sense_y={sense_y}"
    )]
    TraceLengthMismatch {
        associations: usize,
        sense_x: usize,
        sense_y: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for FilterError {
    fn from(e: serde_json::Error) -> Self {
        FilterError::Config(e.to_string())
    }
}

impl From<serde_yaml::Error> for FilterError {
    fn from(e: serde_yaml::Error) -> Self {
        FilterError::Config(e.to_string())
    }
}

impl From<toml::de::Error> for FilterError {
    fn from(e: toml::de::Error) -> Self {
        FilterError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for FilterError {
    fn from(e: toml::ser::Error) -> Self {
        FilterError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FilterError>;

/// Reject negative or non-finite standard deviations. Zero is allowed and means "no noise".
pub(crate) fn check_std_dev(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(FilterError::InvalidStdDev { name, value })
    }
}

/// Reject non-finite pose components
pub(crate) fn check_pose(x: f64, y: f64, theta: f64) -> Result<()> {
    for (name, value) in [("x", x), ("y", y), ("theta", theta)] {
        if !value.is_finite() {
            return Err(FilterError::InvalidPose { name, value });
        }
    }
    Ok(())
}

/// Reject standard deviations that are not strictly positive and finite.
pub(crate) fn check_positive_std_dev(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FilterError::InvalidStdDev { name, value })
    }
}
