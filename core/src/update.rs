//! Importance weighting of particles against landmark observations
//!
//! For a single particle the weight is computed in four stages:
//! 1. gate the map to the landmarks within sensor range of the particle,
//! 2. transform the vehicle-frame observations into the map frame using the particle's pose,
//! 3. associate each transformed observation with its nearest in-range landmark,
//! 4. multiply the bivariate Gaussian likelihoods of every observation against its landmark.
//!
//! Each stage is exposed on its own so it can be tested in isolation; [particle_weight] chains them.
use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::association::associate;
use crate::error::{FilterError, Result, check_positive_std_dev};
use crate::map::{Landmark, LandmarkObservation, Map};
use crate::{Pose, distance};

/// What to do with an observation that has no landmark within sensor range
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedPolicy {
    /// The particle cannot explain the observation: its weight becomes zero
    #[default]
    ZeroWeight,
    /// Leave the observation out of the likelihood product
    Skip,
}

/// Per-axis landmark measurement noise standard deviations
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandmarkNoise {
    pub std_x: f64,
    pub std_y: f64,
}
impl LandmarkNoise {
    pub fn new(std_x: f64, std_y: f64) -> LandmarkNoise {
        LandmarkNoise { std_x, std_y }
    }
    /// Both deviations divide the likelihood, so they must be strictly positive
    pub fn validate(&self) -> Result<()> {
        check_positive_std_dev("std_landmark_x", self.std_x)?;
        check_positive_std_dev("std_landmark_y", self.std_y)
    }
    /// Normalizer of the bivariate density, `1 / (2π σx σy)`
    pub fn normalizer(&self) -> f64 {
        1.0 / (2.0 * PI * self.std_x * self.std_y)
    }
}
impl From<[f64; 2]> for LandmarkNoise {
    fn from(std: [f64; 2]) -> Self {
        LandmarkNoise::new(std[0], std[1])
    }
}

pub(crate) fn check_sensor_range(sensor_range: f64) -> Result<()> {
    if sensor_range > 0.0 {
        Ok(())
    } else {
        Err(FilterError::InvalidSensorRange(sensor_range))
    }
}

/// Landmarks strictly closer than `sensor_range` to the pose, as id-tagged candidates
pub fn landmarks_in_range(pose: &Pose, sensor_range: f64, map: &Map) -> Vec<LandmarkObservation> {
    map.landmarks()
        .iter()
        .filter(|landmark| distance(pose.x, pose.y, landmark.x, landmark.y) < sensor_range)
        .map(LandmarkObservation::from)
        .collect()
}

/// Transform vehicle-frame observations into the map frame as seen from `pose`
///
/// Rotation by the heading followed by translation by the position. Ids are carried through unchanged.
pub fn to_map_frame(pose: &Pose, observations: &[LandmarkObservation]) -> Vec<LandmarkObservation> {
    let rotation = Rotation2::new(pose.theta);
    let translation = Vector2::new(pose.x, pose.y);
    observations
        .iter()
        .map(|obs| {
            let p = translation + rotation * Vector2::new(obs.x, obs.y);
            LandmarkObservation {
                id: obs.id,
                x: p.x,
                y: p.y,
            }
        })
        .collect()
}

/// Bivariate independent Gaussian density of a map-frame observation about a landmark
pub fn observation_likelihood(
    observation: &LandmarkObservation,
    landmark: &Landmark,
    noise: &LandmarkNoise,
) -> f64 {
    let dx = observation.x - landmark.x;
    let dy = observation.y - landmark.y;
    let exponent = dx * dx / (2.0 * noise.std_x * noise.std_x)
        + dy * dy / (2.0 * noise.std_y * noise.std_y);
    noise.normalizer() * (-exponent).exp()
}

/// Map-frame observations seen from `pose`, each tagged with its nearest in-range landmark
pub fn associate_observations(
    pose: &Pose,
    sensor_range: f64,
    observations: &[LandmarkObservation],
    map: &Map,
) -> Vec<LandmarkObservation> {
    let candidates = landmarks_in_range(pose, sensor_range, map);
    let transformed = to_map_frame(pose, observations);
    associate(&candidates, &transformed)
}

/// Product of the observation likelihoods of already associated map-frame observations
pub fn likelihood_of(
    associated: &[LandmarkObservation],
    map: &Map,
    noise: &LandmarkNoise,
    policy: UnmatchedPolicy,
) -> f64 {
    let mut weight = 1.0;
    for obs in associated {
        match obs.id.and_then(|id| map.get(id)) {
            Some(landmark) => weight *= observation_likelihood(obs, landmark, noise),
            None => match policy {
                UnmatchedPolicy::ZeroWeight => return 0.0,
                UnmatchedPolicy::Skip => {}
            },
        }
    }
    weight
}

/// Importance weight of a single particle
///
/// # Arguments
/// * `pose` - The particle's pose
/// * `sensor_range` - Landmarks at or beyond this distance from the particle are ignored
/// * `noise` - Landmark measurement noise
/// * `observations` - Vehicle-frame observations
/// * `map` - The landmark map
/// * `policy` - How observations without an in-range landmark are scored
pub fn particle_weight(
    pose: &Pose,
    sensor_range: f64,
    noise: &LandmarkNoise,
    observations: &[LandmarkObservation],
    map: &Map,
    policy: UnmatchedPolicy,
) -> f64 {
    let associated = associate_observations(pose, sensor_range, observations, map);
    likelihood_of(&associated, map, noise, policy)
}
