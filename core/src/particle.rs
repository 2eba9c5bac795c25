//! Particles, association traces, and point estimates over a particle set
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::Pose;
use crate::error::{FilterError, Result};
use crate::sampling::rescale_weights;

/// Diagnostic record of which landmark each observation was matched to
///
/// The three sequences are parallel: `associations[i]` is the landmark id matched by the observation whose
/// map-frame coordinates are `(sense_x[i], sense_y[i])`. The filter never reads the trace.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssociationTrace {
    associations: Vec<u32>,
    sense_x: Vec<f64>,
    sense_y: Vec<f64>,
}

/// Which coordinate of the sensed positions to format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl AssociationTrace {
    pub fn new(associations: Vec<u32>, sense_x: Vec<f64>, sense_y: Vec<f64>) -> Result<Self> {
        if associations.len() != sense_x.len() || associations.len() != sense_y.len() {
            return Err(FilterError::TraceLengthMismatch {
                associations: associations.len(),
                sense_x: sense_x.len(),
                sense_y: sense_y.len(),
            });
        }
        Ok(AssociationTrace {
            associations,
            sense_x,
            sense_y,
        })
    }
    pub fn associations(&self) -> &[u32] {
        &self.associations
    }
    pub fn sense_x(&self) -> &[f64] {
        &self.sense_x
    }
    pub fn sense_y(&self) -> &[f64] {
        &self.sense_y
    }
    pub fn is_empty(&self) -> bool {
        self.associations.is_empty()
    }
    /// Landmark ids separated by single spaces, e.g. `"3 7 12"`
    pub fn associations_string(&self) -> String {
        join(&self.associations)
    }
    /// Sensed coordinates along `axis` separated by single spaces
    pub fn sense_coord_string(&self, axis: Axis) -> String {
        match axis {
            Axis::X => join(&self.sense_x),
            Axis::Y => join(&self.sense_y),
        }
    }
}

fn join<T: Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A single pose hypothesis with its importance weight
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// Position of the particle in the current set
    pub id: usize,
    pub pose: Pose,
    pub weight: f64,
    #[serde(default)]
    pub trace: AssociationTrace,
}
impl Display for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Particle")
            .field("id", &self.id)
            .field("x", &self.pose.x)
            .field("y", &self.pose.y)
            .field("theta", &self.pose.theta)
            .field("weight", &self.weight)
            .field("associations", &self.trace.associations_string())
            .finish()
    }
}
impl Particle {
    pub fn new(id: usize, pose: Pose, weight: f64) -> Particle {
        Particle {
            id,
            pose,
            weight,
            trace: AssociationTrace::default(),
        }
    }
    /// Replace the particle's association trace
    pub fn set_associations(
        &mut self,
        associations: Vec<u32>,
        sense_x: Vec<f64>,
        sense_y: Vec<f64>,
    ) -> Result<()> {
        self.trace = AssociationTrace::new(associations, sense_x, sense_y)?;
        Ok(())
    }
    pub fn trace(&self) -> &AssociationTrace {
        &self.trace
    }
}

/// How a single pose is extracted from the particle set
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ParticleAveragingStrategy {
    #[default]
    WeightedAverage,
    UnweightedAverage,
    HighestWeight,
}
impl ParticleAveragingStrategy {
    /// Point estimate of the particle set, or `None` when it is empty
    ///
    /// Headings are averaged on the unit circle. Weights are rescaled first, so overflowed weights still give a
    /// finite estimate. A weighted average over all-zero weights falls back to the unweighted average.
    pub fn estimate(&self, particles: &[Particle]) -> Option<Pose> {
        if particles.is_empty() {
            return None;
        }
        match self {
            ParticleAveragingStrategy::WeightedAverage => {
                let weights: Vec<f64> = particles.iter().map(|p| p.weight).collect();
                match rescale_weights(&weights) {
                    Ok(scaled) => {
                        let total: f64 = scaled.iter().sum();
                        Some(average(particles, |i| scaled[i] / total))
                    }
                    Err(_) => Some(average(particles, |_| 1.0 / particles.len() as f64)),
                }
            }
            ParticleAveragingStrategy::UnweightedAverage => {
                Some(average(particles, |_| 1.0 / particles.len() as f64))
            }
            ParticleAveragingStrategy::HighestWeight => highest_weight(particles).map(|p| p.pose),
        }
    }
}

fn average<F: Fn(usize) -> f64>(particles: &[Particle], weight_of: F) -> Pose {
    let (mut x, mut y, mut sin, mut cos) = (0.0, 0.0, 0.0, 0.0);
    for (i, particle) in particles.iter().enumerate() {
        let w = weight_of(i);
        x += w * particle.pose.x;
        y += w * particle.pose.y;
        sin += w * particle.pose.theta.sin();
        cos += w * particle.pose.theta.cos();
    }
    Pose::new(x, y, sin.atan2(cos))
}

/// The particle with the largest weight; the first one wins ties
pub fn highest_weight(particles: &[Particle]) -> Option<&Particle> {
    particles.iter().fold(None, |best: Option<&Particle>, p| match best {
        Some(b) if b.weight >= p.weight => Some(b),
        _ => Some(p),
    })
}

/// Effective sample size `(Σw)² / Σw²` of unnormalized weights
///
/// Equals the number of weights when they are uniform and 1 when a single weight carries all the mass.
/// Returns 0 when the weights are all zero or invalid. Overflowed weights are counted as in [rescale_weights].
pub fn effective_sample_size(weights: &[f64]) -> f64 {
    let Ok(scaled) = rescale_weights(weights) else {
        return 0.0;
    };
    let sum: f64 = scaled.iter().sum();
    let sum_of_squares: f64 = scaled.iter().map(|w| w * w).sum();
    sum * sum / sum_of_squares
}
