//! Particle filter for landmark-based localization
//!
//! [ParticleFilter] owns the particle set and runs the recursive cycle:
//!
//! ```rust
//! use mcl::ParticleFilter;
//! use mcl::config::FilterConfig;
//! use mcl::map::{Landmark, LandmarkObservation, Map};
//!
//! let map = Map::new(vec![Landmark::new(1, 10.0, 0.0)]);
//! let mut pf = ParticleFilter::with_seed(FilterConfig::with_particles(50), 42).unwrap();
//! pf.initialize(0.0, 0.0, 0.0, [0.3, 0.3, 0.01]).unwrap();
//!
//! pf.predict(0.1, [0.3, 0.3, 0.01], 1.0, 0.0).unwrap();
//! pf.update_weights(50.0, [0.3, 0.3], &[LandmarkObservation::new(9.9, 0.0)], &map).unwrap();
//! pf.resample().unwrap();
//!
//! assert_eq!(pf.particles().len(), 50);
//! let estimate = pf.estimate().unwrap();
//! assert!((estimate.x - 0.1).abs() < 1.0);
//! ```
use log::{debug, warn};
use std::fmt::{self, Debug};

use crate::config::FilterConfig;
use crate::error::{FilterError, Result, check_pose, check_std_dev};
use crate::map::{LandmarkObservation, Map};
use crate::motion::{ControlInput, MotionNoise, propagate};
use crate::particle::{self, Particle, ParticleAveragingStrategy};
use crate::sampling::{RandSampler, Sampler, rescale_weights};
use crate::update::{LandmarkNoise, check_sensor_range, particle_weight};
use crate::{Pose, wrap_to_pi};

/// Sequential Monte Carlo localization filter
///
/// The random source is injected as a [Sampler], so a seeded sampler gives a reproducible run.
pub struct ParticleFilter<S: Sampler = RandSampler> {
    config: FilterConfig,
    particles: Vec<Particle>,
    /// Weights of the current update pass, indexed by particle; empty outside of update/resample
    weights: Vec<f64>,
    is_initialized: bool,
    sampler: S,
}

impl<S: Sampler> Debug for ParticleFilter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let min_weight = self
            .particles
            .iter()
            .map(|p| p.weight)
            .fold(f64::INFINITY, f64::min);
        let max_weight = self.particles.iter().map(|p| p.weight).fold(0.0, f64::max);
        let mut s = f.debug_struct("ParticleFilter");
        s.field("num_particles", &self.config.num_particles)
            .field("is_initialized", &self.is_initialized)
            .field("effective_particles", &self.effective_sample_size())
            .field(
                "weight_range",
                &format_args!("[{:.4e}, {:.4e}]", min_weight, max_weight),
            );
        if let Some(mean) = self.estimate() {
            s.field(
                "estimate",
                &format_args!("({:.3}, {:.3}, {:.3} rad)", mean.x, mean.y, mean.theta),
            );
        }
        s.finish()
    }
}

impl ParticleFilter<RandSampler> {
    /// Create a filter backed by a seeded [RandSampler]
    pub fn with_seed(config: FilterConfig, seed: u64) -> Result<Self> {
        Self::new(config, RandSampler::from_seed(seed))
    }
}

impl<S: Sampler> ParticleFilter<S> {
    /// Create an uninitialized filter
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid (e.g. zero particles).
    pub fn new(config: FilterConfig, sampler: S) -> Result<Self> {
        config.validate()?;
        Ok(ParticleFilter {
            particles: Vec::with_capacity(config.num_particles),
            weights: Vec::with_capacity(config.num_particles),
            config,
            is_initialized: false,
            sampler,
        })
    }

    /// Seed the particle set around a prior pose estimate
    ///
    /// Each particle's pose is drawn independently from `Normal(x, std[0])`, `Normal(y, std[1])`, and
    /// `Normal(theta, std[2])`, and its weight is set to 1. Once the filter is initialized further calls are
    /// no-ops.
    ///
    /// # Arguments
    /// * `x`, `y`, `theta` - Prior pose estimate (e.g. from GPS)
    /// * `std` - Standard deviations of the prior in x, y, and theta
    pub fn initialize(&mut self, x: f64, y: f64, theta: f64, std: [f64; 3]) -> Result<()> {
        if self.is_initialized {
            debug!("Particle filter already initialized; ignoring initialize call");
            return Ok(());
        }
        check_pose(x, y, theta)?;
        check_std_dev("std_x", std[0])?;
        check_std_dev("std_y", std[1])?;
        check_std_dev("std_theta", std[2])?;

        let n = self.config.num_particles;
        self.particles = (0..n)
            .map(|id| {
                let pose = Pose::new(
                    self.sampler.gaussian(x, std[0]),
                    self.sampler.gaussian(y, std[1]),
                    self.sampler.gaussian(theta, std[2]),
                );
                Particle::new(id, pose, 1.0)
            })
            .collect();
        self.weights.clear();
        self.is_initialized = true;
        debug!(
            "Initialized {} particles around ({:.3}, {:.3}, {:.3})",
            n, x, y, theta
        );
        Ok(())
    }

    /// Advance every particle by the control input and add process noise
    ///
    /// # Arguments
    /// * `dt` - Time elapsed since the previous step, must be positive
    /// * `std_pos` - Process noise standard deviations in x, y, and theta
    /// * `velocity` - Forward velocity
    /// * `yaw_rate` - Turn rate in radians per unit time
    ///
    /// Headings are wrapped to (-π, π] after the step. If any propagated pose is not finite the particle set
    /// is left unchanged and [FilterError::InvalidPose] is returned.
    pub fn predict(
        &mut self,
        dt: f64,
        std_pos: [f64; 3],
        velocity: f64,
        yaw_rate: f64,
    ) -> Result<()> {
        self.ensure_initialized()?;
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(FilterError::InvalidTimeStep(dt));
        }
        let noise = MotionNoise::from(std_pos);
        noise.validate()?;
        let control = ControlInput::new(velocity, yaw_rate);
        control.validate()?;

        let threshold = self.config.yaw_rate_threshold;
        let mut poses = Vec::with_capacity(self.particles.len());
        for particle in &self.particles {
            let moved = propagate(&particle.pose, &control, dt, threshold);
            let mut pose = noise.apply(&moved, &mut self.sampler);
            check_pose(pose.x, pose.y, pose.theta)?;
            pose.theta = wrap_to_pi(pose.theta);
            poses.push(pose);
        }
        for (particle, pose) in self.particles.iter_mut().zip(poses) {
            particle.pose = pose;
        }
        Ok(())
    }

    /// Reweight every particle against a set of landmark observations
    ///
    /// # Arguments
    /// * `sensor_range` - Landmarks at or beyond this distance from a particle are not considered for it
    /// * `std_landmark` - Observation noise standard deviations in x and y, must be positive
    /// * `observations` - Observations in the vehicle frame
    /// * `map` - The landmark map
    ///
    /// Each particle's weight is replaced by the product of its observation likelihoods and recorded for the
    /// next [ParticleFilter::resample].
    pub fn update_weights(
        &mut self,
        sensor_range: f64,
        std_landmark: [f64; 2],
        observations: &[LandmarkObservation],
        map: &Map,
    ) -> Result<()> {
        self.ensure_initialized()?;
        check_sensor_range(sensor_range)?;
        let noise = LandmarkNoise::from(std_landmark);
        noise.validate()?;

        let policy = self.config.unmatched_policy;
        self.weights.clear();
        self.weights.resize(self.particles.len(), 0.0);
        for (slot, particle) in self.weights.iter_mut().zip(self.particles.iter_mut()) {
            let weight = particle_weight(
                &particle.pose,
                sensor_range,
                &noise,
                observations,
                map,
                policy,
            );
            particle.weight = weight;
            *slot = weight;
        }
        debug!(
            "Updated weights for {} particles from {} observations, effective sample size {:.1}",
            self.particles.len(),
            observations.len(),
            particle::effective_sample_size(&self.weights)
        );
        Ok(())
    }

    /// Draw the next generation of particles with probability proportional to weight
    ///
    /// # Errors
    /// Returns [FilterError::WeightsNotUpdated] if [ParticleFilter::update_weights] has not run since the
    /// last resample. Weights are rescaled before drawing, so likelihood products that overflowed to `+inf`
    /// are still resampled. If every weight is zero the particles are drawn uniformly instead.
    pub fn resample(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        let n = self.config.num_particles;
        if self.weights.len() != n {
            return Err(FilterError::WeightsNotUpdated {
                expected: n,
                found: self.weights.len(),
            });
        }
        let drawn = rescale_weights(&self.weights).and_then(|w| self.sampler.categorical(&w, n));
        let indices = match drawn {
            Ok(indices) => indices,
            Err(FilterError::DegenerateWeights(reason)) => {
                warn!("Degenerate particle weights ({reason}); resampling uniformly");
                (0..n).map(|_| self.sampler.uniform_index(n)).collect()
            }
            Err(e) => return Err(e),
        };
        self.particles = indices
            .into_iter()
            .enumerate()
            .map(|(id, index)| {
                let mut survivor = self.particles[index].clone();
                survivor.id = id;
                survivor
            })
            .collect();
        self.weights.clear();
        Ok(())
    }

    /// Attach an association trace to the particle at `index`
    pub fn set_associations(
        &mut self,
        index: usize,
        associations: Vec<u32>,
        sense_x: Vec<f64>,
        sense_y: Vec<f64>,
    ) -> Result<()> {
        let len = self.particles.len();
        let particle = self
            .particles
            .get_mut(index)
            .ok_or(FilterError::ParticleIndex { index, len })?;
        particle.set_associations(associations, sense_x, sense_y)
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }
    /// Weights recorded by the last [ParticleFilter::update_weights], empty after a resample
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
    pub fn num_particles(&self) -> usize {
        self.config.num_particles
    }
    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }
    pub fn sampler_mut(&mut self) -> &mut S {
        &mut self.sampler
    }
    /// Point estimate using the configured averaging strategy
    pub fn estimate(&self) -> Option<Pose> {
        self.config.averaging_strategy.estimate(&self.particles)
    }
    pub fn estimate_with(&self, strategy: ParticleAveragingStrategy) -> Option<Pose> {
        strategy.estimate(&self.particles)
    }
    /// The particle with the highest weight
    pub fn best_particle(&self) -> Option<&Particle> {
        particle::highest_weight(&self.particles)
    }
    /// Effective sample size of the current particle weights
    pub fn effective_sample_size(&self) -> f64 {
        let weights: Vec<f64> = self.particles.iter().map(|p| p.weight).collect();
        particle::effective_sample_size(&weights)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized {
            Ok(())
        } else {
            Err(FilterError::NotInitialized)
        }
    }
}
