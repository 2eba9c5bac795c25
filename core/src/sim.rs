//! Simulation utilities for exercising the localization filter.
//!
//! This module provides:
//! - A [SimulationConfig] describing a synthetic run (controls, noise levels, sensor range, filter settings)
//! - A [Scenario] generator producing a ground-truth trajectory with matching noisy controls and observations
//! - [run_simulation], the time-step driver that feeds a scenario through a [ParticleFilter]
//! - [LocalizationResult] for storing per-step errors, with CSV import/export
//!
//! Nothing in the filter depends on this module; it plays the role of the external driver.
use log::{debug, info};
use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{FilterConfig, read_config, write_config};
use crate::error::{FilterError, Result};
use crate::filter::ParticleFilter;
use crate::map::{Landmark, LandmarkObservation, Map};
use crate::motion::{ControlInput, propagate};
use crate::particle::ParticleAveragingStrategy;
use crate::sampling::{RandSampler, Sampler};
use crate::update::associate_observations;
use crate::{Pose, angle_difference, distance};

fn default_num_steps() -> usize {
    500
}
fn default_dt() -> f64 {
    0.1
}
fn default_velocity() -> f64 {
    5.0
}
fn default_yaw_rate() -> f64 {
    0.1
}
fn default_sigma_pos() -> [f64; 3] {
    [0.3, 0.3, 0.01]
}
fn default_sigma_landmark() -> [f64; 2] {
    [0.3, 0.3]
}
fn default_sensor_range() -> f64 {
    50.0
}
fn default_control_noise() -> [f64; 2] {
    [0.1, 0.005]
}
/// Default seed value for reproducible simulations
fn default_seed() -> u64 {
    42
}

/// Parameters of a synthetic localization run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of time steps to simulate
    #[serde(default = "default_num_steps")]
    pub num_steps: usize,
    /// Time between steps
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// Commanded forward velocity
    #[serde(default = "default_velocity")]
    pub velocity: f64,
    /// Commanded yaw rate (radians per unit time)
    #[serde(default = "default_yaw_rate")]
    pub yaw_rate: f64,
    /// Starting pose of the ground truth
    #[serde(default)]
    pub start: Pose,
    /// Prior (GPS-like) uncertainty in x, y, theta; also the filter's process noise
    #[serde(default = "default_sigma_pos")]
    pub sigma_pos: [f64; 3],
    /// Landmark observation noise in x and y
    #[serde(default = "default_sigma_landmark")]
    pub sigma_landmark: [f64; 2],
    /// Noise on the reported velocity and yaw rate
    #[serde(default = "default_control_noise")]
    pub control_noise: [f64; 2],
    /// Maximum observation distance
    #[serde(default = "default_sensor_range")]
    pub sensor_range: f64,
    /// Random number generator seed for deterministic runs
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Settings of the filter under test
    #[serde(default)]
    pub filter: FilterConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            num_steps: default_num_steps(),
            dt: default_dt(),
            velocity: default_velocity(),
            yaw_rate: default_yaw_rate(),
            start: Pose::default(),
            sigma_pos: default_sigma_pos(),
            sigma_landmark: default_sigma_landmark(),
            control_noise: default_control_noise(),
            sensor_range: default_sensor_range(),
            seed: default_seed(),
            filter: FilterConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Write the configuration to a file, choosing the format by extension (.json/.yaml/.yml/.toml)
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_config(self, path.as_ref())
    }
    /// Read the configuration from a file, choosing the format by extension (.json/.yaml/.yml/.toml)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_config(path.as_ref())
    }
}

/// Scatter `num_landmarks` landmarks uniformly over `[-extent, extent]²`, ids starting at 1
///
/// # Errors
/// Returns [FilterError::Config] if `num_landmarks` does not fit in a landmark id.
pub fn random_map<S: Sampler + ?Sized>(
    num_landmarks: usize,
    extent: f64,
    sampler: &mut S,
) -> Result<Map> {
    let count = u32::try_from(num_landmarks).map_err(|_| {
        FilterError::Config(format!("too many landmarks for u32 ids: {num_landmarks}"))
    })?;
    let resolution = 10_000;
    let coordinate = |sampler: &mut S| {
        let u = sampler.uniform_index(resolution + 1) as f64 / resolution as f64;
        extent * (2.0 * u - 1.0)
    };
    let landmarks = (1..=count)
        .map(|id| {
            let x = coordinate(&mut *sampler);
            let y = coordinate(&mut *sampler);
            Landmark::new(id, x, y)
        })
        .collect();
    Ok(Map::new(landmarks))
}

/// Vehicle-frame view of `landmark` from `pose`
pub fn observe(pose: &Pose, landmark: &Landmark) -> LandmarkObservation {
    let offset = Vector2::new(landmark.x - pose.x, landmark.y - pose.y);
    let local = Rotation2::new(-pose.theta) * offset;
    LandmarkObservation::new(local.x, local.y)
}

/// Ground truth and the noisy sensor streams derived from it
#[derive(Clone, Debug)]
pub struct Scenario {
    /// True pose at every step
    pub ground_truth: Vec<Pose>,
    /// Noisy prior pose available at step 0
    pub prior: Pose,
    /// Reported control applied between step `i` and `i + 1`
    pub controls: Vec<ControlInput>,
    /// Vehicle-frame observations at every step
    pub observations: Vec<Vec<LandmarkObservation>>,
}

impl Scenario {
    /// Check that there is one observation set per true pose and one control between consecutive poses
    pub fn validate(&self) -> Result<()> {
        let steps = self.ground_truth.len();
        if steps == 0 {
            return Err(FilterError::InvalidScenario("no ground truth".to_string()));
        }
        if self.observations.len() != steps || self.controls.len() + 1 != steps {
            return Err(FilterError::InvalidScenario(format!(
                "{} poses, {} observation sets, {} controls",
                steps,
                self.observations.len(),
                self.controls.len()
            )));
        }
        Ok(())
    }

    /// Generate a scenario from the configuration over the given map
    pub fn generate<S: Sampler + ?Sized>(
        config: &SimulationConfig,
        map: &Map,
        sampler: &mut S,
    ) -> Scenario {
        let steps = config.num_steps.max(1);
        let truth_control = ControlInput::new(config.velocity, config.yaw_rate);
        let threshold = config.filter.yaw_rate_threshold;

        let mut ground_truth = Vec::with_capacity(steps);
        let mut pose = config.start;
        ground_truth.push(pose);
        for _ in 1..steps {
            pose = propagate(&pose, &truth_control, config.dt, threshold);
            ground_truth.push(pose);
        }

        let controls = (1..steps)
            .map(|_| {
                ControlInput::new(
                    sampler.gaussian(config.velocity, config.control_noise[0]),
                    sampler.gaussian(config.yaw_rate, config.control_noise[1]),
                )
            })
            .collect();

        let observations = ground_truth
            .iter()
            .map(|truth| {
                map.landmarks()
                    .iter()
                    .filter(|l| distance(truth.x, truth.y, l.x, l.y) < config.sensor_range)
                    .map(|l| {
                        let obs = observe(truth, l);
                        LandmarkObservation::new(
                            sampler.gaussian(obs.x, config.sigma_landmark[0]),
                            sampler.gaussian(obs.y, config.sigma_landmark[1]),
                        )
                    })
                    .collect()
            })
            .collect();

        let start = ground_truth[0];
        let prior = Pose::new(
            sampler.gaussian(start.x, config.sigma_pos[0]),
            sampler.gaussian(start.y, config.sigma_pos[1]),
            sampler.gaussian(start.theta, config.sigma_pos[2]),
        );

        Scenario {
            ground_truth,
            prior,
            controls,
            observations,
        }
    }
}

/// Per-step localization error record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalizationResult {
    pub step: usize,
    pub true_x: f64,
    pub true_y: f64,
    pub true_theta: f64,
    pub est_x: f64,
    pub est_y: f64,
    pub est_theta: f64,
    /// Euclidean distance between the estimate and the truth
    pub position_error: f64,
    /// Absolute wrapped heading difference
    pub heading_error: f64,
    /// Effective sample size of the weights before resampling
    pub effective_sample_size: f64,
    /// Landmark ids matched by the best particle, space separated
    pub associations: String,
}

impl LocalizationResult {
    fn new(
        step: usize,
        truth: &Pose,
        estimate: &Pose,
        effective_sample_size: f64,
        associations: String,
    ) -> Self {
        LocalizationResult {
            step,
            true_x: truth.x,
            true_y: truth.y,
            true_theta: truth.theta,
            est_x: estimate.x,
            est_y: estimate.y,
            est_theta: estimate.theta,
            position_error: truth.distance_to(estimate),
            heading_error: angle_difference(estimate.theta, truth.theta).abs(),
            effective_sample_size,
            associations,
        }
    }
    /// Writes a sequence of results to a CSV file.
    pub fn to_csv<P: AsRef<Path>>(records: &[Self], path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
    /// Reads a sequence of results from a CSV file written by [LocalizationResult::to_csv].
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Self>> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for result in rdr.deserialize() {
            let record: Self = result?;
            records.push(record);
        }
        Ok(records)
    }
}

/// Aggregate error statistics of a run
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub steps: usize,
    pub mean_position_error: f64,
    pub max_position_error: f64,
    pub final_position_error: f64,
    pub mean_heading_error: f64,
}

impl SimulationSummary {
    pub fn from_results(results: &[LocalizationResult]) -> Option<Self> {
        let last = results.last()?;
        let n = results.len() as f64;
        Some(SimulationSummary {
            steps: results.len(),
            mean_position_error: results.iter().map(|r| r.position_error).sum::<f64>() / n,
            max_position_error: results
                .iter()
                .map(|r| r.position_error)
                .fold(0.0, f64::max),
            final_position_error: last.position_error,
            mean_heading_error: results.iter().map(|r| r.heading_error).sum::<f64>() / n,
        })
    }
}

/// Run the particle filter over a scenario
///
/// The filter is initialized from the scenario prior, then at every step it predicts with the previous
/// control (from step 1 on), updates its weights with the step's observations, records the estimate of the
/// highest-weight particle with its association trace, and resamples.
///
/// # Arguments
/// * `config` - Simulation settings (noise levels, sensor range, filter configuration)
/// * `scenario` - Ground truth and sensor streams
/// * `map` - Landmark map used to generate the scenario
/// * `sampler` - Random source of the filter
pub fn run_simulation<S: Sampler>(
    config: &SimulationConfig,
    scenario: &Scenario,
    map: &Map,
    sampler: S,
) -> Result<Vec<LocalizationResult>> {
    scenario.validate()?;
    let mut pf = ParticleFilter::new(config.filter.clone(), sampler)?;
    let prior = scenario.prior;
    pf.initialize(prior.x, prior.y, prior.theta, config.sigma_pos)?;

    let mut results = Vec::with_capacity(scenario.ground_truth.len());
    for (step, (truth, observations)) in scenario
        .ground_truth
        .iter()
        .zip(scenario.observations.iter())
        .enumerate()
    {
        if let Some(control) = step.checked_sub(1).and_then(|i| scenario.controls.get(i)) {
            pf.predict(
                config.dt,
                config.sigma_pos,
                control.velocity,
                control.yaw_rate,
            )?;
        }
        pf.update_weights(config.sensor_range, config.sigma_landmark, observations, map)?;
        let ess = pf.effective_sample_size();

        let (best_id, best_pose) = pf
            .best_particle()
            .map(|p| (p.id, p.pose))
            .ok_or(FilterError::EmptyParticleSet)?;
        let associated = associate_observations(&best_pose, config.sensor_range, observations, map);
        let matched: Vec<&LandmarkObservation> =
            associated.iter().filter(|o| o.id.is_some()).collect();
        pf.set_associations(
            best_id,
            matched.iter().filter_map(|o| o.id).collect(),
            matched.iter().map(|o| o.x).collect(),
            matched.iter().map(|o| o.y).collect(),
        )?;
        let trace = pf.particles()[best_id].trace().associations_string();

        let estimate = match pf.config().averaging_strategy {
            ParticleAveragingStrategy::HighestWeight => best_pose,
            strategy => pf.estimate_with(strategy).unwrap_or(best_pose),
        };
        let result = LocalizationResult::new(step, truth, &estimate, ess, trace);
        debug!(
            "step {}: error {:.3}, heading error {:.4}, ess {:.1}",
            step, result.position_error, result.heading_error, ess
        );
        results.push(result);

        pf.resample()?;
    }

    if let Some(summary) = SimulationSummary::from_results(&results) {
        info!(
            "Simulation finished: {} steps, mean error {:.3}, max error {:.3}, final error {:.3}",
            summary.steps,
            summary.mean_position_error,
            summary.max_position_error,
            summary.final_position_error
        );
    }
    Ok(results)
}

/// Generate a map and scenario from the configuration and run the filter over them
pub fn simulate(config: &SimulationConfig, map: &Map) -> Result<Vec<LocalizationResult>> {
    config.filter.validate()?;
    let mut scenario_sampler = RandSampler::from_seed(config.seed);
    let scenario = Scenario::generate(config, map, &mut scenario_sampler);
    let filter_sampler = RandSampler::from_seed(config.seed.wrapping_add(1));
    run_simulation(config, &scenario, map, filter_sampler)
}
