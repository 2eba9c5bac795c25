//! End-to-end tests of the localization filter
//!
//! These tests drive the public API the way an external caller would: build a map, seed the filter, and run
//! predict/update/resample cycles against synthetic observations. Thresholds are empirical regression bounds
//! for the fixed seeds used here, not design goals.
use assert_approx_eq::assert_approx_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mcl::association::associate;
use mcl::config::FilterConfig;
use mcl::map::{Landmark, LandmarkObservation, Map};
use mcl::sampling::{RandSampler, Sampler};
use mcl::sim::{
    LocalizationResult, Scenario, SimulationConfig, SimulationSummary, observe, random_map,
    run_simulation, simulate,
};
use mcl::{FilterError, ParticleFilter, Pose, angle_difference, distance};

fn landmark_field() -> Map {
    Map::new(vec![
        Landmark::new(1, 0.0, 0.0),
        Landmark::new(2, 20.0, 0.0),
        Landmark::new(3, 20.0, 15.0),
        Landmark::new(4, 0.0, 15.0),
        Landmark::new(5, 12.0, 8.0),
        Landmark::new(6, 5.0, -6.0),
    ])
}

fn observations_from(truth: &Pose, map: &Map, sensor_range: f64) -> Vec<LandmarkObservation> {
    map.landmarks()
        .iter()
        .filter(|l| distance(truth.x, truth.y, l.x, l.y) < sensor_range)
        .map(|l| observe(truth, l))
        .collect()
}

#[test]
fn static_scene_converges_to_truth() {
    let map = landmark_field();
    let truth = Pose::new(10.0, 5.0, 0.3);
    let observations = observations_from(&truth, &map, 50.0);
    assert_eq!(observations.len(), 6);

    let mut pf = ParticleFilter::with_seed(FilterConfig::with_particles(500), 11).unwrap();
    pf.initialize(10.6, 4.5, 0.38, [1.0, 1.0, 0.1]).unwrap();
    for _ in 0..20 {
        pf.predict(0.1, [0.05, 0.05, 0.005], 0.0, 0.0).unwrap();
        pf.update_weights(50.0, [0.3, 0.3], &observations, &map)
            .unwrap();
        pf.resample().unwrap();
    }
    let estimate = pf.estimate().unwrap();
    assert!(
        estimate.distance_to(&truth) < 0.3,
        "estimate {estimate} too far from {truth}"
    );
    assert!(angle_difference(estimate.theta, truth.theta).abs() < 0.05);
}

#[test]
fn moving_vehicle_is_tracked() {
    let map = landmark_field();
    let mut truth = Pose::new(2.0, 3.0, 0.0);
    let (velocity, yaw_rate, dt) = (4.0, 0.2, 0.1);

    let mut pf = ParticleFilter::with_seed(FilterConfig::with_particles(300), 5).unwrap();
    pf.initialize(truth.x, truth.y, truth.theta, [0.3, 0.3, 0.01])
        .unwrap();
    for step in 0..30 {
        if step > 0 {
            truth = mcl::motion::propagate(
                &truth,
                &mcl::motion::ControlInput::new(velocity, yaw_rate),
                dt,
                1e-4,
            );
            pf.predict(dt, [0.1, 0.1, 0.005], velocity, yaw_rate)
                .unwrap();
        }
        let observations = observations_from(&truth, &map, 30.0);
        pf.update_weights(30.0, [0.3, 0.3], &observations, &map)
            .unwrap();
        let best = pf.best_particle().unwrap();
        assert!(best.pose.distance_to(&truth) < 1.0, "step {step}");
        pf.resample().unwrap();
    }
}

/// Places alternating particles at `mean ± std` and delegates categorical draws to a seeded generator
struct TwoPointSampler {
    inner: RandSampler,
    upper: bool,
}

impl Sampler for TwoPointSampler {
    fn gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        if std_dev == 0.0 {
            return mean;
        }
        self.upper = !self.upper;
        if self.upper { mean + std_dev } else { mean - std_dev }
    }
    fn categorical(&mut self, weights: &[f64], draws: usize) -> mcl::Result<Vec<usize>> {
        self.inner.categorical(weights, draws)
    }
    fn uniform_index(&mut self, upper: usize) -> usize {
        self.inner.uniform_index(upper)
    }
}

#[test]
fn resampling_is_proportional_to_weight() {
    let n = 4000;
    let sampler = TwoPointSampler {
        inner: RandSampler::from_seed(3),
        upper: false,
    };
    let mut pf = ParticleFilter::new(FilterConfig::with_particles(n), sampler).unwrap();
    pf.initialize(0.0, 0.0, 0.0, [1.0, 0.0, 0.0]).unwrap();
    let at_one = pf.particles().iter().filter(|p| p.pose.x == 1.0).count();
    assert_eq!(at_one, n / 2);

    // Particles at x = 1 see the landmark exactly; those at x = -1 are 2 units off
    let map = Map::new(vec![Landmark::new(1, 5.0, 0.0)]);
    pf.update_weights(50.0, [2.0, 2.0], &[LandmarkObservation::new(4.0, 0.0)], &map)
        .unwrap();
    let ratio = (-0.5_f64).exp();
    let near = pf.weights().iter().copied().fold(0.0, f64::max);
    let far = pf
        .weights()
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    assert_approx_eq!(far / near, ratio, 1e-12);

    pf.resample().unwrap();
    assert_eq!(pf.particles().len(), n);
    let fraction =
        pf.particles().iter().filter(|p| p.pose.x == 1.0).count() as f64 / n as f64;
    assert_approx_eq!(fraction, 1.0 / (1.0 + ratio), 0.03);
    for (i, particle) in pf.particles().iter().enumerate() {
        assert_eq!(particle.id, i);
    }
}

#[test]
fn resample_keeps_cardinality_after_degenerate_weights() {
    let map = Map::new(vec![Landmark::new(1, 1000.0, 1000.0)]);
    let mut pf = ParticleFilter::with_seed(FilterConfig::with_particles(64), 8).unwrap();
    pf.initialize(0.0, 0.0, 0.0, [1.0, 1.0, 0.1]).unwrap();
    pf.update_weights(10.0, [0.3, 0.3], &[LandmarkObservation::new(1.0, 1.0)], &map)
        .unwrap();
    assert!(pf.weights().iter().all(|w| *w == 0.0));
    pf.resample().unwrap();
    assert_eq!(pf.particles().len(), 64);
    assert!(pf.weights().is_empty());
    assert!(matches!(
        pf.resample(),
        Err(FilterError::WeightsNotUpdated {
            expected: 64,
            found: 0
        })
    ));
}

#[test]
fn sharp_observations_overflow_without_breaking_resample() {
    let map = landmark_field();
    let truth = Pose::new(10.0, 5.0, 0.3);
    let mut observations = Vec::new();
    for _ in 0..20 {
        observations.extend(observations_from(&truth, &map, 50.0));
    }
    assert_eq!(observations.len(), 120);

    let mut pf = ParticleFilter::with_seed(FilterConfig::with_particles(8), 21).unwrap();
    pf.initialize(truth.x, truth.y, truth.theta, [0.0; 3]).unwrap();
    pf.update_weights(50.0, [0.01, 0.01], &observations, &map)
        .unwrap();
    assert!(pf.weights().iter().all(|w| w.is_infinite()));
    pf.resample().unwrap();
    assert_eq!(pf.particles().len(), 8);
    let estimate = pf.estimate().unwrap();
    assert_approx_eq!(estimate.x, truth.x, 1e-9);
    assert_approx_eq!(estimate.theta, truth.theta, 1e-9);
}

#[test]
fn association_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(2024);
    for _ in 0..200 {
        let num_candidates = rng.random_range(0..12);
        let candidates: Vec<LandmarkObservation> = (0..num_candidates)
            .map(|i| {
                LandmarkObservation::with_id(
                    i as u32 + 1,
                    rng.random_range(-20.0..20.0),
                    rng.random_range(-20.0..20.0),
                )
            })
            .collect();
        let observations: Vec<LandmarkObservation> = (0..rng.random_range(0..8))
            .map(|_| {
                LandmarkObservation::new(rng.random_range(-25.0..25.0), rng.random_range(-25.0..25.0))
            })
            .collect();

        let associated = associate(&candidates, &observations);
        assert_eq!(associated.len(), observations.len());
        for (obs, tagged) in observations.iter().zip(associated.iter()) {
            assert_eq!((obs.x, obs.y), (tagged.x, tagged.y));
            let mut expected: Option<(u32, f64)> = None;
            for c in &candidates {
                let d = distance(c.x, c.y, obs.x, obs.y);
                if expected.is_none_or(|(_, best)| d < best) {
                    expected = c.id.map(|id| (id, d));
                }
            }
            assert_eq!(tagged.id, expected.map(|(id, _)| id));
        }
    }
}

#[test]
fn simulation_from_map_file() {
    let dir = std::env::temp_dir();
    let map_path = dir.join("mcl_integration_map.csv");
    let results_path = dir.join("mcl_integration_results.csv");

    let mut sampler = RandSampler::from_seed(77);
    random_map(30, 50.0, &mut sampler)
        .expect("Failed to generate map")
        .to_csv(&map_path)
        .expect("Failed to write map");
    let map = Map::from_csv(&map_path).expect("Failed to read map");
    assert_eq!(map.len(), 30);

    let config = SimulationConfig {
        num_steps: 60,
        filter: FilterConfig::with_particles(150),
        ..Default::default()
    };
    let results = simulate(&config, &map).expect("simulation failed");
    assert_eq!(results.len(), 60);
    LocalizationResult::to_csv(&results, &results_path).expect("Failed to write results");
    let read = LocalizationResult::from_csv(&results_path).expect("Failed to read results");
    assert_eq!(read.len(), results.len());
    assert_eq!(read[10].step, 10);

    let summary = SimulationSummary::from_results(&read).unwrap();
    assert!(summary.mean_position_error < 1.5, "{summary:?}");

    let _ = std::fs::remove_file(&map_path);
    let _ = std::fs::remove_file(&results_path);
}

#[test]
fn seeded_runs_are_reproducible() {
    let config = SimulationConfig {
        num_steps: 15,
        filter: FilterConfig::with_particles(50),
        ..Default::default()
    };
    let mut sampler = RandSampler::from_seed(1);
    let map = random_map(20, 40.0, &mut sampler).unwrap();
    let scenario = Scenario::generate(&config, &map, &mut RandSampler::from_seed(config.seed));
    let a = run_simulation(&config, &scenario, &map, RandSampler::from_seed(9)).unwrap();
    let b = run_simulation(&config, &scenario, &map, RandSampler::from_seed(9)).unwrap();
    assert_eq!(a, b);
}
