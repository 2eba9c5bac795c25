//! Kinematic motion model for the prediction step
//!
//! Particles are advanced with a constant turn rate and velocity (bicycle) model. When the magnitude of the
//! yaw rate falls below a threshold the turn is treated as straight-line motion, which avoids the division
//! by a vanishing yaw rate in the closed-form turn equations.
use serde::{Deserialize, Serialize};

use crate::Pose;
use crate::error::{FilterError, Result, check_std_dev};
use crate::sampling::Sampler;

/// Yaw rate magnitude below which motion is treated as straight-line
pub const YAW_RATE_ZERO_THRESHOLD: f64 = 1e-4;

/// Control input applied over one prediction step
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlInput {
    /// Forward speed along the heading
    pub velocity: f64,
    /// Turn rate in radians per unit time
    pub yaw_rate: f64,
}
impl ControlInput {
    pub fn new(velocity: f64, yaw_rate: f64) -> ControlInput {
        ControlInput { velocity, yaw_rate }
    }
    pub fn validate(&self) -> Result<()> {
        if !self.velocity.is_finite() {
            return Err(FilterError::InvalidControl {
                name: "velocity",
                value: self.velocity,
            });
        }
        if !self.yaw_rate.is_finite() {
            return Err(FilterError::InvalidControl {
                name: "yaw_rate",
                value: self.yaw_rate,
            });
        }
        Ok(())
    }
}

/// Per-axis process noise standard deviations `(x, y, theta)`
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionNoise {
    pub std_x: f64,
    pub std_y: f64,
    pub std_theta: f64,
}
impl MotionNoise {
    pub fn new(std_x: f64, std_y: f64, std_theta: f64) -> MotionNoise {
        MotionNoise {
            std_x,
            std_y,
            std_theta,
        }
    }
    pub fn validate(&self) -> Result<()> {
        check_std_dev("std_x", self.std_x)?;
        check_std_dev("std_y", self.std_y)?;
        check_std_dev("std_theta", self.std_theta)
    }
    /// Perturb a pose with independent zero-mean Gaussian noise on each axis
    pub fn apply<S: Sampler + ?Sized>(&self, pose: &Pose, sampler: &mut S) -> Pose {
        Pose {
            x: pose.x + sampler.gaussian(0.0, self.std_x),
            y: pose.y + sampler.gaussian(0.0, self.std_y),
            theta: pose.theta + sampler.gaussian(0.0, self.std_theta),
        }
    }
}
impl From<[f64; 3]> for MotionNoise {
    fn from(std: [f64; 3]) -> Self {
        MotionNoise::new(std[0], std[1], std[2])
    }
}

/// Deterministic pose propagation over `dt`
///
/// # Arguments
/// * `pose` - The pose to propagate
/// * `control` - Velocity and yaw rate held constant over the step
/// * `dt` - Time step
/// * `yaw_rate_threshold` - Yaw rate magnitude below which the straight-line branch is used
///
/// The heading is left unwrapped; callers decide how to normalize it.
pub fn propagate(pose: &Pose, control: &ControlInput, dt: f64, yaw_rate_threshold: f64) -> Pose {
    let ControlInput { velocity, yaw_rate } = *control;
    if yaw_rate.abs() < yaw_rate_threshold {
        Pose {
            x: pose.x + velocity * dt * pose.theta.cos(),
            y: pose.y + velocity * dt * pose.theta.sin(),
            theta: pose.theta,
        }
    } else {
        let radius = velocity / yaw_rate;
        let theta_new = pose.theta + yaw_rate * dt;
        Pose {
            x: pose.x + radius * (theta_new.sin() - pose.theta.sin()),
            y: pose.y + radius * (pose.theta.cos() - theta_new.cos()),
            theta: theta_new,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::RandSampler;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    #[test]
    fn test_straight_line_motion() {
        let pose = Pose::new(2.0, -3.0, 0.0);
        let moved = propagate(
            &pose,
            &ControlInput::new(10.0, 0.0),
            1.0,
            YAW_RATE_ZERO_THRESHOLD,
        );
        assert_eq!(moved, Pose::new(12.0, -3.0, 0.0));
    }

    #[test]
    fn test_straight_line_motion_along_heading() {
        let pose = Pose::new(0.0, 0.0, FRAC_PI_2);
        let moved = propagate(
            &pose,
            &ControlInput::new(2.0, 0.0),
            3.0,
            YAW_RATE_ZERO_THRESHOLD,
        );
        assert_approx_eq!(moved.x, 0.0, 1e-12);
        assert_approx_eq!(moved.y, 6.0, 1e-12);
        assert_eq!(moved.theta, FRAC_PI_2);
    }

    #[test]
    fn test_tiny_yaw_rate_uses_straight_line() {
        let pose = Pose::new(0.0, 0.0, 0.3);
        let moved = propagate(
            &pose,
            &ControlInput::new(5.0, 5e-5),
            1.0,
            YAW_RATE_ZERO_THRESHOLD,
        );
        assert_eq!(moved.theta, 0.3);
        assert_approx_eq!(moved.x, 5.0 * 0.3_f64.cos(), 1e-12);
        assert_approx_eq!(moved.y, 5.0 * 0.3_f64.sin(), 1e-12);
    }

    #[test]
    fn test_curved_motion() {
        let pose = Pose::new(1.0, 1.0, 0.0);
        let (v, w, dt) = (1.0, FRAC_PI_4, 2.0);
        let moved = propagate(&pose, &ControlInput::new(v, w), dt, YAW_RATE_ZERO_THRESHOLD);
        assert_approx_eq!(moved.theta, FRAC_PI_2, 1e-12);
        // Quarter circle of radius v / w starting along +x
        let radius = v / w;
        assert_approx_eq!(moved.x, 1.0 + radius, 1e-12);
        assert_approx_eq!(moved.y, 1.0 + radius, 1e-12);
    }

    #[test]
    fn test_curved_motion_approaches_straight_line() {
        let pose = Pose::new(0.0, 0.0, 0.7);
        let control = ControlInput::new(3.0, 2e-4);
        let curved = propagate(&pose, &control, 1.0, YAW_RATE_ZERO_THRESHOLD);
        let straight = propagate(&pose, &control, 1.0, 1e-3);
        assert_approx_eq!(curved.x, straight.x, 1e-3);
        assert_approx_eq!(curved.y, straight.y, 1e-3);
    }

    #[test]
    fn test_zero_noise_is_identity() {
        let mut sampler = RandSampler::from_seed(11);
        let pose = Pose::new(1.0, 2.0, 3.0);
        let noisy = MotionNoise::new(0.0, 0.0, 0.0).apply(&pose, &mut sampler);
        assert_eq!(noisy, pose);
    }

    #[test]
    fn test_noise_spread() {
        let mut sampler = RandSampler::from_seed(12);
        let noise = MotionNoise::new(0.5, 0.5, 0.05);
        let pose = Pose::default();
        let n = 5000;
        let xs: Vec<f64> = (0..n).map(|_| noise.apply(&pose, &mut sampler).x).collect();
        let mean = xs.iter().sum::<f64>() / n as f64;
        let std = (xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64).sqrt();
        assert_approx_eq!(mean, 0.0, 0.05);
        assert_approx_eq!(std, 0.5, 0.05);
    }

    #[test]
    fn test_validation() {
        assert!(MotionNoise::new(0.3, 0.3, 0.01).validate().is_ok());
        assert!(MotionNoise::new(0.3, -0.3, 0.01).validate().is_err());
        assert!(ControlInput::new(1.0, 0.1).validate().is_ok());
        assert!(ControlInput::new(f64::NAN, 0.1).validate().is_err());
        assert!(ControlInput::new(1.0, f64::INFINITY).validate().is_err());
    }
}
