//! Monte Carlo localization toolbox for planar landmark maps
//!
//! This crate provides a particle filter that estimates the 2D pose (position and heading) of a moving
//! agent relative to a fixed, known map of point landmarks. The filter fuses a noisy kinematic motion
//! model with noisy observations of landmarks made in the agent's own (vehicle) frame. It is the classic
//! recursive-Bayesian localization core used in mobile robotics and is intentionally not a SLAM system:
//! the map is given, fixed, and known a priori.
//!
//! This crate is primarily built off of the following dependencies:
//! - [`nalgebra`](https://crates.io/crates/nalgebra): Provides the 2D rotation used for frame transforms.
//! - [`rand`](https://crates.io/crates/rand) and [`rand_distr`](https://crates.io/crates/rand_distr): Provides the
//!   Gaussian and categorical draws used by initialization, prediction, and resampling.
//! - [`serde`](https://crates.io/crates/serde) and [`csv`](https://crates.io/crates/csv): Configuration and map I/O.
//!
//! ## Crate overview
//!
//! This crate is organized into several modules:
//! - [association]: Nearest-neighbor data association between observations and landmarks.
//! - [config]: Filter configuration and its file representations.
//! - [error]: The crate error type.
//! - [filter]: The particle filter itself ([filter::ParticleFilter]) and its four-stage cycle.
//! - [map]: Landmark and observation types plus the landmark [map::Map].
//! - [motion]: The constant-turn-rate motion model used by the prediction step.
//! - [particle]: Particle and particle-set helpers, including point estimate strategies.
//! - [sampling]: The injectable random source ([sampling::Sampler]).
//! - [sim]: A synthetic simulation harness used by the `mcl` binary and the integration tests.
//! - [update]: The importance weight computation (range gating, frame transform, likelihood).
//!
//! ## The filter cycle
//!
//! The filter is initialized once from a prior pose estimate $(x_0, y_0, \theta_0)$ and per-axis
//! uncertainties, after which every time step runs three stages:
//!
//! 1. **Predict**: every particle is propagated by the control input $(v, \omega)$ over $\Delta t$ and
//!    perturbed with Gaussian process noise.
//! 2. **Update weights**: observations are transformed into the map frame for every particle, associated
//!    with their nearest in-range landmark, and scored with a bivariate Gaussian likelihood.
//! 3. **Resample**: a new particle set is drawn with replacement, with probability proportional to weight.
//!
//! ### Motion model
//!
//! For a yaw rate magnitude below a small threshold the particle moves in a straight line:
//!
//! $$
//! x(+) = x(-) + v \Delta t \cos\theta, \quad y(+) = y(-) + v \Delta t \sin\theta
//! $$
//!
//! Otherwise the constant turn rate model is used:
//!
//! $$
//! x(+) = x(-) + \frac{v}{\omega}\left(\sin(\theta + \omega\Delta t) - \sin\theta\right), \quad
//! y(+) = y(-) + \frac{v}{\omega}\left(\cos\theta - \cos(\theta + \omega\Delta t)\right), \quad
//! \theta(+) = \theta(-) + \omega\Delta t
//! $$
//!
//! ### Observation model
//!
//! A vehicle-frame observation $(x_o, y_o)$ seen from particle $(x_p, y_p, \theta)$ lies in the map frame at
//!
//! $$
//! \begin{bmatrix} x_m \\\\ y_m \end{bmatrix} = \begin{bmatrix} x_p \\\\ y_p \end{bmatrix} +
//! \begin{bmatrix} \cos\theta & -\sin\theta \\\\ \sin\theta & \cos\theta \end{bmatrix}
//! \begin{bmatrix} x_o \\\\ y_o \end{bmatrix}
//! $$
//!
//! and the weight of the particle is the product over observations of
//!
//! $$
//! p(x_m, y_m) = \frac{1}{2\pi\sigma_x\sigma_y} \exp\left(-\left(\frac{(x_m - \mu_x)^2}{2\sigma_x^2} + \frac{(y_m - \mu_y)^2}{2\sigma_y^2}\right)\right)
//! $$
//!
//! where $(\mu_x, \mu_y)$ is the associated landmark.
//!
//! ## Coordinate conventions
//!
//! All poses are in the map frame, in consistent length units (the crate never assumes meters). Headings are
//! in radians, measured counter-clockwise from the map x-axis, and are kept wrapped to $(-\pi, \pi]$ by
//! the prediction step.
pub mod association;
pub mod config;
pub mod error;
pub mod filter;
pub mod map;
pub mod motion;
pub mod particle;
pub mod sampling;
pub mod sim;
pub mod update;

use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};
use std::fmt::{self, Display};

pub use error::{FilterError, Result};
pub use filter::ParticleFilter;

/// Planar pose of the agent (or of a particle) in the map frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position along the map x-axis
    pub x: f64,
    /// Position along the map y-axis
    pub y: f64,
    /// Heading in radians, counter-clockwise from the map x-axis
    pub theta: f64,
}
impl Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pose {{ x: {:.4}, y: {:.4}, theta: {:.4} rad }}",
            self.x, self.y, self.theta
        )
    }
}
impl From<(f64, f64, f64)> for Pose {
    fn from(tuple: (f64, f64, f64)) -> Self {
        Pose::new(tuple.0, tuple.1, tuple.2)
    }
}
impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Pose {
        Pose { x, y, theta }
    }
    /// Euclidean distance between the positions of two poses (heading is ignored)
    pub fn distance_to(&self, other: &Pose) -> f64 {
        distance(self.x, self.y, other.x, other.y)
    }
}
/// Euclidean distance between two points in the plane
///
/// # Example
/// ```rust
/// use mcl::distance;
/// assert_eq!(distance(0.0, 0.0, 3.0, 4.0), 5.0);
/// ```
pub fn distance(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    (x2 - x1).hypot(y2 - y1)
}
/// Wrap an angle to the range $(-\pi, \pi]$ radians
///
/// The wrap is computed in closed form, so it runs in constant time for any input. Non-finite angles
/// yield NaN.
///
/// # Arguments
/// * `angle` - The angle to be wrapped, in radians.
/// # Returns
/// * The wrapped angle, which will be in the range (-π, π] radians.
/// # Example
/// ```rust
/// use mcl::wrap_to_pi;
/// use std::f64::consts::PI;
/// let angle = 3.0 * PI / 2.0; // radians
/// let wrapped_angle = wrap_to_pi(angle);
/// assert!((wrapped_angle + PI / 2.0).abs() < 1e-12);
/// ```
pub fn wrap_to_pi(angle: f64) -> f64 {
    let wrapped = PI - (PI - angle).rem_euclid(TAU);
    // rem_euclid may round up to TAU
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}
/// Smallest signed difference `a - b` between two headings, in $(-\pi, \pi]$
pub fn angle_difference(a: f64, b: f64) -> f64 {
    wrap_to_pi(a - b)
}
