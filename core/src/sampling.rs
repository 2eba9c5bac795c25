//! Random draws used by the particle filter
//!
//! The filter never owns a global random source. Every stage that needs randomness draws through a
//! [Sampler], which the caller constructs and hands to [crate::filter::ParticleFilter]. The default
//! implementation, [RandSampler], wraps any [rand::Rng] and can be seeded for reproducible runs.
//!
//! ```rust
//! use mcl::sampling::{RandSampler, Sampler};
//!
//! let mut a = RandSampler::from_seed(7);
//! let mut b = RandSampler::from_seed(7);
//! assert_eq!(a.gaussian(0.0, 1.0), b.gaussian(0.0, 1.0));
//! ```
use rand::distr::weighted::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

use crate::error::{FilterError, Result};

/// Source of the Gaussian and categorical draws consumed by the filter
pub trait Sampler {
    /// Draw from `Normal(mean, std_dev)`. A zero standard deviation returns `mean` exactly.
    fn gaussian(&mut self, mean: f64, std_dev: f64) -> f64;
    /// Draw `draws` independent indices with probability proportional to `weights`.
    ///
    /// Returns [FilterError::DegenerateWeights] when the weights do not define a distribution
    /// (empty, all zero, negative, or NaN). Weights that overflowed to `+inf` are handled as in
    /// [rescale_weights].
    fn categorical(&mut self, weights: &[f64], draws: usize) -> Result<Vec<usize>>;
    /// Draw an index uniformly from `0..upper`
    fn uniform_index(&mut self, upper: usize) -> usize;
}

impl<S: Sampler + ?Sized> Sampler for &mut S {
    fn gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        (**self).gaussian(mean, std_dev)
    }
    fn categorical(&mut self, weights: &[f64], draws: usize) -> Result<Vec<usize>> {
        (**self).categorical(weights, draws)
    }
    fn uniform_index(&mut self, upper: usize) -> usize {
        (**self).uniform_index(upper)
    }
}

/// Scale weights so the largest is 1, keeping their ratios
///
/// Likelihood products overflow to `+inf` when many sharp observations agree; in that case the infinite
/// entries share the mass equally and every finite entry gets none.
///
/// # Errors
/// Returns [FilterError::DegenerateWeights] for an empty slice, any negative or NaN weight, or all-zero weights.
pub fn rescale_weights(weights: &[f64]) -> Result<Vec<f64>> {
    if weights.is_empty() {
        return Err(FilterError::DegenerateWeights("no weights".to_string()));
    }
    if let Some(bad) = weights.iter().find(|w| w.is_nan() || **w < 0.0) {
        return Err(FilterError::DegenerateWeights(format!(
            "invalid weight {bad}"
        )));
    }
    if weights.iter().any(|w| w.is_infinite()) {
        return Ok(weights
            .iter()
            .map(|w| if w.is_infinite() { 1.0 } else { 0.0 })
            .collect());
    }
    let max = weights.iter().copied().fold(0.0, f64::max);
    if max == 0.0 {
        return Err(FilterError::DegenerateWeights(
            "all weights are zero".to_string(),
        ));
    }
    Ok(weights.iter().map(|w| w / max).collect())
}

/// [Sampler] backed by a [rand] generator
#[derive(Clone, Debug)]
pub struct RandSampler<R: Rng = StdRng> {
    rng: R,
}

impl RandSampler<StdRng> {
    /// Create a sampler with a specific random seed
    ///
    /// This is useful for reproducible tests.
    pub fn from_seed(seed: u64) -> Self {
        RandSampler {
            rng: StdRng::seed_from_u64(seed),
        }
    }
    /// Create a sampler seeded from the thread-local generator
    pub fn from_entropy() -> Self {
        Self::from_seed(rand::random())
    }
}

impl Default for RandSampler<StdRng> {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl<R: Rng> RandSampler<R> {
    pub fn new(rng: R) -> Self {
        RandSampler { rng }
    }
    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }
}

impl<R: Rng> Sampler for RandSampler<R> {
    fn gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        if std_dev == 0.0 {
            return mean;
        }
        let z: f64 = StandardNormal.sample(&mut self.rng);
        mean + std_dev * z
    }

    fn categorical(&mut self, weights: &[f64], draws: usize) -> Result<Vec<usize>> {
        let scaled = rescale_weights(weights)?;
        let distribution = WeightedIndex::<f64>::new(&scaled)
            .map_err(|e| FilterError::DegenerateWeights(e.to_string()))?;
        Ok((0..draws)
            .map(|_| distribution.sample(&mut self.rng))
            .collect())
    }

    fn uniform_index(&mut self, upper: usize) -> usize {
        self.rng.random_range(0..upper)
    }
}
