//! Filter configuration
//!
//! [FilterConfig] holds the design constants of the filter. Every field has a default, so a configuration
//! file only needs the values it overrides:
//!
//! ```toml
//! num_particles = 500
//! unmatched_policy = "skip"
//! ```
//!
//! Configurations can be read and written as JSON, YAML, or TOML; the format is chosen by file extension.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{FilterError, Result};
use crate::motion::YAW_RATE_ZERO_THRESHOLD;
use crate::particle::ParticleAveragingStrategy;
pub use crate::update::UnmatchedPolicy;

/// Default number of particles
fn default_num_particles() -> usize {
    100
}

fn default_yaw_rate_threshold() -> f64 {
    YAW_RATE_ZERO_THRESHOLD
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Number of particles, fixed for the lifetime of the filter
    #[serde(default = "default_num_particles")]
    pub num_particles: usize,

    /// Yaw rate magnitude below which prediction uses the straight-line motion branch; must be positive
    #[serde(default = "default_yaw_rate_threshold")]
    pub yaw_rate_threshold: f64,

    /// Scoring of observations with no landmark in sensor range
    #[serde(default)]
    pub unmatched_policy: UnmatchedPolicy,

    /// Point estimate reported by [crate::filter::ParticleFilter::estimate]
    #[serde(default)]
    pub averaging_strategy: ParticleAveragingStrategy,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            num_particles: default_num_particles(),
            yaw_rate_threshold: default_yaw_rate_threshold(),
            unmatched_policy: UnmatchedPolicy::default(),
            averaging_strategy: ParticleAveragingStrategy::default(),
        }
    }
}

impl FilterConfig {
    /// Configuration with the given particle count and defaults elsewhere
    pub fn with_particles(num_particles: usize) -> Self {
        FilterConfig {
            num_particles,
            ..Default::default()
        }
    }
    pub fn validate(&self) -> Result<()> {
        if self.num_particles == 0 {
            return Err(FilterError::InvalidParticleCount(self.num_particles));
        }
        if !(self.yaw_rate_threshold.is_finite() && self.yaw_rate_threshold > 0.0) {
            return Err(FilterError::Config(format!(
                "yaw_rate_threshold must be finite and positive, got {}",
                self.yaw_rate_threshold
            )));
        }
        Ok(())
    }
    /// Write the configuration to a file, choosing the format by extension (.json/.yaml/.yml/.toml)
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_config(self, path.as_ref())
    }
    /// Read the configuration from a file, choosing the format by extension (.json/.yaml/.yml/.toml)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_config(path.as_ref())
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
}

/// Serialize any configuration type by file extension
pub(crate) fn write_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    match extension(path).as_deref() {
        Some("json") => {
            let file = File::create(path)?;
            serde_json::to_writer_pretty(file, config)?;
            Ok(())
        }
        Some("yaml") | Some("yml") => {
            let mut file = File::create(path)?;
            let s = serde_yaml::to_string(config)?;
            file.write_all(s.as_bytes())?;
            Ok(())
        }
        Some("toml") => {
            let mut file = File::create(path)?;
            let s = toml::to_string(config)?;
            file.write_all(s.as_bytes())?;
            Ok(())
        }
        _ => Err(FilterError::Config(format!(
            "unsupported file extension: {}",
            path.display()
        ))),
    }
}

/// Deserialize any configuration type by file extension
pub(crate) fn read_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    match extension(path).as_deref() {
        Some("json") => {
            let file = File::open(path)?;
            Ok(serde_json::from_reader(file)?)
        }
        Some("yaml") | Some("yml") => {
            let file = File::open(path)?;
            Ok(serde_yaml::from_reader(file)?)
        }
        Some("toml") => {
            let mut s = String::new();
            File::open(path)?.read_to_string(&mut s)?;
            Ok(toml::from_str(&s)?)
        }
        _ => Err(FilterError::Config(format!(
            "unsupported file extension: {}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom() -> FilterConfig {
        FilterConfig {
            num_particles: 250,
            yaw_rate_threshold: 1e-3,
            unmatched_policy: UnmatchedPolicy::Skip,
            averaging_strategy: ParticleAveragingStrategy::HighestWeight,
        }
    }

    #[test]
    fn test_defaults() {
        let config = FilterConfig::default();
        assert_eq!(config.num_particles, 100);
        assert_eq!(config.yaw_rate_threshold, 1e-4);
        assert_eq!(config.unmatched_policy, UnmatchedPolicy::ZeroWeight);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            FilterConfig::with_particles(0).validate(),
            Err(FilterError::InvalidParticleCount(0))
        ));
        for threshold in [-1.0, 0.0, f64::INFINITY] {
            let config = FilterConfig {
                yaw_rate_threshold: threshold,
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(FilterError::Config(_))),
                "threshold {threshold} accepted"
            );
        }
    }

    #[test]
    fn test_round_trip_all_formats() {
        for ext in ["json", "yaml", "yml", "toml"] {
            let path = std::env::temp_dir().join(format!("mcl_filter_config.{ext}"));
            custom().to_file(&path).expect("Failed to write config");
            let read = FilterConfig::from_file(&path).expect("Failed to read config");
            assert_eq!(read, custom(), "round trip failed for {ext}");
            let _ = std::fs::remove_file(&path);
        }
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let path = std::env::temp_dir().join("mcl_filter_config_partial.toml");
        std::fs::write(&path, "num_particles = 42\nunmatched_policy = \"skip\"\n").unwrap();
        let config = FilterConfig::from_file(&path).expect("Failed to read config");
        assert_eq!(config.num_particles, 42);
        assert_eq!(config.unmatched_policy, UnmatchedPolicy::Skip);
        assert_eq!(config.yaw_rate_threshold, YAW_RATE_ZERO_THRESHOLD);
        assert_eq!(
            config.averaging_strategy,
            ParticleAveragingStrategy::WeightedAverage
        );
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_unsupported_extension() {
        let path = std::env::temp_dir().join("mcl_filter_config.ini");
        assert!(matches!(
            FilterConfig::default().to_file(&path),
            Err(FilterError::Config(_))
        ));
        assert!(FilterConfig::from_file(&path).is_err());
    }
}
