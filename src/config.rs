use serde_derive::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Error;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// expected frame width in pixels
    pub width: usize,
    /// expected frame height in pixels
    pub height: usize,
    pub segmentation: SegmentationConfig,
    pub tracking: TrackingConfig,
    pub fitting: FittingConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Largest depth step between neighbouring pixels of one region
    pub max_depth_delta: f32,
    /// Regions smaller than `rows * cols / ratio` are dropped when set
    pub min_size_ratio: Option<usize>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrackingConfig {
    /// in meters
    pub search_radius: f32,
    pub min_cluster_overlap: f32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FittingConfig {
    pub particles: usize,
    pub iterations: usize,
    /// inertia weight at the first iteration
    pub w0: f32,
    /// inertia weight reached after the last iteration
    pub wt: f32,
    pub c1: f32,
    pub c2: f32,
    pub max_velocity: f32,
    /// spread of the initial particle positions around the root, in meters
    pub jitter: f32,
    pub seed: Option<u64>,
    pub confidence_sigma: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            segmentation: Default::default(),
            tracking: Default::default(),
            fitting: Default::default(),
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_depth_delta: 0.1,
            min_size_ratio: None,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            search_radius: 0.3,
            min_cluster_overlap: 0.0,
        }
    }
}

impl Default for FittingConfig {
    fn default() -> Self {
        Self {
            particles: 20,
            iterations: 10,
            w0: 0.9,
            wt: 0.4,
            c1: 2.0,
            c2: 2.0,
            max_velocity: 2.0,
            jitter: 0.01,
            seed: None,
            confidence_sigma: 0.1,
        }
    }
}

impl Config {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, Error> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));
        let positive = |x: f32| x.is_finite() && x > 0.0;
        let non_negative = |x: f32| x.is_finite() && x >= 0.0;

        if self.width == 0 || self.height == 0 {
            return invalid("frame dimensions must be positive");
        }

        if !positive(self.segmentation.max_depth_delta) {
            return invalid("segmentation.max_depth_delta must be positive");
        }

        if self.segmentation.min_size_ratio == Some(0) {
            return invalid("segmentation.min_size_ratio must be positive");
        }

        let tracking = &self.tracking;
        if !positive(tracking.search_radius) {
            return invalid("tracking.search_radius must be positive");
        }

        if !(0.0..1.0).contains(&tracking.min_cluster_overlap) {
            return invalid("tracking.min_cluster_overlap must be in [0, 1)");
        }

        let fitting = &self.fitting;
        if fitting.particles == 0 || fitting.iterations == 0 {
            return invalid("fitting needs at least one particle and one iteration");
        }

        if !positive(fitting.max_velocity) || !positive(fitting.confidence_sigma) {
            return invalid("fitting.max_velocity and fitting.confidence_sigma must be positive");
        }

        if !non_negative(fitting.jitter) || !non_negative(fitting.c1) || !non_negative(fitting.c2)
        {
            return invalid("fitting.jitter, fitting.c1 and fitting.c2 must not be negative");
        }

        if !non_negative(fitting.wt) || !(fitting.wt <= fitting.w0) || !fitting.w0.is_finite() {
            return invalid("fitting inertia must fall from w0 to wt >= 0");
        }

        Ok(())
    }
}
