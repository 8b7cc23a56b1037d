//! Configuration types for the dataset tools.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::transforms::{
    Compose, IntensityFilter, RangeCrop, SampleTransform, StrideSubsample,
};
use crate::dataset::Split;

/// Where the dataset lives and which split to read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Dataset root containing `train/`, `val/` and `test/`
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Split to read when none is given on the command line
    #[serde(default)]
    pub split: Split,
}

/// Axis-aligned crop region in the scan frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropConfig {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

/// Transforms applied to every retrieved record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Drop points with reflectance below this value
    #[serde(default)]
    pub intensity_threshold: Option<f32>,

    /// Keep every n-th point (1 keeps all)
    #[serde(default = "default_point_stride")]
    pub point_stride: usize,

    /// Crop points and boxes to this region
    #[serde(default)]
    pub crop: Option<CropConfig>,
}

fn default_point_stride() -> usize {
    1
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            intensity_threshold: None,
            point_stride: default_point_stride(),
            crop: None,
        }
    }
}

impl TransformConfig {
    /// Build the configured pipeline: crop, then intensity filter, then
    /// subsample. Returns `None` when nothing is configured.
    pub fn build(&self) -> Option<Box<dyn SampleTransform>> {
        let mut pipeline = Compose::new();

        if let Some(crop) = self.crop {
            pipeline = pipeline.then(RangeCrop {
                min: crop.min,
                max: crop.max,
            });
        }
        if let Some(min) = self.intensity_threshold {
            pipeline = pipeline.then(IntensityFilter { min });
        }
        if self.point_stride > 1 {
            pipeline = pipeline.then(StrideSubsample {
                stride: self.point_stride,
            });
        }

        if pipeline.is_empty() {
            None
        } else {
            Some(Box::new(pipeline))
        }
    }
}

/// Parallel loading settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Worker threads for batch loading (0 = one per core)
    #[serde(default)]
    pub num_threads: usize,

    /// Records loaded per parallel batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    16
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            num_threads: 0,
            batch_size: default_batch_size(),
        }
    }
}

/// Main configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub dataset: DatasetConfig,

    #[serde(default)]
    pub transform: TransformConfig,

    #[serde(default)]
    pub loader: LoaderConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
