//! Indexed loader for KITTI-style LiDAR object datasets.
//!
//! This crate provides tools for:
//! - Decoding raw `velodyne/*.bin` scans into points (x, y, z, reflectance)
//! - Parsing `label_2/*.txt` annotations into Car/Pedestrian/Cyclist boxes
//! - Random and parallel batch access to records of a train/val/test split
//! - Optional per-record transforms (crop, intensity filter, subsampling)
//!
//! # Example
//!
//! ```no_run
//! use kitti_dataset::{KittiDataset, Split};
//!
//! let dataset = KittiDataset::new("/data/kitti", Split::Train).unwrap();
//! let record = dataset.get(0).unwrap();
//! println!("{}: {} points, {} boxes", record.id, record.points.len(), record.boxes.len());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod dataset;

pub use config::{CropConfig, DatasetConfig, LoaderConfig, PipelineConfig, TransformConfig};
pub use self::core::labels::{BoundingBox, ObjectClass};
pub use self::core::scan::Point;
pub use self::core::transforms::SampleTransform;
pub use dataset::{DatasetError, KittiDataset, Record, Split};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
