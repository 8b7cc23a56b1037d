//! Core data types and I/O operations.

pub mod labels;
pub mod scan;
pub mod transforms;
pub mod writers;

pub use labels::{BoundingBox, Dimensions, LabelError, LabelSchema, ObjectClass, KITTI_SCHEMA};
pub use scan::{Point, ScanError};
pub use transforms::SampleTransform;
pub use writers::{write_boxes_csv, write_points_csv, WriteError};
