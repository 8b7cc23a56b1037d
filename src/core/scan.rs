//! Binary LiDAR scan decoding.
//!
//! A scan file is a headerless sequence of little-endian `f32` values, four per
//! point: x, y, z and reflectance. Decoding is a pure reinterpretation of the
//! bytes; nothing is scaled, filtered or reordered.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Number of `f32` values stored per point.
pub const FIELDS_PER_POINT: usize = 4;

/// Size of one point record in bytes.
pub const POINT_STRIDE: usize = FIELDS_PER_POINT * std::mem::size_of::<f32>();

/// Errors that can occur while reading or decoding a scan.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The scan file could not be read.
    #[error("failed to read scan '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A raw buffer is not a whole number of point records.
    #[error("scan buffer of {len} bytes is not a multiple of the 16-byte point record")]
    Misaligned { len: usize },

    /// A scan file is not a whole number of point records.
    #[error("scan '{path}' has {len} bytes, not a multiple of the 16-byte point record")]
    MalformedFile { path: PathBuf, len: usize },
}

/// Result type for scan operations.
pub type Result<T> = std::result::Result<T, ScanError>;

/// One LiDAR return.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Reflectance/intensity as recorded by the sensor.
    pub reflectance: f32,
}

impl Point {
    pub fn new(x: f32, y: f32, z: f32, reflectance: f32) -> Self {
        Self { x, y, z, reflectance }
    }

    /// Spatial coordinates without the reflectance channel.
    #[inline]
    pub fn xyz(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

/// Decode a raw scan buffer into points.
///
/// The buffer length must be a multiple of [`POINT_STRIDE`]. A trailing
/// partial record is rejected rather than truncated.
///
/// # Errors
///
/// Returns [`ScanError::Misaligned`] if the length is not a multiple of 16.
pub fn decode_scan(bytes: &[u8]) -> Result<Vec<Point>> {
    if bytes.len() % POINT_STRIDE != 0 {
        return Err(ScanError::Misaligned { len: bytes.len() });
    }

    let points = bytes
        .chunks_exact(POINT_STRIDE)
        .map(|record| {
            let field = |i: usize| {
                let start = i * 4;
                f32::from_le_bytes([
                    record[start],
                    record[start + 1],
                    record[start + 2],
                    record[start + 3],
                ])
            };
            Point::new(field(0), field(1), field(2), field(3))
        })
        .collect();

    Ok(points)
}

/// Encode points back into the on-disk little-endian layout.
pub fn encode_scan(points: &[Point]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(points.len() * POINT_STRIDE);
    for p in points {
        for value in [p.x, p.y, p.z, p.reflectance] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    bytes
}

/// Read and decode a scan file.
///
/// # Errors
///
/// Returns [`ScanError::Read`] if the file cannot be read and
/// [`ScanError::MalformedFile`] if its size is not a whole number of points.
pub fn load_scan<P: AsRef<Path>>(path: P) -> Result<Vec<Point>> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| ScanError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    decode_scan(&bytes).map_err(|e| match e {
        ScanError::Misaligned { len } => ScanError::MalformedFile {
            path: path.to_path_buf(),
            len,
        },
        other => other,
    })
}

/// Write points to a scan file, replacing any existing file.
pub fn write_scan<P: AsRef<Path>>(path: P, points: &[Point]) -> std::io::Result<()> {
    fs::write(path, encode_scan(points))
}
