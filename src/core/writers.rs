//! CSV export of decoded records.
//!
//! - Points as `x,y,z,reflectance`
//! - Boxes as `class,x,y,z,height,width,length,rotation_y`

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use super::labels::BoundingBox;
use super::scan::Point;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to flush data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Opens a CSV writer on a fresh file, creating parent directories.
fn create_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

fn write_rows<I>(path: &Path, header: &[&str], rows: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();

    writer
        .write_record(header)
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for row in rows {
        writer.write_record(&row).map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write points to CSV with `x,y,z,reflectance` columns.
///
/// # Example
///
/// ```no_run
/// use kitti_dataset::core::scan::Point;
/// use kitti_dataset::core::writers::write_points_csv;
/// use std::path::Path;
///
/// let points = vec![Point::new(1.0, 2.0, 3.0, 0.5)];
/// write_points_csv(Path::new("points.csv"), &points).unwrap();
/// ```
pub fn write_points_csv(path: &Path, points: &[Point]) -> Result<()> {
    write_rows(
        path,
        &["x", "y", "z", "reflectance"],
        points.iter().map(|p| {
            vec![
                format!("{:.6}", p.x),
                format!("{:.6}", p.y),
                format!("{:.6}", p.z),
                format!("{:.6}", p.reflectance),
            ]
        }),
    )
}

/// Write boxes to CSV, one row per box in sequence order.
pub fn write_boxes_csv(path: &Path, boxes: &[BoundingBox]) -> Result<()> {
    write_rows(
        path,
        &["class", "x", "y", "z", "height", "width", "length", "rotation_y"],
        boxes.iter().map(|b| {
            let mut row = Vec::with_capacity(8);
            row.push(b.class.to_string());
            row.extend(b.to_array().iter().map(|v| format!("{:.6}", v)));
            row
        }),
    )
}
