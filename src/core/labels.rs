//! KITTI object label parsing.
//!
//! Each line of a label file describes one object as whitespace-separated
//! fields. Only the tracked classes ([`ObjectClass`]) become boxes; lines for
//! any other class (`DontCare`, `Van`, `Truck`, ...) are dropped without error.
//! A tracked line with missing or non-numeric fields is a hard error.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while reading or parsing a label file.
#[derive(Error, Debug)]
pub enum LabelError {
    /// The label file could not be read.
    #[error("failed to read labels '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A tracked-class line is missing fields or has unparsable values.
    #[error("malformed label in '{file_id}' at line {line}: {reason}")]
    Malformed {
        file_id: String,
        /// 1-based line number.
        line: usize,
        reason: String,
    },
}

/// Result type for label operations.
pub type Result<T> = std::result::Result<T, LabelError>;

/// Object classes kept by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ObjectClass {
    Car,
    Pedestrian,
    Cyclist,
}

impl ObjectClass {
    pub const ALL: [ObjectClass; 3] = [
        ObjectClass::Car,
        ObjectClass::Pedestrian,
        ObjectClass::Cyclist,
    ];

    /// Match a raw category string. Case-sensitive, exact.
    pub fn from_label(name: &str) -> Option<Self> {
        match name {
            "Car" => Some(ObjectClass::Car),
            "Pedestrian" => Some(ObjectClass::Pedestrian),
            "Cyclist" => Some(ObjectClass::Cyclist),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectClass::Car => "Car",
            ObjectClass::Pedestrian => "Pedestrian",
            ObjectClass::Cyclist => "Cyclist",
        }
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ObjectClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ObjectClass::from_label(s).ok_or_else(|| format!("untracked object class '{}'", s))
    }
}

/// Box extent in the label's physical units (meters for KITTI).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Dimensions {
    pub height: f32,
    pub width: f32,
    pub length: f32,
}

/// One annotated 3D object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub class: ObjectClass,
    pub dimensions: Dimensions,
    /// Center position `[x, y, z]`.
    pub location: [f32; 3],
    /// Heading in radians, as stored in the file.
    pub rotation_y: f32,
}

impl BoundingBox {
    /// Flat `[x, y, z, h, w, l, ry]` layout.
    pub fn to_array(&self) -> [f32; 7] {
        let [x, y, z] = self.location;
        let d = self.dimensions;
        [x, y, z, d.height, d.width, d.length, self.rotation_y]
    }
}

/// Field positions of a label line.
///
/// Parsing only ever reads positions through this table, so a different label
/// layout needs a new descriptor and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelSchema {
    pub class: usize,
    pub height: usize,
    pub width: usize,
    pub length: usize,
    pub x: usize,
    pub y: usize,
    pub z: usize,
    pub rotation_y: usize,
}

impl LabelSchema {
    /// Minimum number of fields a tracked line must have.
    pub fn min_fields(&self) -> usize {
        [
            self.class,
            self.height,
            self.width,
            self.length,
            self.x,
            self.y,
            self.z,
            self.rotation_y,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }
}

/// KITTI `label_2` layout: type, truncated, occluded, alpha, bbox(4),
/// dimensions(3), location(3), rotation_y, [score].
pub const KITTI_SCHEMA: LabelSchema = LabelSchema {
    class: 0,
    height: 8,
    width: 9,
    length: 10,
    x: 11,
    y: 12,
    z: 13,
    rotation_y: 14,
};

/// Parse label file content using [`KITTI_SCHEMA`].
///
/// `file_id` is only used to identify the source in errors.
pub fn parse_labels(content: &str, file_id: &str) -> Result<Vec<BoundingBox>> {
    parse_labels_with(content, file_id, &KITTI_SCHEMA)
}

/// Parse label file content with an explicit schema.
///
/// # Errors
///
/// Returns [`LabelError::Malformed`] for the first tracked line that has too
/// few fields or a value that is not a float.
pub fn parse_labels_with(
    content: &str,
    file_id: &str,
    schema: &LabelSchema,
) -> Result<Vec<BoundingBox>> {
    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            parse_line(line, schema)
                .map_err(|reason| LabelError::Malformed {
                    file_id: file_id.to_string(),
                    line: i + 1,
                    reason,
                })
                .transpose()
        })
        .collect()
}

/// Parse one line. `Ok(None)` means the line is not a tracked class.
fn parse_line(
    line: &str,
    schema: &LabelSchema,
) -> std::result::Result<Option<BoundingBox>, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();

    let class = match fields.get(schema.class).and_then(|name| ObjectClass::from_label(name)) {
        Some(class) => class,
        None => return Ok(None),
    };

    let expected = schema.min_fields();
    if fields.len() < expected {
        return Err(format!(
            "{} line has {} fields, expected at least {}",
            class,
            fields.len(),
            expected
        ));
    }

    let number = |idx: usize, name: &str| -> std::result::Result<f32, String> {
        let raw = fields[idx];
        raw.parse::<f32>()
            .map_err(|_| format!("invalid {} value '{}' in field {}", name, raw, idx))
    };

    Ok(Some(BoundingBox {
        class,
        dimensions: Dimensions {
            height: number(schema.height, "height")?,
            width: number(schema.width, "width")?,
            length: number(schema.length, "length")?,
        },
        location: [
            number(schema.x, "x")?,
            number(schema.y, "y")?,
            number(schema.z, "z")?,
        ],
        rotation_y: number(schema.rotation_y, "rotation_y")?,
    }))
}

/// Read and parse a label file. The file stem is used as its identifier.
pub fn load_labels<P: AsRef<Path>>(path: P) -> Result<Vec<BoundingBox>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| LabelError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    let file_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    parse_labels(&content, &file_id)
}
