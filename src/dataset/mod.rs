//! Indexed access to a KITTI-style object dataset.
//!
//! Expected layout:
//!
//! ```text
//! {root}/{split}/velodyne/{id}.bin
//! {root}/{split}/label_2/{id}.txt    (train and val only)
//! ```
//!
//! The identifier list is built once when the dataset is opened. Retrieval
//! never mutates the dataset, so a shared `&KittiDataset` can serve records
//! from many threads at once.

pub mod split;

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;
use thiserror::Error;

use crate::core::labels::{load_labels, BoundingBox, LabelError};
use crate::core::scan::{load_scan, Point, ScanError};
use crate::core::transforms::SampleTransform;

pub use split::Split;

/// Scan subdirectory name.
pub const SCAN_DIR: &str = "velodyne";
/// Label subdirectory name.
pub const LABEL_DIR: &str = "label_2";
/// Scan file extension.
pub const SCAN_EXT: &str = "bin";
/// Label file extension.
pub const LABEL_EXT: &str = "txt";

/// Errors raised while opening a dataset or retrieving a record.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("dataset directory not found: {0}")]
    MissingDirectory(PathBuf),

    #[error("failed to list scan directory '{path}': {source}")]
    ListDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("index {index} out of range for dataset of {len} records")]
    OutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Label(#[from] LabelError),
}

/// Result type for dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;

/// One scan with its boxes.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub points: Vec<Point>,
    /// Always empty for [`Split::Test`] unless a transform adds boxes.
    pub boxes: Vec<BoundingBox>,
}

pub struct KittiDataset {
    root: PathBuf,
    split: Split,
    scan_dir: PathBuf,
    label_dir: PathBuf,
    ids: Vec<String>,
    transform: Option<Box<dyn SampleTransform>>,
}

impl KittiDataset {
    /// Open a split without a transform.
    pub fn new<P: AsRef<Path>>(root: P, split: Split) -> Result<Self> {
        Self::open(root, split, None)
    }

    /// Open a split, listing its scans.
    ///
    /// # Errors
    ///
    /// - [`DatasetError::MissingDirectory`] if the root, the scan directory or
    ///   (for train/val) the label directory does not exist
    /// - [`DatasetError::ListDirectory`] if the scan directory cannot be read
    pub fn open<P: AsRef<Path>>(
        root: P,
        split: Split,
        transform: Option<Box<dyn SampleTransform>>,
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let split_dir = root.join(split.dir_name());
        let scan_dir = split_dir.join(SCAN_DIR);
        let label_dir = split_dir.join(LABEL_DIR);

        if !root.is_dir() {
            return Err(DatasetError::MissingDirectory(root));
        }
        if !scan_dir.is_dir() {
            return Err(DatasetError::MissingDirectory(scan_dir));
        }
        if split.has_labels() && !label_dir.is_dir() {
            return Err(DatasetError::MissingDirectory(label_dir));
        }

        let ids = list_scan_ids(&scan_dir)?;
        info!(
            "Opened {} split at {}: {} scans",
            split,
            root.display(),
            ids.len()
        );

        Ok(Self {
            root,
            split,
            scan_dir,
            label_dir,
            ids,
            transform,
        })
    }

    /// Number of records.
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identifiers in index order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn split(&self) -> Split {
        self.split
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn has_transform(&self) -> bool {
        self.transform.is_some()
    }

    pub fn scan_path(&self, id: &str) -> PathBuf {
        self.scan_dir.join(format!("{}.{}", id, SCAN_EXT))
    }

    pub fn label_path(&self, id: &str) -> PathBuf {
        self.label_dir.join(format!("{}.{}", id, LABEL_EXT))
    }

    /// Load the record at `index`.
    ///
    /// Labels are read for train and val only. A missing label file is an
    /// error, not an empty label set.
    pub fn get(&self, index: usize) -> Result<Record> {
        let id = self.ids.get(index).ok_or(DatasetError::OutOfRange {
            index,
            len: self.ids.len(),
        })?;

        let points = load_scan(self.scan_path(id))?;
        let boxes = if self.split.has_labels() {
            load_labels(self.label_path(id))?
        } else {
            Vec::new()
        };
        debug!("{}: {} points, {} boxes", id, points.len(), boxes.len());

        let (points, boxes) = match &self.transform {
            Some(transform) => transform.apply(points, boxes),
            None => (points, boxes),
        };

        Ok(Record {
            id: id.clone(),
            points,
            boxes,
        })
    }

    /// Load several records in parallel.
    ///
    /// Output order follows `indices`. If any retrieval fails, the error for
    /// the earliest failing position in `indices` is returned.
    pub fn get_batch(&self, indices: &[usize]) -> Result<Vec<Record>> {
        let results: Vec<Result<Record>> = indices.par_iter().map(|&i| self.get(i)).collect();
        results.into_iter().collect()
    }

    /// Iterate over every record in index order.
    pub fn iter(&self) -> impl Iterator<Item = Result<Record>> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }
}

impl std::fmt::Debug for KittiDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KittiDataset")
            .field("root", &self.root)
            .field("split", &self.split)
            .field("len", &self.ids.len())
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// Sorted stems of all `.bin` files in `scan_dir`.
fn list_scan_ids(scan_dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(scan_dir).map_err(|e| DatasetError::ListDirectory {
        path: scan_dir.to_path_buf(),
        source: e,
    })?;

    let mut ids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DatasetError::ListDirectory {
            path: scan_dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();

        let is_scan = path.is_file()
            && path
                .extension()
                .map(|ext| ext == SCAN_EXT)
                .unwrap_or(false);
        if !is_scan {
            continue;
        }

        match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => ids.push(stem.to_string()),
            None => warn!("Skipping scan with non UTF-8 name: {}", path.display()),
        }
    }

    ids.sort();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::labels::ObjectClass;
    use crate::core::scan::write_scan;
    use crate::core::transforms::{Compose, IntensityFilter, StrideSubsample};
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    const CAR_LINE: &str =
        "Car 0.00 0 -1.58 587.01 173.33 614.12 200.12 1.5 1.6 4.0 2.1 1.2 8.3 0.05";
    const DONTCARE_LINE: &str =
        "DontCare -1 -1 -10 503.89 169.71 590.61 190.13 -1 -1 -1 -1000 -1000 -1000 -10";

    fn scan_points(n: usize) -> Vec<Point> {
        (0..n)
            .map(|i| Point::new(i as f32, -(i as f32), 0.5, i as f32 / n as f32))
            .collect()
    }

    fn create_split(root: &Path, split: Split) -> (PathBuf, PathBuf) {
        let scan_dir = root.join(split.dir_name()).join(SCAN_DIR);
        let label_dir = root.join(split.dir_name()).join(LABEL_DIR);
        fs::create_dir_all(&scan_dir).unwrap();
        if split.has_labels() {
            fs::create_dir_all(&label_dir).unwrap();
        }
        (scan_dir, label_dir)
    }

    fn add_scan(scan_dir: &Path, id: &str, n: usize) {
        write_scan(scan_dir.join(format!("{}.bin", id)), &scan_points(n)).unwrap();
    }

    fn add_labels(label_dir: &Path, id: &str, lines: &[&str]) {
        let mut file = File::create(label_dir.join(format!("{}.txt", id))).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
    }

    #[test]
    fn test_ids_sorted_and_filtered() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let (scan_dir, _) = create_split(temp_dir.path(), Split::Train);
        add_scan(&scan_dir, "000002", 1);
        add_scan(&scan_dir, "000000", 1);
        add_scan(&scan_dir, "000001", 1);
        fs::write(scan_dir.join("notes.txt"), "ignore me").unwrap();
        fs::write(scan_dir.join("000003.BIN"), [0u8; 16]).unwrap();
        fs::create_dir_all(scan_dir.join("nested.bin")).unwrap();

        let dataset = KittiDataset::new(temp_dir.path(), Split::Train)?;
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.ids(), &["000000", "000001", "000002"]);

        let again = KittiDataset::new(temp_dir.path(), Split::Train)?;
        assert_eq!(again.ids(), dataset.ids());
        Ok(())
    }

    #[test]
    fn test_get_train_record() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let (scan_dir, label_dir) = create_split(temp_dir.path(), Split::Train);
        add_scan(&scan_dir, "000000", 4);
        add_labels(&label_dir, "000000", &[DONTCARE_LINE, CAR_LINE]);

        let dataset = KittiDataset::new(temp_dir.path(), Split::Train)?;
        let record = dataset.get(0)?;

        assert_eq!(record.id, "000000");
        assert_eq!(record.points, scan_points(4));
        assert_eq!(record.boxes.len(), 1);
        assert_eq!(record.boxes[0].class, ObjectClass::Car);
        assert_eq!(record.boxes[0].location, [2.1, 1.2, 8.3]);
        Ok(())
    }

    #[test]
    fn test_out_of_range() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let (scan_dir, label_dir) = create_split(temp_dir.path(), Split::Validation);
        for id in ["a", "b"] {
            add_scan(&scan_dir, id, 2);
            add_labels(&label_dir, id, &[]);
        }

        let dataset = KittiDataset::new(temp_dir.path(), Split::Validation)?;
        for i in 0..dataset.len() {
            dataset.get(i)?;
        }

        match dataset.get(dataset.len()) {
            Err(DatasetError::OutOfRange { index, len }) => {
                assert_eq!(index, 2);
                assert_eq!(len, 2);
            }
            other => panic!("Expected OutOfRange error, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_test_split_never_reads_labels() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let (scan_dir, _) = create_split(temp_dir.path(), Split::Test);
        add_scan(&scan_dir, "000000", 3);
        add_scan(&scan_dir, "000001", 3);

        // A label file present for one id must still be ignored.
        let label_dir = temp_dir.path().join("test").join(LABEL_DIR);
        fs::create_dir_all(&label_dir).unwrap();
        add_labels(&label_dir, "000000", &[CAR_LINE]);

        let dataset = KittiDataset::new(temp_dir.path(), Split::Test)?;
        for record in dataset.iter() {
            let record = record?;
            assert!(record.boxes.is_empty());
            assert_eq!(record.points.len(), 3);
        }
        Ok(())
    }

    #[test]
    fn test_missing_label_file_is_error() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let (scan_dir, _) = create_split(temp_dir.path(), Split::Train);
        add_scan(&scan_dir, "000000", 1);

        let dataset = KittiDataset::new(temp_dir.path(), Split::Train)?;
        let result = dataset.get(0);
        assert!(matches!(
            result,
            Err(DatasetError::Label(LabelError::Read { .. }))
        ));
        Ok(())
    }

    #[test]
    fn test_scan_removed_after_open_is_error() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let (scan_dir, label_dir) = create_split(temp_dir.path(), Split::Train);
        add_scan(&scan_dir, "000000", 1);
        add_labels(&label_dir, "000000", &[CAR_LINE]);

        let dataset = KittiDataset::new(temp_dir.path(), Split::Train)?;
        fs::remove_file(dataset.scan_path("000000")).unwrap();

        assert!(matches!(
            dataset.get(0),
            Err(DatasetError::Scan(ScanError::Read { .. }))
        ));
        Ok(())
    }

    #[test]
    fn test_malformed_inputs_propagate() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let (scan_dir, label_dir) = create_split(temp_dir.path(), Split::Train);
        fs::write(scan_dir.join("000000.bin"), [0u8; 17]).unwrap();
        add_labels(&label_dir, "000000", &[CAR_LINE]);
        add_scan(&scan_dir, "000001", 1);
        add_labels(&label_dir, "000001", &[CAR_LINE, "Pedestrian 0 0 0"]);

        let dataset = KittiDataset::new(temp_dir.path(), Split::Train)?;
        assert!(matches!(
            dataset.get(0),
            Err(DatasetError::Scan(ScanError::MalformedFile { len: 17, .. }))
        ));
        match dataset.get(1) {
            Err(DatasetError::Label(LabelError::Malformed { file_id, line, .. })) => {
                assert_eq!(file_id, "000001");
                assert_eq!(line, 2);
            }
            other => panic!("Expected Malformed label error, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_missing_directories() {
        let temp_dir = TempDir::new().unwrap();

        let missing_root = temp_dir.path().join("nope");
        assert!(matches!(
            KittiDataset::new(&missing_root, Split::Train),
            Err(DatasetError::MissingDirectory(p)) if p == missing_root
        ));

        assert!(matches!(
            KittiDataset::new(temp_dir.path(), Split::Test),
            Err(DatasetError::MissingDirectory(_))
        ));

        // Train split with scans but no label directory.
        fs::create_dir_all(temp_dir.path().join("train").join(SCAN_DIR)).unwrap();
        match KittiDataset::new(temp_dir.path(), Split::Train) {
            Err(DatasetError::MissingDirectory(p)) => assert!(p.ends_with(LABEL_DIR)),
            other => panic!("Expected MissingDirectory error, got {:?}", other),
        }
    }

    #[test]
    fn test_transform_is_applied() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let (scan_dir, label_dir) = create_split(temp_dir.path(), Split::Train);
        add_scan(&scan_dir, "000000", 10);
        add_labels(&label_dir, "000000", &[CAR_LINE]);

        let transform = Compose::new()
            .then(IntensityFilter { min: 0.5 })
            .then(StrideSubsample { stride: 2 });
        let dataset = KittiDataset::open(temp_dir.path(), Split::Train, Some(Box::new(transform)))?;
        assert!(dataset.has_transform());

        let record = dataset.get(0)?;
        let xs: Vec<f32> = record.points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![5.0, 7.0, 9.0]);
        assert_eq!(record.boxes.len(), 1);
        Ok(())
    }

    #[test]
    fn test_get_batch_preserves_order() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let (scan_dir, label_dir) = create_split(temp_dir.path(), Split::Train);
        for (i, id) in ["000000", "000001", "000002", "000003"].iter().enumerate() {
            add_scan(&scan_dir, id, i + 1);
            add_labels(&label_dir, id, &[CAR_LINE]);
        }

        let dataset = KittiDataset::new(temp_dir.path(), Split::Train)?;
        let records = dataset.get_batch(&[3, 0, 2])?;
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["000003", "000000", "000002"]);
        assert_eq!(records[0].points.len(), 4);

        assert!(matches!(
            dataset.get_batch(&[0, 9]),
            Err(DatasetError::OutOfRange { index: 9, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_empty_scan_dir() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        create_split(temp_dir.path(), Split::Train);

        let dataset = KittiDataset::new(temp_dir.path(), Split::Train)?;
        assert!(dataset.is_empty());
        assert_eq!(dataset.iter().count(), 0);
        Ok(())
    }
}
