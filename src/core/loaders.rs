//! Data loaders for per-frame point and crane state CSV files.
//!
//! Frames are stored one file per index:
//! - `<points-dir>/frame<N>.csv` - headerless rows of `x,y,z`
//! - `<state-dir>/state<N>.csv` - a single headerless row of `trolley,jib,hook`
//!
//! A missing file is not an error at this level; callers check
//! [`FrameLayout::point_file`] / [`FrameLayout::state_file`] existence first.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("{path}:{line}: expected 3 columns, found {found}")]
    ColumnCount {
        path: PathBuf,
        line: u64,
        found: usize,
    },

    #[error("{path}:{line}: invalid number '{value}'")]
    ParseError {
        path: PathBuf,
        line: u64,
        value: String,
    },

    #[error("{path}:{line}: non-finite value '{value}'")]
    NonFinite {
        path: PathBuf,
        line: u64,
        value: String,
    },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Container for 3D point cloud data.
///
/// Points keep their insertion order; for clouds assembled from frames that is
/// frame order, then row order within each frame file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    /// X coordinates of all points.
    pub x: Vec<f32>,
    /// Y coordinates of all points.
    pub y: Vec<f32>,
    /// Z coordinates of all points.
    pub z: Vec<f32>,
}

impl PointCloud {
    /// Creates a new empty point cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new point cloud from coordinate vectors.
    pub fn from_xyz(x: Vec<f32>, y: Vec<f32>, z: Vec<f32>) -> Self {
        debug_assert!(x.len() == y.len() && y.len() == z.len());
        Self { x, y, z }
    }

    /// Creates a new point cloud with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of points in the cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns true if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Returns the `i`-th point as `[x, y, z]`.
    #[inline]
    pub fn point(&self, i: usize) -> [f32; 3] {
        [self.x[i], self.y[i], self.z[i]]
    }

    /// Iterates over the points in order.
    pub fn iter(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        (0..self.len()).map(move |i| self.point(i))
    }

    /// Adds a point to the cloud.
    #[inline]
    pub fn push(&mut self, x: f32, y: f32, z: f32) {
        self.x.push(x);
        self.y.push(y);
        self.z.push(z);
    }

    /// Appends every point of `other`, keeping its order.
    pub fn append(&mut self, other: &PointCloud) {
        self.x.extend_from_slice(&other.x);
        self.y.extend_from_slice(&other.y);
        self.z.extend_from_slice(&other.z);
    }

    /// Converts point cloud to a vector of [x, y, z] coordinate arrays.
    pub fn to_coords(&self) -> Vec<[f32; 3]> {
        self.iter().collect()
    }
}

impl FromIterator<[f32; 3]> for PointCloud {
    fn from_iter<I: IntoIterator<Item = [f32; 3]>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut cloud = PointCloud::with_capacity(iter.size_hint().0);
        for [x, y, z] in iter {
            cloud.push(x, y, z);
        }
        cloud
    }
}

/// Where frame and state files live on disk.
#[derive(Debug, Clone)]
pub struct FrameLayout {
    pub points_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl FrameLayout {
    pub fn new(points_dir: impl Into<PathBuf>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            points_dir: points_dir.into(),
            state_dir: state_dir.into(),
        }
    }

    /// Path of the point file for `frame`.
    pub fn point_file(&self, frame: u32) -> PathBuf {
        self.points_dir.join(format!("frame{}.csv", frame))
    }

    /// Path of the crane state file for `frame`.
    pub fn state_file(&self, frame: u32) -> PathBuf {
        self.state_dir.join(format!("state{}.csv", frame))
    }
}

fn headerless_reader(path: &Path) -> Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(BufReader::new(file)))
}

/// Parse one `a,b,c` record into three finite floats.
fn parse_triple(record: &StringRecord, path: &Path) -> Result<[f32; 3]> {
    let line = record.position().map_or(0, |p| p.line());

    if record.len() != 3 {
        return Err(LoaderError::ColumnCount {
            path: path.to_path_buf(),
            line,
            found: record.len(),
        });
    }

    let mut values = [0.0f32; 3];
    for (slot, field) in values.iter_mut().zip(record.iter()) {
        let value: f32 = field.parse().map_err(|_| LoaderError::ParseError {
            path: path.to_path_buf(),
            line,
            value: field.to_string(),
        })?;
        if !value.is_finite() {
            return Err(LoaderError::NonFinite {
                path: path.to_path_buf(),
                line,
                value: field.to_string(),
            });
        }
        *slot = value;
    }

    Ok(values)
}

/// Load the points of one frame file.
///
/// Each row must hold exactly three numbers. An empty file yields an empty
/// cloud: a frame may legitimately contain no returns.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a row does not have three
/// columns, or a value is not a finite number.
pub fn load_points_csv<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    let mut reader = headerless_reader(path)?;

    let mut cloud = PointCloud::with_capacity(4096);
    for result in reader.records() {
        let record = result?;
        let [x, y, z] = parse_triple(&record, path)?;
        cloud.push(x, y, z);
    }

    Ok(cloud)
}

/// Load the crane state (trolley, jib, hook positions) of one frame.
///
/// Only the first row is read.
pub fn load_state_csv<P: AsRef<Path>>(path: P) -> Result<[f32; 3]> {
    let path = path.as_ref();
    let mut reader = headerless_reader(path)?;

    match reader.records().next() {
        Some(record) => parse_triple(&record?, path),
        None => Err(LoaderError::EmptyFile(path.to_path_buf())),
    }
}

/// List the frame indices present in a points directory, ascending.
///
/// Only files named exactly `frame<N>.csv` are considered.
pub fn scan_frame_indices<P: AsRef<Path>>(points_dir: P) -> Result<Vec<u32>> {
    let mut frames: Vec<u32> = fs::read_dir(points_dir.as_ref())?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            name.to_str()?
                .strip_prefix("frame")?
                .strip_suffix(".csv")?
                .parse()
                .ok()
        })
        .collect();

    frames.sort_unstable();
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_point_cloud_operations() {
        let mut cloud = PointCloud::new();
        assert!(cloud.is_empty());

        cloud.push(1.0, 2.0, 3.0);
        cloud.push(4.0, 5.0, 6.0);

        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.point(1), [4.0, 5.0, 6.0]);
        assert_eq!(cloud.to_coords(), vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);

        let mut other: PointCloud = vec![[7.0, 8.0, 9.0]].into_iter().collect();
        other.append(&cloud);
        assert_eq!(other.x, vec![7.0, 1.0, 4.0]);
    }

    #[test]
    fn test_load_points_csv() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1.0,2.0,3.0").unwrap();
        writeln!(file, " 4.5 , -5.0 ,6").unwrap();
        file.flush().unwrap();

        let cloud = load_points_csv(file.path())?;
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.point(0), [1.0, 2.0, 3.0]);
        assert_eq!(cloud.point(1), [4.5, -5.0, 6.0]);

        Ok(())
    }

    #[test]
    fn test_load_points_csv_empty_file_is_empty_cloud() -> Result<()> {
        let file = NamedTempFile::new().unwrap();
        let cloud = load_points_csv(file.path())?;
        assert!(cloud.is_empty());
        Ok(())
    }

    #[test]
    fn test_load_points_csv_rejects_bad_number() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1.0,2.0,3.0").unwrap();
        writeln!(file, "1.0,abc,3.0").unwrap();
        file.flush().unwrap();

        match load_points_csv(file.path()) {
            Err(LoaderError::ParseError { line, value, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(value, "abc");
            }
            other => panic!("Expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_load_points_csv_rejects_wrong_column_count() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1.0,2.0").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_points_csv(file.path()),
            Err(LoaderError::ColumnCount { found: 2, .. })
        ));
    }

    #[test]
    fn test_load_points_csv_rejects_nan() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1.0,NaN,3.0").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_points_csv(file.path()),
            Err(LoaderError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_load_state_csv_reads_first_row() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "0.25,1.5,-3.0").unwrap();
        writeln!(file, "9.0,9.0,9.0").unwrap();
        file.flush().unwrap();

        assert_eq!(load_state_csv(file.path())?, [0.25, 1.5, -3.0]);
        Ok(())
    }

    #[test]
    fn test_load_state_csv_empty() {
        let file = NamedTempFile::new().unwrap();
        assert!(matches!(
            load_state_csv(file.path()),
            Err(LoaderError::EmptyFile(_))
        ));
    }

    #[test]
    fn test_frame_layout_paths() {
        let layout = FrameLayout::new("Data/PC", "Data/State");
        assert_eq!(layout.point_file(7), PathBuf::from("Data/PC/frame7.csv"));
        assert_eq!(layout.state_file(12), PathBuf::from("Data/State/state12.csv"));
    }

    #[test]
    fn test_scan_frame_indices() -> Result<()> {
        let dir = TempDir::new().unwrap();
        for name in ["frame10.csv", "frame2.csv", "frame3.txt", "state1.csv", "frameX.csv"] {
            File::create(dir.path().join(name)).unwrap();
        }

        assert_eq!(scan_frame_indices(dir.path())?, vec![2, 10]);
        Ok(())
    }
}
