//! Data writers: the motion audit log and CSV export of processed clouds.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use super::loaders::PointCloud;

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

    /// Failed to write data to file.
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

    /// Failed to append to the audit log.
    #[error("failed to append to audit log: {0}")]
    Audit(#[source] std::io::Error),
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

/// Append-only text log of crane motion events.
///
/// Two kinds of entries are written, in the order events happen:
///
/// ```text
/// Frame No.12 - Trolley Moved
/// Hook is too fast!
/// Speed: 2.5
/// ```
///
/// Every entry is flushed as soon as it is written, so the file reflects all
/// events up to a failure.
pub struct AuditLog<W: Write = File> {
    sink: W,
}

impl AuditLog<File> {
    /// Create (or truncate) the log file at `path` and open it for appending.
    pub fn create(path: &Path) -> Result<Self> {
        ensure_parent_dirs(path)?;

        let path_str = path.display().to_string();
        File::create(path).map_err(|e| WriteError::CreateFile {
            path: path_str.clone(),
            source: e,
        })?;
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| WriteError::CreateFile {
                path: path_str,
                source: e,
            })?;

        Ok(Self { sink: file })
    }
}

impl<W: Write> AuditLog<W> {
    /// Wrap an arbitrary writer.
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    /// Record that `part` moved in `frame`.
    pub fn motion(&mut self, frame: u32, part: &str) -> Result<()> {
        self.append(&format!("Frame No.{} - {} Moved\n", frame, part))
    }

    /// Record that `part` exceeded its speed limit.
    pub fn too_fast(&mut self, part: &str, speed: f32) -> Result<()> {
        self.append(&format!("{} is too fast!\nSpeed: {}\n", part, speed))
    }

    fn append(&mut self, entry: &str) -> Result<()> {
        self.sink
            .write_all(entry.as_bytes())
            .and_then(|_| self.sink.flush())
            .map_err(WriteError::Audit)
    }

    /// Consume the log and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.sink
    }
}

/// Write a point cloud as headerless `x,y,z` rows.
///
/// The output uses the same layout as per-frame point files, so an exported
/// batch can be fed back into the single-file commands.
///
/// # Errors
///
/// Returns an error if:
/// - Parent directories cannot be created
/// - File cannot be created or written to
pub fn write_points_csv(path: &Path, cloud: &PointCloud) -> Result<()> {
    ensure_parent_dirs(path)?;

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(file));

    let path_str = path.display().to_string();

    for [x, y, z] in cloud.iter() {
        csv_writer
            .write_record(&[x.to_string(), y.to_string(), z.to_string()])
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::load_points_csv;
    use tempfile::tempdir;

    #[test]
    fn test_audit_log_entry_format() {
        let mut log = AuditLog::new(Vec::new());
        log.motion(3, "Trolley").unwrap();
        log.too_fast("Trolley", 2.0).unwrap();
        log.too_fast("Hook", 0.5).unwrap();

        let text = String::from_utf8(log.into_inner()).unwrap();
        assert_eq!(
            text,
            "Frame No.3 - Trolley Moved\nTrolley is too fast!\nSpeed: 2\nHook is too fast!\nSpeed: 0.5\n"
        );
    }

    #[test]
    fn test_audit_log_create_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("Log.txt");

        {
            let mut log = AuditLog::create(&path).unwrap();
            log.motion(1, "Jib").unwrap();
        }
        {
            let mut log = AuditLog::create(&path).unwrap();
            log.motion(2, "Hook").unwrap();
            log.motion(3, "Hook").unwrap();
        }

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Frame No.2 - Hook Moved\nFrame No.3 - Hook Moved\n");
    }

    #[test]
    fn test_write_points_csv_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("batch.csv");
        let cloud = PointCloud::from_xyz(vec![1.0, 4.5], vec![2.0, -5.25], vec![3.0, 6.0]);

        write_points_csv(&path, &cloud).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().next(), Some("1,2,3"));
        assert_eq!(load_points_csv(&path).unwrap(), cloud);
    }

    #[test]
    fn test_write_points_csv_empty_cloud() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");

        write_points_csv(&path, &PointCloud::new()).unwrap();

        assert!(path.exists());
        assert!(load_points_csv(&path).unwrap().is_empty());
    }
}
