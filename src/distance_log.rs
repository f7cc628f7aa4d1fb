//! The append-only CSV distance log. The file is opened, appended, and
//! closed on every write; there is exactly one writer, so that is all the
//! serialization the format needs.

use crate::alarm::Status;

use chrono::{DateTime, Local};
use std::error::Error;
use std::fmt::Display;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// The fixed header line, written only when the file is empty.
pub const HEADER: &str = "Time,Distance(cm),Status";

/// Errors from the log file.
#[derive(Debug)]
pub enum LogError {
    /// The underlying file IO failed.
    Io(std::io::Error),
}

impl Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#?}", self)
    }
}

impl Error for LogError {}

impl From<std::io::Error> for LogError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// One log line: when, how far, and whether that was safe.
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// When the sample was logged.
    pub timestamp: DateTime<Local>,
    /// The sampled distance in centimeters.
    pub distance_cm: f64,
    /// The safety classification of the sample.
    pub status: Status,
}

impl Display for LogRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{:.2},{}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.distance_cm,
            self.status
        )
    }
}

/// Handle on the CSV log file. Holds only the path; every append opens
/// its own file handle.
#[derive(Debug, Clone)]
pub struct DistanceLog {
    path: PathBuf,
}

impl DistanceLog {
    /// A log at `path`. Nothing is touched until [`initialize`].
    ///
    /// [`initialize`]: DistanceLog::initialize
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Where the log lives.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the file (and its parent directory) and writes the header
    /// if the file is currently empty. Reinitializing a populated log is
    /// a no-op.
    pub fn initialize(&self) -> Result<(), LogError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        if file.metadata()?.len() == 0 {
            writeln!(file, "{}", HEADER)?;
        }
        Ok(())
    }

    /// Appends one record.
    pub fn append(&self, record: &LogRecord) -> Result<(), LogError> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        writeln!(file, "{}", record)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn record(distance_cm: f64, threshold: f64) -> LogRecord {
        LogRecord {
            timestamp: Local.with_ymd_and_hms(2024, 3, 9, 14, 30, 5).unwrap(),
            distance_cm,
            status: Status::from_distance(distance_cm, threshold),
        }
    }

    #[test]
    fn test_initialize_writes_header_once() {
        let dir = tempdir().unwrap();
        let log = DistanceLog::new(dir.path().join("data/distance_log.csv"));

        log.initialize().unwrap();
        log.initialize().unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents, format!("{}\n", HEADER));
    }

    #[test]
    fn test_initialize_preserves_existing_records() {
        let dir = tempdir().unwrap();
        let log = DistanceLog::new(dir.path().join("distance_log.csv"));

        log.initialize().unwrap();
        log.append(&record(18.0, 20.0)).unwrap();
        log.initialize().unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], HEADER);
    }

    /// Record lines carry the fixed timestamp format, two decimal places,
    /// and a status label consistent with the threshold comparison.
    #[test]
    fn test_record_format() {
        assert_eq!(
            record(18.0, 20.0).to_string(),
            "2024-03-09 14:30:05,18.00,NOT SAFE"
        );
        assert_eq!(
            record(25.147, 20.0).to_string(),
            "2024-03-09 14:30:05,25.15,SAFE"
        );
    }

    #[test]
    fn test_appended_statuses_match_threshold() {
        let dir = tempdir().unwrap();
        let log = DistanceLog::new(dir.path().join("distance_log.csv"));
        log.initialize().unwrap();

        for distance in [25.0, 18.0, 15.0, 22.0] {
            log.append(&record(distance, 20.0)).unwrap();
        }

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let statuses: Vec<&str> = contents
            .lines()
            .skip(1)
            .map(|line| line.rsplit(',').next().unwrap())
            .collect();
        assert_eq!(statuses, vec!["SAFE", "NOT SAFE", "NOT SAFE", "SAFE"]);
    }
}
