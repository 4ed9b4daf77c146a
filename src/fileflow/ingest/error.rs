//! Error types for the file-intake pipeline

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Fatal configuration or startup error.
///
/// These are the only errors that terminate the process; everything below
/// the scan-pass boundary is contained.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file missing or unreadable
    Io(String),
    /// Config file readable but structurally invalid
    Invalid(String),
    /// Watch directory missing or not a directory
    WatchDirMissing(PathBuf),
    /// Watch directory exists but could not be listed
    ListDir(PathBuf, String),
}

impl ConfigError {
    /// Process exit code for this error class.
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::Io(_) | ConfigError::Invalid(_) => 2,
            ConfigError::WatchDirMissing(_) => 3,
            ConfigError::ListDir(_, _) => 6,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "could not read configuration: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
            ConfigError::WatchDirMissing(path) => write!(
                f,
                "watch directory '{}' is missing or not a directory",
                path.display()
            ),
            ConfigError::ListDir(path, msg) => write!(
                f,
                "could not list watch directory '{}': {}",
                path.display(),
                msg
            ),
        }
    }
}

impl Error for ConfigError {}

/// Row-level structural validation failure.
///
/// Non-fatal: consumed by the file processor, counted against the file,
/// never propagated past the file boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// 1-based data-row index (header excluded)
    pub row_index: usize,
    /// Offending field name, or a synthetic label for row-shape errors
    pub field: String,
    pub reason: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {}: field '{}': {}",
            self.row_index, self.field, self.reason
        )
    }
}

impl Error for ValidationError {}

/// File-level access failure: open, read or relocate.
///
/// Routes the whole file to the error directory where possible; the scan
/// pass continues with the next file.
#[derive(Debug)]
pub struct FileAccessError {
    pub path: PathBuf,
    pub reason: String,
}

impl FileAccessError {
    pub fn new(path: impl Into<PathBuf>, err: impl fmt::Display) -> Self {
        Self {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

impl fmt::Display for FileAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file access error on '{}': {}", self.path.display(), self.reason)
    }
}

impl Error for FileAccessError {}
