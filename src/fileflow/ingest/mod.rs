//! The file-intake pipeline: scanning, validation, processing, relocation

pub mod error;
pub mod processor;
pub mod relocate;
pub mod scanner;
pub mod validator;

pub use error::{ConfigError, FileAccessError, ValidationError};
pub use processor::{FileOutcome, FileProcessor};
pub use scanner::{run_scan_pass, scan, CandidateFile, ClaimedSet, ShutdownFlag};
pub use validator::{ColumnSpec, ColumnType, RowValidator};
