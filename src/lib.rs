//! # fileflow
//!
//! An unattended ingestion bridge between batch-dropped CSV files and a
//! streaming consumer ecosystem. A watch directory is scanned for `.csv`
//! drops; each file is validated row by row, every well-formed row is
//! published to a Kafka topic with delivery confirmation, and the file is
//! relocated to an archive or error directory depending on the per-file
//! outcome.
//!
//! ## Pipeline
//!
//! Scanner → File Processor → (Row Validator, Broker Publisher) per row →
//! outcome aggregation → Relocator → summary log.
//!
//! ## Failure semantics
//!
//! - Row-level failures (validation, broker rejection, retry exhaustion)
//!   never abort the file; they are counted and the file continues.
//! - File-level failures (open/read/move) route the whole file to the error
//!   directory; the scan pass continues with the next file.
//! - Only configuration/startup errors terminate the process.

pub mod fileflow;

pub use fileflow::config::AppConfig;
pub use fileflow::ingest::processor::{FileOutcome, FileProcessor};
pub use fileflow::kafka::publisher::{BrokerPublisher, PublishOutcome, RetryPolicy};
pub use fileflow::kafka::sink::{KafkaRecordSink, RecordSink};
