pub mod config;
pub mod ingest;
pub mod kafka;
pub mod logging;
