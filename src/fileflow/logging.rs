//! Dual-sink logging: human-readable console stream plus a size-rotated
//! file sink (rotate at the configured byte threshold, keep N backups)
//!
//! Library code logs through the `log` facade; this module wires the
//! backend once at startup. If the file sink cannot be set up (unwritable
//! log directory, bad level string) the process continues console-only
//! rather than refusing to start.

use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming};

use crate::fileflow::config::AppConfig;

/// Initialize logging from the resolved config.
///
/// The returned handle must stay alive for the process lifetime; dropping
/// it shuts the logger down.
pub fn init(cfg: &AppConfig) -> Result<LoggerHandle, flexi_logger::FlexiLoggerError> {
    let file_sink = FileSpec::try_from(cfg.log_file_path.clone()).and_then(|spec| {
        Logger::try_with_str(&cfg.log_level).map(|logger| {
            logger
                .log_to_file(spec)
                .rotate(
                    Criterion::Size(cfg.log_max_bytes),
                    Naming::Numbers,
                    Cleanup::KeepLogFiles(cfg.log_backup_count),
                )
                .duplicate_to_stdout(Duplicate::All)
                .format_for_files(flexi_logger::detailed_format)
        })
    });

    match file_sink.and_then(|logger| logger.start()) {
        Ok(handle) => {
            log::debug!(
                "logging initialized; file={} max_bytes={} backups={} level={}",
                cfg.log_file_path.display(),
                cfg.log_max_bytes,
                cfg.log_backup_count,
                cfg.log_level
            );
            Ok(handle)
        }
        Err(e) => {
            let handle = Logger::try_with_str(&cfg.log_level)
                .or_else(|_| Logger::try_with_str("info"))?
                .start()?;
            log::warn!(
                "failed to set up file logging ({}); continuing with console only",
                e
            );
            Ok(handle)
        }
    }
}
