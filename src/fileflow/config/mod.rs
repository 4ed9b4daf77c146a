//! Runtime configuration: ini file plus environment-variable overrides
//!
//! Precedence is environment variable over config-file value over built-in
//! default. The snapshot is built once at startup and read-only afterwards;
//! directories are created lazily on first need, never at load time.

use configparser::ini::Ini;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fileflow::ingest::error::ConfigError;
use crate::fileflow::ingest::validator::{ColumnSpec, ColumnType};
use crate::fileflow::kafka::RetryPolicy;

const DEFAULT_CLIENT_ID: &str = "fileflow-producer";
const DEFAULT_LOG_FILE: &str = "/var/log/fileflow/fileflow.log";
const DEFAULT_LOG_MAX_BYTES: u64 = 5 * 1024 * 1024;
const DEFAULT_LOG_BACKUP_COUNT: usize = 5;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 200;
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;
const DEFAULT_SCAN_INTERVAL_SECS: u64 = 10;

/// Immutable snapshot of runtime parameters.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub watch_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub error_dir: PathBuf,

    pub broker_address: String,
    pub topic_name: String,
    pub client_id: String,

    /// Declared column types from `[schema] columns`; undeclared columns
    /// are strings (structural validation only)
    pub columns: Vec<ColumnSpec>,
    /// Column whose value becomes the Kafka message key
    pub key_column: Option<String>,

    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,

    pub scan_interval_secs: u64,
    pub max_concurrent_files: usize,

    pub log_level: String,
    pub log_file_path: PathBuf,
    pub log_max_bytes: u64,
    pub log_backup_count: usize,

    /// Warnings produced while resolving environment overrides. Loading
    /// happens before the logger is up, so the caller emits these once it is.
    pub load_warnings: Vec<String>,
}

impl AppConfig {
    /// Load the ini file at `path` and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut ini = Ini::new();
        ini.load(path.as_ref()).map_err(ConfigError::Io)?;
        let mut cfg = Self::from_ini(&ini)?;
        let warnings = cfg.apply_env_overrides();
        cfg.load_warnings = warnings;
        Ok(cfg)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let watch_dir = required_path(ini, "paths", "input_folder")?;
        let archive_dir = required_path(ini, "paths", "archive_folder")?;
        let error_dir = required_path(ini, "paths", "error_folder")?;

        let columns = match ini.get("schema", "columns") {
            Some(raw) => parse_columns(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            watch_dir,
            archive_dir,
            error_dir,
            broker_address: ini.get("kafka", "broker").unwrap_or_default(),
            topic_name: ini.get("kafka", "topic").unwrap_or_default(),
            client_id: ini
                .get("kafka", "client_id")
                .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
            columns,
            key_column: ini.get("schema", "key_column"),
            max_retries: numeric(ini, "retry", "max_retries", DEFAULT_MAX_RETRIES)?,
            retry_base_delay_ms: numeric(
                ini,
                "retry",
                "base_delay_ms",
                DEFAULT_RETRY_BASE_DELAY_MS,
            )?,
            retry_max_delay_ms: numeric(ini, "retry", "max_delay_ms", DEFAULT_RETRY_MAX_DELAY_MS)?,
            scan_interval_secs: numeric(
                ini,
                "ingest",
                "scan_interval_secs",
                DEFAULT_SCAN_INTERVAL_SECS,
            )?,
            max_concurrent_files: numeric(ini, "ingest", "max_concurrent_files", 1usize)?.max(1),
            log_level: ini
                .get("logging", "level")
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            log_file_path: ini
                .get("logging", "file")
                .map(|s| PathBuf::from(expand_home(&s)))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            log_max_bytes: numeric(ini, "logging", "max_bytes", DEFAULT_LOG_MAX_BYTES)?,
            log_backup_count: numeric(ini, "logging", "backup_count", DEFAULT_LOG_BACKUP_COUNT)?,
            load_warnings: Vec::new(),
        })
    }

    /// Documented override set, carried over from the original deployment:
    /// `KAFKA_BROKER`, `KAFKA_TOPIC`, `KAFKA_CLIENT_ID`, `APP_LOG_FILE`,
    /// `APP_LOG_LEVEL`, `APP_LOG_MAX_BYTES`, `APP_LOG_BACKUP_COUNT`.
    fn apply_env_overrides(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Some(v) = env_string("KAFKA_BROKER") {
            self.broker_address = v;
        }
        if let Some(v) = env_string("KAFKA_TOPIC") {
            self.topic_name = v;
        }
        if let Some(v) = env_string("KAFKA_CLIENT_ID") {
            self.client_id = v;
        }
        if let Some(v) = env_string("APP_LOG_FILE") {
            self.log_file_path = PathBuf::from(expand_home(&v));
        }
        if let Some(v) = env_string("APP_LOG_LEVEL") {
            self.log_level = v.to_lowercase();
        }
        self.log_max_bytes = env_numeric("APP_LOG_MAX_BYTES", self.log_max_bytes, &mut warnings);
        self.log_backup_count =
            env_numeric("APP_LOG_BACKUP_COUNT", self.log_backup_count, &mut warnings);
        warnings
    }
}

fn required_path(ini: &Ini, section: &str, key: &str) -> Result<PathBuf, ConfigError> {
    match ini.get(section, key) {
        Some(raw) if !raw.trim().is_empty() => Ok(PathBuf::from(expand_home(raw.trim()))),
        _ => Err(ConfigError::Invalid(format!(
            "missing '{}' in [{}] section",
            key, section
        ))),
    }
}

fn numeric<T: std::str::FromStr>(
    ini: &Ini,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match ini.get(section, key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "[{}] {} = '{}' is not a valid number",
                section, key, raw
            ))
        }),
        None => Ok(default),
    }
}

/// Parse `[schema] columns = id:number, amount:number, note:string`.
fn parse_columns(raw: &str) -> Result<Vec<ColumnSpec>, ConfigError> {
    let mut specs = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (name, ty) = part.split_once(':').ok_or_else(|| {
            ConfigError::Invalid(format!(
                "column declaration '{}' must be 'name:type'",
                part
            ))
        })?;
        let ty: ColumnType = ty
            .trim()
            .parse()
            .map_err(ConfigError::Invalid)?;
        specs.push(ColumnSpec {
            name: name.trim().to_string(),
            ty,
        });
    }
    Ok(specs)
}

fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{}{}", home, &path[1..]);
        }
    }
    path.to_string()
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Malformed numeric overrides fall back to the prior-precedence value; the
/// warning is deferred to the caller since the logger is not up yet.
fn env_numeric<T: std::str::FromStr + Copy>(
    name: &str,
    current: T,
    warnings: &mut Vec<String>,
) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warnings.push(format!(
                    "{}='{}' is not a valid number; keeping configured value",
                    name, raw
                ));
                current
            }
        },
        Err(_) => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_str(content: &str) -> Result<AppConfig, ConfigError> {
        let mut ini = Ini::new();
        ini.read(content.to_string()).map_err(ConfigError::Io)?;
        AppConfig::from_ini(&ini)
    }

    const MINIMAL: &str = "
[paths]
input_folder = /data/in
archive_folder = /data/archive
error_folder = /data/error
";

    #[test]
    fn test_minimal_config_gets_defaults() {
        let cfg = from_str(MINIMAL).unwrap();
        assert_eq!(cfg.watch_dir, PathBuf::from("/data/in"));
        assert_eq!(cfg.client_id, DEFAULT_CLIENT_ID);
        assert_eq!(cfg.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(cfg.scan_interval_secs, DEFAULT_SCAN_INTERVAL_SECS);
        assert_eq!(cfg.max_concurrent_files, 1);
        assert!(cfg.columns.is_empty());
        assert!(cfg.key_column.is_none());
        assert!(cfg.broker_address.is_empty());
    }

    #[test]
    fn test_missing_paths_section_is_invalid() {
        let err = from_str("[kafka]\nbroker = localhost:9092\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_full_config() {
        let cfg = from_str(
            "
[paths]
input_folder = /in
archive_folder = /arch
error_folder = /err

[kafka]
broker = kafka1:9092,kafka2:9092
topic = orders
client_id = ingest-1

[schema]
columns = id:number, amount:number, note:string, day:date
key_column = id

[retry]
max_retries = 3
base_delay_ms = 50
max_delay_ms = 1000

[ingest]
scan_interval_secs = 5
max_concurrent_files = 4

[logging]
level = debug
max_bytes = 1024
backup_count = 2
",
        )
        .unwrap();
        assert_eq!(cfg.broker_address, "kafka1:9092,kafka2:9092");
        assert_eq!(cfg.topic_name, "orders");
        assert_eq!(cfg.columns.len(), 4);
        assert_eq!(cfg.columns[3].ty, ColumnType::Date);
        assert_eq!(cfg.key_column.as_deref(), Some("id"));
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.retry_policy().base_delay, Duration::from_millis(50));
        assert_eq!(cfg.max_concurrent_files, 4);
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.log_max_bytes, 1024);
        assert_eq!(cfg.log_backup_count, 2);
    }

    #[test]
    fn test_bad_column_type_is_invalid() {
        let err = from_str(&format!("{}\n[schema]\ncolumns = id:blob\n", MINIMAL)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_bad_numeric_is_invalid() {
        let err =
            from_str(&format!("{}\n[retry]\nmax_retries = many\n", MINIMAL)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_numeric_env_falls_back_and_collects_warning() {
        // APP_LOG_BACKUP_COUNT is only touched by this test
        std::env::set_var("APP_LOG_BACKUP_COUNT", "lots");
        let mut cfg = from_str(MINIMAL).unwrap();
        let warnings = cfg.apply_env_overrides();
        std::env::remove_var("APP_LOG_BACKUP_COUNT");

        assert_eq!(cfg.log_backup_count, DEFAULT_LOG_BACKUP_COUNT);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("APP_LOG_BACKUP_COUNT"));
    }

    #[test]
    fn test_zero_concurrency_clamped_to_one() {
        let cfg =
            from_str(&format!("{}\n[ingest]\nmax_concurrent_files = 0\n", MINIMAL)).unwrap();
        assert_eq!(cfg.max_concurrent_files, 1);
    }
}
