//! Watch-directory scanning and the scan-pass driver
//!
//! Each scan re-lists the directory (no persisted cursor), keeps plain
//! `.csv` files, skips dotfiles and subdirectories, and orders candidates
//! lexicographically for determinism. Files currently held by a worker are
//! tracked in an in-memory claimed set so a rescan never double-processes
//! a file that is still in flight.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::fileflow::kafka::RecordSink;

use super::error::ConfigError;
use super::processor::FileProcessor;

const DATA_FILE_EXTENSION: &str = "csv";

/// A file found by a scan pass. Consumed exactly once, never mutated.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub discovered_at: SystemTime,
}

impl CandidateFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            discovered_at: SystemTime::now(),
        }
    }
}

/// In-memory claim lock: a path is claimed before its worker starts and
/// released after relocation, so overlapping scans skip in-flight files.
#[derive(Debug, Clone, Default)]
pub struct ClaimedSet {
    inner: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ClaimedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a path. Returns false when some worker already holds it.
    pub fn claim(&self, path: &Path) -> bool {
        self.inner.lock().unwrap().insert(path.to_path_buf())
    }

    pub fn release(&self, path: &Path) {
        self.inner.lock().unwrap().remove(path);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.inner.lock().unwrap().contains(path)
    }
}

/// Cooperative shutdown switch shared between the signal listener and the
/// scan-pass driver. Tripping it stops new files from being picked up;
/// in-flight files always run to completion.
#[derive(Debug, Clone)]
pub struct ShutdownFlag {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for ShutdownFlag {
    fn default() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the flag has been tripped.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Releases the claim on drop, so a panicking worker cannot leave its path
/// claimed for the rest of the process lifetime.
struct ClaimGuard {
    claimed: ClaimedSet,
    path: PathBuf,
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        self.claimed.release(&self.path);
    }
}

/// List candidate files in `watch_dir`, excluding claimed paths.
///
/// A missing or unlistable directory is a fatal configuration error, not a
/// per-file condition.
pub fn scan(watch_dir: &Path, claimed: &ClaimedSet) -> Result<Vec<CandidateFile>, ConfigError> {
    if !watch_dir.is_dir() {
        return Err(ConfigError::WatchDirMissing(watch_dir.to_path_buf()));
    }

    let entries = std::fs::read_dir(watch_dir)
        .map_err(|e| ConfigError::ListDir(watch_dir.to_path_buf(), e.to_string()))?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| ConfigError::ListDir(watch_dir.to_path_buf(), e.to_string()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') {
            continue;
        }
        let is_data_file = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(DATA_FILE_EXTENSION));
        if !is_data_file {
            continue;
        }
        if claimed.contains(&path) {
            log::debug!("skipping '{}': claimed by an in-flight worker", name);
            continue;
        }
        candidates.push(CandidateFile::new(path));
    }

    candidates.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(candidates)
}

/// Run one scan pass: list candidates and process each end-to-end.
///
/// `max_concurrent` of 1 (the default mode) processes files strictly
/// sequentially in lexicographic order; higher values use a bounded worker
/// pool where no two workers ever hold the same file. Individual file
/// failures never fail the pass. Returns the number of files processed.
///
/// When `shutdown` trips mid-pass, the file currently being processed is
/// drained to completion and the remaining candidates are left in place for
/// the next start.
pub async fn run_scan_pass<S: RecordSink + 'static>(
    processor: Arc<FileProcessor<S>>,
    watch_dir: &Path,
    claimed: &ClaimedSet,
    max_concurrent: usize,
    shutdown: &ShutdownFlag,
) -> Result<usize, ConfigError> {
    let candidates = scan(watch_dir, claimed)?;
    if candidates.is_empty() {
        log::debug!("no candidate files in '{}'", watch_dir.display());
        return Ok(0);
    }
    log::info!(
        "scan pass: {} candidate file(s) in '{}'",
        candidates.len(),
        watch_dir.display()
    );

    if max_concurrent <= 1 {
        let mut processed = 0usize;
        for candidate in candidates {
            if shutdown.is_triggered() {
                log::info!("shutdown requested; leaving remaining candidates in place");
                break;
            }
            if !claimed.claim(&candidate.path) {
                continue;
            }
            let _claim = ClaimGuard {
                claimed: claimed.clone(),
                path: candidate.path.clone(),
            };
            processor.process(&candidate).await;
            processed += 1;
        }
        return Ok(processed);
    }

    let semaphore = Arc::new(Semaphore::new(max_concurrent));
    let mut tasks = JoinSet::new();
    for candidate in candidates {
        if shutdown.is_triggered() {
            log::info!("shutdown requested; leaving remaining candidates in place");
            break;
        }
        if !claimed.claim(&candidate.path) {
            continue;
        }
        let processor = Arc::clone(&processor);
        let claimed = claimed.clone();
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _claim = ClaimGuard {
                claimed,
                path: candidate.path.clone(),
            };
            // Semaphore closing is not used; acquire cannot fail here
            let _permit = semaphore.acquire().await.expect("semaphore closed");
            processor.process(&candidate).await;
        });
    }

    let mut processed = 0usize;
    while let Some(res) = tasks.join_next().await {
        if let Err(e) = res {
            log::error!("file worker panicked: {}", e);
        } else {
            processed += 1;
        }
    }
    Ok(processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_filters_and_orders() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.csv"), "x").unwrap();
        fs::write(tmp.path().join("a.CSV"), "x").unwrap();
        fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        fs::write(tmp.path().join(".hidden.csv"), "x").unwrap();
        fs::create_dir(tmp.path().join("sub.csv")).unwrap();

        let found = scan(tmp.path(), &ClaimedSet::new()).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|c| c.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.CSV", "b.csv"]);
    }

    #[test]
    fn test_scan_missing_dir_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let err = scan(&tmp.path().join("nope"), &ClaimedSet::new()).unwrap_err();
        assert!(matches!(err, ConfigError::WatchDirMissing(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_scan_excludes_claimed_paths() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.csv");
        fs::write(&path, "x").unwrap();

        let claimed = ClaimedSet::new();
        assert!(claimed.claim(&path));
        assert!(scan(tmp.path(), &claimed).unwrap().is_empty());

        claimed.release(&path);
        assert_eq!(scan(tmp.path(), &claimed).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_flag_trips_and_wakes_waiters() {
        let flag = ShutdownFlag::new();
        assert!(!flag.is_triggered());

        let waiter = {
            let flag = flag.clone();
            tokio::spawn(async move { flag.triggered().await })
        };
        flag.trigger();
        assert!(flag.is_triggered());
        waiter.await.unwrap();
    }

    #[test]
    fn test_claim_guard_releases_on_drop() {
        let claimed = ClaimedSet::new();
        let path = PathBuf::from("/tmp/guarded.csv");
        assert!(claimed.claim(&path));
        drop(ClaimGuard {
            claimed: claimed.clone(),
            path: path.clone(),
        });
        assert!(!claimed.contains(&path));
    }

    #[test]
    fn test_claim_is_exclusive() {
        let claimed = ClaimedSet::new();
        let path = Path::new("/tmp/whatever.csv");
        assert!(claimed.claim(path));
        assert!(!claimed.claim(path));
        claimed.release(path);
        assert!(claimed.claim(path));
    }
}
