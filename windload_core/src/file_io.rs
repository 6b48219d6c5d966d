//! # File I/O Module
//!
//! JSON file helpers shared by the config loader and the file-backed load
//! store:
//! - **Atomic saves**: write to `.tmp`, fsync, rename over the target
//! - **File locking**: exclusive OS lock plus a `.lock` metadata file
//! - **Version validation**: schema compatibility of versioned files
//!
//! ## Example
//!
//! ```rust,no_run
//! use windload_core::file_io::{write_json_atomic, read_json, FileLock};
//! use std::collections::BTreeMap;
//! use std::path::Path;
//!
//! let path = Path::new("loads.json");
//! let lock = FileLock::acquire(path, "engineer@company.com").unwrap();
//!
//! let data: BTreeMap<String, f64> = BTreeMap::new();
//! write_json_atomic(&data, path).unwrap();
//! let back: BTreeMap<String, f64> = read_json(path).unwrap();
//!
//! drop(lock);
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::{LoadError, LoadResult};

/// Locks older than this are considered abandoned
const STALE_LOCK_HOURS: i64 = 24;

/// Lock file metadata stored next to the locked file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// User identifier (email or username)
    pub user_id: String,
    /// Machine name where lock was acquired
    pub machine: String,
    /// Process ID that holds the lock
    pub pid: u32,
    /// When the lock was acquired
    pub locked_at: DateTime<Utc>,
}

impl LockInfo {
    /// Lock info for the current process
    pub fn new(user_id: impl Into<String>) -> Self {
        LockInfo {
            user_id: user_id.into(),
            machine: hostname().unwrap_or_else(|| "unknown".to_string()),
            pid: std::process::id(),
            locked_at: Utc::now(),
        }
    }

    /// Whether the holder is gone (dead pid on this machine) or the lock is too old
    pub fn is_stale(&self) -> bool {
        if let Some(our_machine) = hostname() {
            if self.machine == our_machine && !process_alive(self.pid) {
                return true;
            }
        }
        (Utc::now() - self.locked_at).num_hours() > STALE_LOCK_HOURS
    }
}

fn hostname() -> Option<String> {
    #[cfg(windows)]
    {
        std::env::var("COMPUTERNAME").ok()
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOSTNAME")
            .ok()
            .or_else(|| std::env::var("HOST").ok())
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    fs::metadata(format!("/proc/{}", pid)).is_ok()
}

#[cfg(windows)]
fn process_alive(pid: u32) -> bool {
    use std::process::Command;
    match Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid), "/NH"])
        .output()
    {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            !stdout.contains("No tasks") && stdout.contains(&pid.to_string())
        }
        Err(_) => true,
    }
}

#[cfg(not(any(unix, windows)))]
fn process_alive(_pid: u32) -> bool {
    true
}

/// Exclusive lock on a file, released when dropped.
///
/// Holds an OS-level lock (fs2) on the `.lock` file and writes [`LockInfo`]
/// into it so other users can see who holds the file.
pub struct FileLock {
    target: PathBuf,
    lock_path: PathBuf,
    _lock_file: File,
    pub info: LockInfo,
}

impl FileLock {
    /// Acquire the lock for `path`.
    ///
    /// A live lock held by someone else gives [`LoadError::FileLocked`]; a
    /// stale one is taken over.
    pub fn acquire(path: &Path, user_id: impl Into<String>) -> LoadResult<Self> {
        let lock_path = lock_path_for(path);
        let info = LockInfo::new(user_id);

        if let Some(existing) = read_lock_info(&lock_path) {
            if !existing.is_stale() {
                return Err(LoadError::file_locked(
                    path.display().to_string(),
                    format!("{} ({})", existing.user_id, existing.machine),
                    existing.locked_at.to_rfc3339(),
                ));
            }
            tracing::warn!(
                path = %lock_path.display(),
                holder = %existing.user_id,
                "taking over stale lock"
            );
        }

        let mut lock_file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(|e| {
                LoadError::file_error("create lock", lock_path.display().to_string(), e.to_string())
            })?;

        lock_file.try_lock_exclusive().map_err(|_| {
            LoadError::file_locked(path.display().to_string(), "another process", "unknown")
        })?;

        let lock_json = serde_json::to_string_pretty(&info)
            .map_err(|e| LoadError::serialization(e.to_string()))?;
        lock_file
            .write_all(lock_json.as_bytes())
            .and_then(|_| lock_file.sync_all())
            .map_err(|e| {
                LoadError::file_error("write lock", lock_path.display().to_string(), e.to_string())
            })?;

        Ok(FileLock {
            target: path.to_path_buf(),
            lock_path,
            _lock_file: lock_file,
            info,
        })
    }

    /// Current live lock on `path`, if any
    pub fn check(path: &Path) -> Option<LockInfo> {
        read_lock_info(&lock_path_for(path)).filter(|info| !info.is_stale())
    }

    /// The locked file
    pub fn target(&self) -> &Path {
        &self.target
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

/// `<file>.<ext>.lock` next to the locked file
pub fn lock_path_for(path: &Path) -> PathBuf {
    with_suffix(path, "lock")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut out = path.to_path_buf();
    let extension = out
        .extension()
        .map(|e| format!("{}.{}", e.to_string_lossy(), suffix))
        .unwrap_or_else(|| suffix.to_string());
    out.set_extension(extension);
    out
}

fn read_lock_info(lock_path: &Path) -> Option<LockInfo> {
    let contents = fs::read_to_string(lock_path).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Serialize `value` as pretty JSON and replace `path` atomically.
///
/// 1. write `<path>.tmp`
/// 2. fsync
/// 3. rename over `path`
pub fn write_json_atomic<T: Serialize + ?Sized>(value: &T, path: &Path) -> LoadResult<()> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| LoadError::serialization(e.to_string()))?;
    let tmp_path = with_suffix(path, "tmp");
    let tmp_error = |operation: &str, e: std::io::Error| {
        LoadError::file_error(operation, tmp_path.display().to_string(), e.to_string())
    };

    let mut tmp_file = File::create(&tmp_path).map_err(|e| tmp_error("create temp file", e))?;
    tmp_file
        .write_all(json.as_bytes())
        .map_err(|e| tmp_error("write temp file", e))?;
    tmp_file
        .sync_all()
        .map_err(|e| tmp_error("sync temp file", e))?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        LoadError::file_error("rename to final", path.display().to_string(), e.to_string())
    })
}

/// Read and parse a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> LoadResult<T> {
    let mut file = File::open(path)
        .map_err(|e| LoadError::file_error("open", path.display().to_string(), e.to_string()))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| LoadError::file_error("read", path.display().to_string(), e.to_string()))?;

    serde_json::from_str(&contents)
        .map_err(|e| LoadError::serialization(format!("Invalid JSON in {}: {}", path.display(), e)))
}

/// Check that `file_version` can be read by code at `expected`.
///
/// The major version must match; for 0.x a newer minor is rejected.
pub fn validate_version(file_version: &str, expected: &str) -> LoadResult<()> {
    let parse = |v: &str| -> Vec<u32> {
        v.split('.')
            .filter_map(|p| p.trim().parse().ok())
            .collect()
    };
    let file_parts = parse(file_version);
    let current_parts = parse(expected);

    let mismatch = || LoadError::VersionMismatch {
        file_version: file_version.to_string(),
        expected_version: expected.to_string(),
    };

    if file_parts.is_empty() || current_parts.is_empty() || file_parts[0] != current_parts[0] {
        return Err(mismatch());
    }

    if current_parts[0] == 0
        && file_parts.len() > 1
        && current_parts.len() > 1
        && file_parts[1] > current_parts[1]
    {
        return Err(mismatch());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::env::temp_dir;

    fn temp_path(name: &str) -> PathBuf {
        temp_dir().join(format!("windload_io_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_lock_path_generation() {
        assert_eq!(
            lock_path_for(Path::new("/path/to/loads.json")),
            Path::new("/path/to/loads.json.lock")
        );
        assert_eq!(lock_path_for(Path::new("/path/to/loads")), Path::new("/path/to/loads.lock"));
    }

    #[test]
    fn test_atomic_write_and_read() {
        let path = temp_path("roundtrip");
        let mut data = BTreeMap::new();
        data.insert("101".to_string(), 2.5);

        write_json_atomic(&data, &path).unwrap();
        assert!(!with_suffix(&path, "tmp").exists());

        let back: BTreeMap<String, f64> = read_json(&path).unwrap();
        assert_eq!(back, data);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_read_errors() {
        let missing = temp_path("missing");
        assert!(matches!(
            read_json::<BTreeMap<String, f64>>(&missing),
            Err(LoadError::FileError { .. })
        ));

        let bad = temp_path("bad");
        fs::write(&bad, "{not json").unwrap();
        assert!(matches!(
            read_json::<BTreeMap<String, f64>>(&bad),
            Err(LoadError::SerializationError { .. })
        ));
        let _ = fs::remove_file(&bad);
    }

    #[test]
    fn test_file_lock_acquire_and_release() {
        let path = temp_path("lock");
        File::create(&path).unwrap();

        let lock = FileLock::acquire(&path, "test@example.com").unwrap();
        assert_eq!(lock.info.user_id, "test@example.com");
        assert!(lock_path_for(&path).exists());
        assert!(FileLock::check(&path).is_some());

        let second = FileLock::acquire(&path, "other@example.com");
        assert!(matches!(second, Err(LoadError::FileLocked { .. })));

        drop(lock);
        assert!(!lock_path_for(&path).exists());
        assert!(FileLock::check(&path).is_none());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_old_lock_is_stale() {
        let mut info = LockInfo::new("someone");
        assert!(!info.is_stale());
        info.locked_at = Utc::now() - chrono::Duration::hours(STALE_LOCK_HOURS + 1);
        assert!(info.is_stale());
    }

    #[test]
    fn test_version_validation() {
        assert!(validate_version("0.1.0", "0.1.0").is_ok());
        assert!(validate_version("0.1.5", "0.1.0").is_ok());
        assert!(validate_version("0.0.9", "0.1.0").is_ok());
        assert!(validate_version("1.0.0", "0.1.0").is_err());
        assert!(validate_version("0.2.0", "0.1.0").is_err());
        assert!(validate_version("garbage", "0.1.0").is_err());
    }
}
