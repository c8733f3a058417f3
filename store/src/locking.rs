//! Project-wide advisory lock (§4.3): a lock file acquired with exclusive
//! advisory semantics, held only while an operation straddles the database
//! and the filesystem (context-file writes). Detects a crashed process's
//! stale lock by PID liveness and age, and steals it past the grace period.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use task_core::error::{Result, TaskError};

pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_STALE_GRACE: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize, Deserialize)]
struct LockMetadata {
    pid: u32,
    acquired_at: chrono::DateTime<Utc>,
}

/// RAII guard: the lock file is released (and removed) on drop.
#[derive(Debug)]
pub struct ProjectLock {
    path: PathBuf,
    file: File,
}

impl ProjectLock {
    /// Acquire the advisory lock at `path`, retrying until `timeout`
    /// elapses. Before giving up, attempts to steal a lock whose holder is
    /// dead or whose age exceeds `stale_grace`.
    pub fn acquire(path: &Path, timeout: Duration, stale_grace: Duration) -> Result<Self> {
        let deadline = Instant::now() + timeout;
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .open(path)
                .map_err(|e| TaskError::Internal(format!("cannot open lock file: {e}")))?;

            match file.try_lock_exclusive() {
                Ok(()) => {
                    write_metadata(&file)?;
                    return Ok(Self { path: path.to_path_buf(), file });
                }
                Err(_) => {
                    if is_stale(path, stale_grace) {
                        tracing::warn!(?path, "stealing stale advisory lock");
                        let _ = std::fs::remove_file(path);
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(TaskError::LockTimeout(format!(
                            "could not acquire {} within {:?}",
                            path.display(),
                            timeout
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        }
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

fn write_metadata(mut file: &File) -> Result<()> {
    let metadata = LockMetadata { pid: std::process::id(), acquired_at: Utc::now() };
    let json = serde_json::to_string(&metadata)
        .map_err(|e| TaskError::Internal(format!("lock metadata encode failed: {e}")))?;
    file.set_len(0).map_err(|e| TaskError::Internal(format!("lock file truncate failed: {e}")))?;
    use std::io::Seek;
    file.seek(std::io::SeekFrom::Start(0))
        .map_err(|e| TaskError::Internal(format!("lock file seek failed: {e}")))?;
    file.write_all(json.as_bytes())
        .map_err(|e| TaskError::Internal(format!("lock metadata write failed: {e}")))?;
    file.flush().ok();
    Ok(())
}

fn is_stale(path: &Path, grace: Duration) -> bool {
    let Ok(mut file) = File::open(path) else {
        return false;
    };
    let mut contents = String::new();
    if file.read_to_string(&mut contents).is_err() || contents.is_empty() {
        return false;
    }
    let Ok(metadata) = serde_json::from_str::<LockMetadata>(&contents) else {
        return false;
    };
    let age = Utc::now().signed_duration_since(metadata.acquired_at);
    let age_exceeds_grace = age.num_seconds().max(0) as u64 > grace.as_secs();
    age_exceeds_grace || !pid_is_alive(metadata.pid)
}

#[cfg(unix)]
fn pid_is_alive(pid: u32) -> bool {
    // Signal 0 performs existence/permission checks without delivering a
    // signal; ESRCH means the process is gone.
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(not(unix))]
fn pid_is_alive(_pid: u32) -> bool {
    // Non-unix platforms fall back to age-based staleness only.
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_drop_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join(".lock");
        {
            let _guard = ProjectLock::acquire(&lock_path, Duration::from_secs(1), DEFAULT_STALE_GRACE).unwrap();
            assert!(lock_path.exists());
        }
        assert!(!lock_path.exists());
    }

    #[test]
    fn second_acquire_times_out_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join(".lock");
        let _guard = ProjectLock::acquire(&lock_path, Duration::from_secs(1), DEFAULT_STALE_GRACE).unwrap();
        let err = ProjectLock::acquire(&lock_path, Duration::from_millis(200), DEFAULT_STALE_GRACE).unwrap_err();
        assert!(matches!(err, TaskError::LockTimeout(_)));
    }

    #[test]
    fn stale_lock_with_dead_pid_is_stolen() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join(".lock");
        let fake = LockMetadata { pid: 999_999_999, acquired_at: Utc::now() };
        std::fs::write(&lock_path, serde_json::to_string(&fake).unwrap()).unwrap();
        let guard = ProjectLock::acquire(&lock_path, Duration::from_secs(2), DEFAULT_STALE_GRACE);
        assert!(guard.is_ok());
    }
}
