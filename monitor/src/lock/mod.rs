//! 監視ループの二重起動防止
//!
//! `run` はデータディレクトリ内の `monitor.lock` を fs2 で排他ロックし、
//! 保持者の PID と起動時刻を JSON で書き込む。`status` と `clear-cache` は
//! ロックを取らずに保持者を読むだけ。記録された PID が既に存在しない、
//! あるいは中身が読めないロックファイルは前回の異常終了の残骸として扱う。

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, error, warn};

/// Lock file name inside the data directory.
pub const LOCK_FILE_NAME: &str = "monitor.lock";

/// Process recorded in the lock file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockHolder {
    /// PID of the running monitor
    pub pid: u32,
    /// When it started (UTC)
    pub started_at: DateTime<Utc>,
}

impl LockHolder {
    fn this_process() -> Self {
        Self {
            pid: std::process::id(),
            started_at: Utc::now(),
        }
    }

    /// Returns true if the recorded process still exists.
    pub fn is_alive(&self) -> bool {
        is_process_running(self.pid)
    }
}

/// Lock errors
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Another live monitor owns the data directory
    #[error("Monitor already running for {} (PID: {}, started: {})\n\nTo stop: kill -TERM {}", .dir.display(), .holder.pid, .holder.started_at, .holder.pid)]
    AlreadyRunning {
        /// Data directory
        dir: PathBuf,
        /// Current owner
        holder: LockHolder,
    },

    /// Lock file could not be created, locked, written or removed
    #[error("Failed to {action} {}: {source}", .path.display())]
    Io {
        /// What was being attempted
        action: &'static str,
        /// Lock file or data directory
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Lock file exists but does not hold a holder record
    #[error("Lock file {} is unreadable: {reason}", .path.display())]
    Corrupted {
        /// Lock file
        path: PathBuf,
        /// Read or decode failure
        reason: String,
    },
}

fn io_err<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> LockError + 'a {
    move |source| LockError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

/// Lock file path for `data_dir`.
pub fn lock_path(data_dir: &Path) -> PathBuf {
    data_dir.join(LOCK_FILE_NAME)
}

/// プロセス存在確認（sysinfo）
pub fn is_process_running(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
    system.process(Pid::from_u32(pid)).is_some()
}

/// Holder recorded for `data_dir`, whether or not it is still alive.
///
/// A missing or empty file is `Ok(None)`.
pub fn read_holder(data_dir: &Path) -> Result<Option<LockHolder>, LockError> {
    let path = lock_path(data_dir);
    let corrupted = |reason: String| LockError::Corrupted {
        path: path.clone(),
        reason,
    };

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(corrupted(e.to_string())),
    };
    if content.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| corrupted(e.to_string()))
}

/// Live monitor owning `data_dir`, if any.
pub fn current_holder(data_dir: &Path) -> Option<LockHolder> {
    read_holder(data_dir)
        .ok()
        .flatten()
        .filter(LockHolder::is_alive)
}

/// Exclusive ownership of a data directory, released on drop
pub struct MonitorLock {
    file: Option<File>,
    path: PathBuf,
    holder: LockHolder,
}

impl std::fmt::Debug for MonitorLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorLock")
            .field("path", &self.path)
            .field("pid", &self.holder.pid)
            .finish()
    }
}

impl MonitorLock {
    /// Take ownership of `data_dir`, creating it if needed.
    ///
    /// Fails with [`LockError::AlreadyRunning`] while another live monitor
    /// holds it. Leftovers of a dead monitor are removed first.
    pub fn acquire(data_dir: &Path) -> Result<Self, LockError> {
        fs::create_dir_all(data_dir).map_err(io_err("create", data_dir))?;
        let path = lock_path(data_dir);
        Self::clear_leftover(data_dir, &path)?;

        let mut file = File::create(&path).map_err(io_err("create", &path))?;
        file.try_lock_exclusive().map_err(io_err("lock", &path))?;

        let holder = LockHolder::this_process();
        let json = serde_json::to_vec_pretty(&holder)
            .map_err(|e| io_err("encode", &path)(io::Error::other(e)))?;
        file.write_all(&json).map_err(io_err("write", &path))?;
        file.flush().map_err(io_err("write", &path))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
                .map_err(io_err("chmod", &path))?;
        }

        debug!(path = %path.display(), pid = holder.pid, "Monitor lock taken");
        Ok(Self {
            file: Some(file),
            path,
            holder,
        })
    }

    fn clear_leftover(data_dir: &Path, path: &Path) -> Result<(), LockError> {
        match read_holder(data_dir) {
            Ok(None) => return Ok(()),
            Ok(Some(holder)) if holder.is_alive() => {
                return Err(LockError::AlreadyRunning {
                    dir: data_dir.to_path_buf(),
                    holder,
                })
            }
            Ok(Some(holder)) => {
                warn!(pid = holder.pid, "Removing lock left by a dead monitor");
            }
            Err(LockError::Corrupted { reason, .. }) => {
                warn!(%reason, "Removing unreadable lock file");
            }
            Err(e) => return Err(e),
        }
        fs::remove_file(path).map_err(io_err("remove", path))
    }

    /// This process's holder record.
    pub fn holder(&self) -> &LockHolder {
        &self.holder
    }

    /// Unlock and delete the lock file.
    pub fn release(mut self) -> Result<(), LockError> {
        self.unlock()
    }

    fn unlock(&mut self) -> Result<(), LockError> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        file.unlock().map_err(io_err("unlock", &self.path))?;
        drop(file);
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err("remove", &self.path)(e)),
        }
        debug!(path = %self.path.display(), "Monitor lock released");
        Ok(())
    }
}

impl Drop for MonitorLock {
    fn drop(&mut self) {
        if let Err(e) = self.unlock() {
            error!(error = %e, "Failed to release monitor lock");
        }
    }
}
