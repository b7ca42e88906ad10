//! Lock files in the state directory.
//!
//! Two locks exist:
//! - `schedule.lock` serializes every cancel-then-create cycle, so a CLI `schedule`
//!   and the daemon's automatic reschedule can never interleave
//! - `daemon.lock` enforces a single alarm daemon per state directory and records
//!   its PID for `salatr status`
//!
//! Both are advisory `flock` locks, released by the kernel when the holder exits, so
//! a crashed process never leaves a stale lock behind.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::constants::{DAEMON_LOCK_NAME, SCHEDULE_LOCK_NAME};

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    // Never truncate on open: the daemon lock's content belongs to the holder
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("failed to open lock file {}", path.display()))
}

/// Held for the duration of one scheduling or cancellation run.
#[derive(Debug)]
pub struct ScheduleLock {
    file: File,
}

impl ScheduleLock {
    /// Block until no other process is scheduling.
    pub fn acquire(state_dir: &Path) -> Result<Self> {
        let path = state_dir.join(SCHEDULE_LOCK_NAME);
        let file = open_lock_file(&path)?;
        file.lock_exclusive()
            .with_context(|| format!("failed to lock {}", path.display()))?;
        Ok(Self { file })
    }
}

impl Drop for ScheduleLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Proof that this process is the only running daemon.
#[derive(Debug)]
pub struct DaemonLock {
    file: File,
    path: PathBuf,
}

impl DaemonLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DaemonLock {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        let _ = FileExt::unlock(&self.file);
    }
}

/// Try to become the daemon.
///
/// # Returns
/// - `Ok(Ok(lock))` when the lock was acquired and our PID written into it
/// - `Ok(Err(pid))` when another daemon holds it (`pid` is 0 if unreadable)
pub fn acquire_daemon_lock(state_dir: &Path) -> Result<std::result::Result<DaemonLock, u32>> {
    let path = state_dir.join(DAEMON_LOCK_NAME);
    let mut file = open_lock_file(&path)?;

    if file.try_lock_exclusive().is_err() {
        return Ok(Err(read_pid(&mut file).unwrap_or(0)));
    }

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(&file, "{}", std::process::id())?;
    file.flush()?;

    Ok(Ok(DaemonLock { file, path }))
}

/// PID of the running daemon, if any.
pub fn running_daemon_pid(state_dir: &Path) -> Option<u32> {
    let path = state_dir.join(DAEMON_LOCK_NAME);
    let mut file = OpenOptions::new().read(true).write(true).open(&path).ok()?;
    if file.try_lock_exclusive().is_ok() {
        // Nobody holds it
        let _ = FileExt::unlock(&file);
        return None;
    }
    Some(read_pid(&mut file).unwrap_or(0))
}

fn read_pid(file: &mut File) -> Option<u32> {
    let mut content = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut content).ok()?;
    content.lines().next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_daemon_lock_is_exclusive() {
        let dir = tempdir().unwrap();

        let first = acquire_daemon_lock(dir.path()).unwrap().unwrap();
        assert_eq!(running_daemon_pid(dir.path()), Some(std::process::id()));

        let second = acquire_daemon_lock(dir.path()).unwrap();
        assert_eq!(second.unwrap_err(), std::process::id());

        drop(first);
        assert_eq!(running_daemon_pid(dir.path()), None);
        assert!(acquire_daemon_lock(dir.path()).unwrap().is_ok());
    }

    #[test]
    fn test_no_daemon_without_lock_file() {
        let dir = tempdir().unwrap();
        assert_eq!(running_daemon_pid(dir.path()), None);
    }

    #[test]
    fn test_schedule_lock_can_be_reacquired() {
        let dir = tempdir().unwrap();
        let lock = ScheduleLock::acquire(dir.path()).unwrap();
        drop(lock);
        let _again = ScheduleLock::acquire(dir.path()).unwrap();
        assert!(dir.path().join(SCHEDULE_LOCK_NAME).exists());
    }
}
