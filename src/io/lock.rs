//! Lock file management for single-instance enforcement.
//!
//! Only one stripctl process may drive the strip at a time. The lock lives in
//! `$XDG_RUNTIME_DIR/stripctl.lock` and holds the owner's PID, so a lock left
//! behind by a crashed process can be recognized and cleared.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// An acquired instance lock. Released and removed on drop.
pub struct LockFile {
    file: File,
    path: PathBuf,
}

impl LockFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

pub fn get_lock_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(runtime_dir).join("stripctl.lock")
}

/// Acquire an exclusive lock on the lock file.
///
/// # Returns
/// - `Ok(Ok(lock))` if the lock was acquired
/// - `Ok(Err(pid))` if another running instance (with that PID) holds it
/// - `Err(_)` if the lock file could not be created or written
pub fn acquire_lock() -> Result<std::result::Result<LockFile, u32>> {
    let lock_path = get_lock_path();

    match try_lock(&lock_path)? {
        Some(lock) => Ok(Ok(lock)),
        None => {
            match read_owner_pid(&lock_path) {
                Some(pid) if is_process_running(pid) => return Ok(Err(pid)),
                _ => {
                    log_warning!("Removing stale lock file");
                    let _ = std::fs::remove_file(&lock_path);
                }
            }

            // Retry once after clearing the stale lock
            match try_lock(&lock_path)? {
                Some(lock) => Ok(Ok(lock)),
                None => Ok(Err(read_owner_pid(&lock_path).unwrap_or(0))),
            }
        }
    }
}

/// Acquire the instance lock or fail with the owner's PID.
pub fn ensure_single_instance() -> Result<LockFile> {
    match acquire_lock()? {
        Ok(lock) => Ok(lock),
        Err(pid) => anyhow::bail!(
            "stripctl is already running (PID {pid}); the strip accepts only one connection"
        ),
    }
}

fn try_lock(lock_path: &Path) -> Result<Option<LockFile>> {
    // Open without truncating to keep the owner's PID readable on conflict
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?;

    if file.try_lock_exclusive().is_err() {
        return Ok(None);
    }

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(&file, "{}", std::process::id())?;
    file.flush()?;

    Ok(Some(LockFile {
        file,
        path: lock_path.to_path_buf(),
    }))
}

fn read_owner_pid(lock_path: &Path) -> Option<u32> {
    std::fs::read_to_string(lock_path)
        .ok()?
        .lines()
        .next()?
        .trim()
        .parse()
        .ok()
}

fn is_process_running(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}
