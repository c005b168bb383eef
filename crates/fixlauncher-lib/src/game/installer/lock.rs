use crate::error::InstallError;
use crate::utils::process::is_pid_running;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const LOCK_FILE_NAME: &str = ".fixlauncher-install.lock";

/// Locks older than this are assumed to belong to a crashed launcher.
pub const STALE_AFTER_MINUTES: i64 = 15;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LockInfo {
    pid: u32,
    created_at: DateTime<Utc>,
}

/// Exclusive per-profile install lock. Released on drop.
#[derive(Debug)]
pub struct InstallLock {
    path: PathBuf,
}

impl InstallLock {
    pub fn acquire(profile_root: &Path) -> Result<Self, InstallError> {
        std::fs::create_dir_all(profile_root)
            .with_context(|| format!("Failed to create {:?}", profile_root))?;
        let path = profile_root.join(LOCK_FILE_NAME);

        // One retry after clearing a stale lock
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let info = LockInfo {
                        pid: std::process::id(),
                        created_at: Utc::now(),
                    };
                    let body = serde_json::to_string(&info).context("serialize lock")?;
                    file.write_all(body.as_bytes())
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    log::debug!("[lock] acquired {:?}", path);
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if !is_stale(&path) {
                        return Err(InstallError::Locked(profile_root.to_path_buf()));
                    }
                    log::warn!("[lock] replacing stale lock {:?}", path);
                    if let Err(e) = std::fs::remove_file(&path) {
                        if e.kind() != ErrorKind::NotFound {
                            return Err(anyhow::Error::new(e)
                                .context(format!("Failed to remove stale lock {:?}", path))
                                .into());
                        }
                    }
                }
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("Failed to create lock {:?}", path))
                        .into())
                }
            }
        }
        Err(InstallError::Locked(profile_root.to_path_buf()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("[lock] failed to release {:?}: {}", self.path, e);
        }
    }
}

/// Unreadable locks, locks from dead processes and old locks are stale.
fn is_stale(path: &Path) -> bool {
    let info: LockInfo = match std::fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
    {
        Some(info) => info,
        None => return true,
    };
    if info.pid != std::process::id() && !is_pid_running(info.pid) {
        return true;
    }
    Utc::now().signed_duration_since(info.created_at).num_minutes() >= STALE_AFTER_MINUTES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused_until_release() {
        let tmp = tempfile::tempdir().unwrap();
        let lock = InstallLock::acquire(tmp.path()).unwrap();
        assert!(lock.path().exists());

        let err = InstallLock::acquire(tmp.path()).unwrap_err();
        assert!(matches!(err, InstallError::Locked(_)));

        drop(lock);
        assert!(!tmp.path().join(LOCK_FILE_NAME).exists());
        InstallLock::acquire(tmp.path()).unwrap();
    }

    #[test]
    fn old_lock_is_replaced() {
        let tmp = tempfile::tempdir().unwrap();
        let stale = LockInfo {
            pid: std::process::id(),
            created_at: Utc::now() - chrono::Duration::minutes(STALE_AFTER_MINUTES + 1),
        };
        std::fs::write(
            tmp.path().join(LOCK_FILE_NAME),
            serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();
        assert!(InstallLock::acquire(tmp.path()).is_ok());
    }

    #[test]
    fn garbage_lock_is_replaced() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(LOCK_FILE_NAME), "???").unwrap();
        assert!(InstallLock::acquire(tmp.path()).is_ok());
    }
}
