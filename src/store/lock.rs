//! The run lock: an advisory lease file that serializes ticks against a
//! single run, with stale-lease takeover so a crashed holder never wedges
//! the run permanently.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::io::atomic_write_json;

const LOCK_FILE: &str = "lock.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockLease {
    holder: String,
    acquired_at: DateTime<Utc>,
    heartbeat_at: DateTime<Utc>,
    lease_seconds: u64,
}

impl LockLease {
    fn expires_at(&self) -> DateTime<Utc> {
        self.heartbeat_at + ChronoDuration::seconds(self.lease_seconds as i64)
    }

    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }
}

/// An acquired lease; `release` drops it explicitly, or it is released
/// implicitly on `Drop` (best-effort, swallowing errors).
pub struct RunLock {
    path: PathBuf,
    lease: LockLease,
}

impl RunLock {
    fn lock_path(run_root: &Path) -> PathBuf {
        run_root.join(LOCK_FILE)
    }

    /// Acquire the run lock for `holder` (typically `"<pid>@<hostname>"` or a
    /// tick invocation id). Fails with [`CoreError::LockUnavailable`] if a
    /// live lease is already held by someone else; takes over a stale one.
    pub fn acquire(run_root: &Path, holder: &str, lease_seconds: u64) -> CoreResult<Self> {
        let path = Self::lock_path(run_root);
        let now = Utc::now();

        if let Ok(bytes) = fs::read(&path) {
            if let Ok(existing) = serde_json::from_slice::<LockLease>(&bytes) {
                if !existing.is_stale(now) && existing.holder != holder {
                    return Err(CoreError::LockUnavailable(format!(
                        "held by {} until {}",
                        existing.holder,
                        existing.expires_at()
                    )));
                }
            }
        }

        let lease = LockLease {
            holder: holder.to_string(),
            acquired_at: now,
            heartbeat_at: now,
            lease_seconds,
        };
        atomic_write_json(&path, &lease)?;
        Ok(Self { path, lease })
    }

    /// Extend the lease; callers issuing long-running ticks should heartbeat
    /// periodically so a live holder is never mistaken for stale.
    pub fn heartbeat(&mut self) -> CoreResult<()> {
        self.lease.heartbeat_at = Utc::now();
        atomic_write_json(&self.path, &self.lease)
    }

    /// Release the lock, but only if we still hold it — guards against
    /// releasing a lease someone else has since taken over after ours went
    /// stale.
    pub fn release(self) -> CoreResult<()> {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(current) = serde_json::from_slice::<LockLease>(&bytes) {
                if current.holder != self.lease.holder
                    || current.acquired_at != self.lease.acquired_at
                {
                    return Err(CoreError::LockLost(format!(
                        "lease now held by {}",
                        current.holder
                    )));
                }
            }
        }
        let _ = fs::remove_file(&self.path);
        Ok(())
    }
}
