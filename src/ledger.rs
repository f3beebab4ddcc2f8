//! Usage ledger: counters, quota policies, and snapshot persistence.
//!
//! The ledger is the sole authority on whether a new sandbox may be
//! provisioned and the sole holder of historical metrics. It is pure
//! bookkeeping: every time-dependent method takes `now` explicitly, so the
//! pool injects its clock and tests drive the hourly window by hand. The
//! pool mutates it only under its exclusive lock.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PoolConfig;

/// Process-wide usage accounting, restored from a persisted snapshot at
/// startup and flushed after every state-changing event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageLedger {
    /// Sandboxes ever successfully provisioned.
    pub total_created: u64,
    /// Provisioning and execution failures.
    pub total_failed: u64,
    /// Units of work completed successfully.
    pub total_executions: u64,
    /// Creation or execution timeouts.
    pub total_timeouts: u64,
    /// Creations counted in the current rolling hourly window.
    pub hourly_count: u64,
    /// Start of the current hourly window.
    pub hourly_window_start: DateTime<Utc>,
    /// Sandboxes currently provisioned and not yet released.
    pub active: u64,
    /// High-water mark of `active`.
    pub peak_concurrent: u64,
    /// Accumulated execution wall time in seconds.
    pub total_execution_time: f64,
    /// `total_execution_time / total_executions`, 0 when no executions.
    pub avg_execution_time: f64,
}

impl Default for UsageLedger {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl UsageLedger {
    /// Fresh zero-valued ledger with the hourly window anchored at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            total_created: 0,
            total_failed: 0,
            total_executions: 0,
            total_timeouts: 0,
            hourly_count: 0,
            hourly_window_start: now,
            active: 0,
            peak_concurrent: 0,
            total_execution_time: 0.0,
            avg_execution_time: 0.0,
        }
    }

    /// Check whether a new sandbox may be provisioned under `limits`.
    ///
    /// Rolls the hourly window first, then checks the concurrency ceiling
    /// and the hourly ceiling in that order. Returns `(true, "OK")` when
    /// admission is granted, otherwise `(false, reason)` with a
    /// human-readable reason.
    pub fn can_create(&mut self, limits: &PoolConfig, now: DateTime<Utc>) -> (bool, String) {
        self.roll_window(now);

        if self.active >= limits.max_concurrent as u64 {
            return (
                false,
                format!(
                    "Max concurrent sandboxes reached ({}). Currently active: {}",
                    limits.max_concurrent, self.active
                ),
            );
        }

        if self.hourly_count >= limits.max_per_hour {
            let until_reset = self.hourly_window_start + Duration::hours(1) - now;
            let minutes_left = until_reset.num_minutes().max(0);
            return (
                false,
                format!(
                    "Hourly limit reached ({}/hour). Reset in {} minutes. Current: {}",
                    limits.max_per_hour, minutes_left, self.hourly_count
                ),
            );
        }

        (true, "OK".to_string())
    }

    /// Record a successful sandbox creation.
    pub fn record_creation(&mut self, now: DateTime<Utc>) {
        self.total_created += 1;
        self.active += 1;
        if self.active > self.peak_concurrent {
            self.peak_concurrent = self.active;
        }
        self.roll_window(now);
        self.hourly_count += 1;
        tracing::info!(
            active = self.active,
            hourly = self.hourly_count,
            "sandbox created"
        );
    }

    /// Record a sandbox closure. Floored at zero so a double release can
    /// never drive `active` negative.
    pub fn record_closure(&mut self) {
        self.active = self.active.saturating_sub(1);
        tracing::info!(active = self.active, "sandbox closed");
    }

    /// Record a provisioning or execution failure. Does not touch
    /// `active`: failures happen before a sandbox counts as active.
    pub fn record_failure(&mut self) {
        self.total_failed += 1;
        tracing::warn!(total_failed = self.total_failed, "sandbox failure recorded");
    }

    /// Record a timeout event.
    pub fn record_timeout(&mut self) {
        self.total_timeouts += 1;
        tracing::warn!(total_timeouts = self.total_timeouts, "timeout recorded");
    }

    /// Record a completed unit of work and fold its wall time into the
    /// running average.
    pub fn record_execution(&mut self, elapsed_secs: f64) {
        self.total_executions += 1;
        self.total_execution_time += elapsed_secs;
        self.avg_execution_time = if self.total_executions > 0 {
            self.total_execution_time / self.total_executions as f64
        } else {
            0.0
        };
        tracing::debug!(
            elapsed_secs,
            avg = self.avg_execution_time,
            "execution recorded"
        );
    }

    /// Failures as a fraction of creations, with a floor of one creation
    /// so a fresh ledger reports 0 rather than dividing by zero.
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        self.total_failed as f64 / self.total_created.max(1) as f64
    }

    /// Lazy hourly rollover: reset the window once more than an hour has
    /// elapsed since it started. Called on every admission check and every
    /// creation; there is deliberately no background timer.
    fn roll_window(&mut self, now: DateTime<Utc>) {
        if now - self.hourly_window_start > Duration::hours(1) {
            tracing::info!(
                previous_count = self.hourly_count,
                window_start = %self.hourly_window_start,
                "hourly window reset"
            );
            self.hourly_count = 0;
            self.hourly_window_start = now;
        }
    }

    /// Write the snapshot to `path`. Persistence is best-effort: a write
    /// failure must never take down an acquisition, so errors are logged
    /// at debug and swallowed.
    pub fn persist(&self, path: &Path) {
        let write = || -> std::io::Result<()> {
            if let Some(dir) = path.parent() {
                if !dir.as_os_str().is_empty() {
                    std::fs::create_dir_all(dir)?;
                }
            }
            let json = serde_json::to_string_pretty(self)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            std::fs::write(path, json)
        };
        if let Err(error) = write() {
            tracing::debug!(path = %path.display(), %error, "could not persist usage ledger");
        }
    }

    /// Restore a snapshot from `path`, or start fresh.
    ///
    /// A missing or corrupt snapshot is not an error: the pool comes up
    /// with a zeroed ledger anchored at `now`.
    #[must_use]
    pub fn load_or_default(path: Option<&Path>, now: DateTime<Utc>) -> Self {
        let Some(path) = path else {
            return Self::new(now);
        };
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(ledger) => {
                    tracing::info!(path = %path.display(), "usage ledger restored");
                    ledger
                }
                Err(error) => {
                    tracing::debug!(path = %path.display(), %error, "corrupt ledger snapshot, starting fresh");
                    Self::new(now)
                }
            },
            Err(error) => {
                tracing::debug!(path = %path.display(), %error, "no ledger snapshot, starting fresh");
                Self::new(now)
            }
        }
    }
}
