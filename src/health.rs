//! Health and metrics reporting.
//!
//! Both reports are pure functions of ledger state, recomputed on every
//! call and safe to serialize straight onto whatever transport the
//! embedding service uses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PoolConfig;
use crate::ledger::UsageLedger;

/// Coarse pool health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Admission open, failure rate acceptable.
    Healthy,
    /// Admission open, but more than 10% of creations have failed.
    Warning,
    /// Admission currently rejected by a quota ceiling.
    Degraded,
}

/// Health snapshot for monitoring endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolHealth {
    /// Derived status
    pub status: HealthState,
    /// Whether an acquisition would currently be admitted
    pub can_create_sandbox: bool,
    /// "OK", or the rejection reason
    pub reason: String,
    /// Sandboxes currently active
    pub active_sandboxes: u64,
    /// Hourly usage as "used/limit"
    pub hourly_usage: String,
    /// Failures as a percentage of creations
    pub failure_rate: f64,
    /// Average execution wall time in seconds
    pub avg_execution_time: f64,
}

impl PoolHealth {
    /// Derive the health report from current ledger state.
    ///
    /// Takes the ledger mutably because the admission check performs the
    /// lazy hourly-window rollover.
    pub fn derive(ledger: &mut UsageLedger, config: &PoolConfig, now: DateTime<Utc>) -> Self {
        let (can_create, reason) = ledger.can_create(config, now);

        let status = if !can_create {
            HealthState::Degraded
        } else if ledger.total_failed as f64 > 0.1 * ledger.total_created as f64 {
            HealthState::Warning
        } else {
            HealthState::Healthy
        };

        Self {
            status,
            can_create_sandbox: can_create,
            reason,
            active_sandboxes: ledger.active,
            hourly_usage: format!("{}/{}", ledger.hourly_count, config.max_per_hour),
            failure_rate: ledger.failure_rate() * 100.0,
            avg_execution_time: ledger.avg_execution_time,
        }
    }
}

/// Ledger snapshot merged with the pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    /// All ledger counters
    #[serde(flatten)]
    pub usage: UsageLedger,
    /// The active pool configuration
    pub config: PoolConfig,
}
