//! Pool configuration types

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for the sandbox pool.
///
/// Every sandbox is a billed remote resource, so both limits exist for cost
/// protection: `max_concurrent` caps simultaneous instances, `max_per_hour`
/// caps the provisioning rate over a rolling hour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of simultaneously active sandboxes.
    pub max_concurrent: usize,
    /// Maximum sandboxes created per rolling hour.
    pub max_per_hour: u64,
    /// Maximum wait for the remote provisioning call.
    #[serde(with = "humantime_serde")]
    pub creation_timeout: Duration,
    /// Maximum wait for a single unit of work inside a sandbox.
    #[serde(with = "humantime_serde")]
    pub execution_timeout: Duration,
    /// Overall ceiling covering provisioning plus work.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Where the usage ledger snapshot is persisted. `None` disables
    /// persistence; counters then start from zero on every restart.
    pub ledger_path: Option<PathBuf>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            max_per_hour: 20,
            creation_timeout: Duration::from_secs(120),
            execution_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(180),
            ledger_path: None,
        }
    }
}

impl PoolConfig {
    /// Validate the configuration.
    ///
    /// The pool refuses to construct with an invalid combination; there is
    /// no degraded "run anyway" mode.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(Error::configuration("max_concurrent must be >= 1"));
        }
        if self.max_per_hour < self.max_concurrent as u64 {
            return Err(Error::configuration(
                "max_per_hour must be >= max_concurrent",
            ));
        }
        if self.creation_timeout.is_zero() {
            return Err(Error::configuration("creation_timeout must be non-zero"));
        }
        if self.creation_timeout > self.request_timeout {
            return Err(Error::configuration(
                "creation_timeout must be <= request_timeout",
            ));
        }
        if self.execution_timeout > self.request_timeout {
            return Err(Error::configuration(
                "execution_timeout must be <= request_timeout",
            ));
        }
        Ok(())
    }
}
