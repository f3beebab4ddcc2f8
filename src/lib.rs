//! # sandbox-pool
//!
//! Bounded, rate-limited pool mediating access to expensive, externally
//! billed remote code-execution sandboxes.
//!
//! The crate has two layers:
//! - [`UsageLedger`] — pure accounting: creation/closure/failure/timeout
//!   counters, the concurrency and rolling-hourly quota policies, and a
//!   persisted snapshot that survives process restarts.
//! - [`SandboxPool`] — the admission decision, a counting semaphore sized
//!   to the concurrency ceiling, and a scoped acquisition protocol that
//!   guarantees a provisioned sandbox is torn down exactly once no matter
//!   how the caller's work terminates.
//!
//! What runs *inside* an acquired sandbox is the caller's business; the
//! pool never interprets it. Backends plug in through the [`Provisioner`]
//! trait.
//!
//! ```rust,ignore
//! let pool = SandboxPool::new(E2bProvisioner::from_env()?, PoolConfig::default())?;
//! let report = pool.run_code("print('hello')").await?;
//! ```

pub mod advisory;
pub mod clock;
pub mod config;
pub mod error;
pub mod guard;
pub mod health;
pub mod ledger;
pub mod outcome;
pub mod pool;
pub mod provision;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::PoolConfig;
pub use error::{Error, Result};
pub use guard::SandboxGuard;
pub use health::{HealthState, MetricsReport, PoolHealth};
pub use ledger::UsageLedger;
pub use outcome::{ChartElement, ExecutionArtifact, ExecutionError, ExecutionReport};
pub use pool::SandboxPool;
pub use provision::Provisioner;
