//! Sandbox pool: admission control, concurrency bounding, and the scoped
//! acquisition protocol.
//!
//! One pool instance serves concurrent callers. Admission (the ledger
//! pre-check) and concurrency (the semaphore) are independent gates: the
//! ledger rejects fast when a quota ceiling is already hit, the semaphore
//! bounds how many provisioning calls and active sandboxes exist at once.

use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use uuid::Uuid;

use crate::advisory;
use crate::clock::{Clock, SystemClock};
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::guard::SandboxGuard;
use crate::health::{MetricsReport, PoolHealth};
use crate::ledger::UsageLedger;
use crate::outcome::ExecutionReport;
use crate::provision::Provisioner;

/// Shared state behind the pool handle.
pub(crate) struct PoolInner<P: Provisioner> {
    pub(crate) provisioner: P,
    pub(crate) config: PoolConfig,
    pub(crate) ledger: Mutex<UsageLedger>,
    pub(crate) semaphore: Arc<Semaphore>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl<P: Provisioner> PoolInner<P> {
    /// Flush the ledger snapshot if persistence is configured.
    pub(crate) fn persist(&self, ledger: &UsageLedger) {
        if let Some(path) = &self.config.ledger_path {
            ledger.persist(path);
        }
    }
}

/// Bounded, rate-limited pool of remote sandboxes.
///
/// Cheap to clone; clones share the same ledger, semaphore, and config.
/// There is no global instance: the composition root constructs one pool
/// and passes it to whoever needs it.
pub struct SandboxPool<P: Provisioner> {
    inner: Arc<PoolInner<P>>,
}

impl<P: Provisioner> Clone for SandboxPool<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Provisioner> std::fmt::Debug for SandboxPool<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ledger = self.inner.ledger.lock().clone();
        f.debug_struct("SandboxPool")
            .field("config", &self.inner.config)
            .field("ledger", &ledger)
            .finish()
    }
}

impl<P: Provisioner> SandboxPool<P> {
    /// Create a pool over `provisioner` with a validated `config`.
    ///
    /// Fails with [`Error::Configuration`] on an invalid limit
    /// combination; the ledger snapshot (if configured) is restored here.
    pub fn new(provisioner: P, config: PoolConfig) -> Result<Self> {
        Self::with_clock(provisioner, config, Arc::new(SystemClock))
    }

    /// Like [`new`](Self::new) with an injected clock, for tests that
    /// drive the hourly window by hand.
    pub fn with_clock(provisioner: P, config: PoolConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let ledger = UsageLedger::load_or_default(config.ledger_path.as_deref(), clock.now());
        tracing::info!(
            max_concurrent = config.max_concurrent,
            max_per_hour = config.max_per_hour,
            "sandbox pool initialized"
        );
        Ok(Self {
            inner: Arc::new(PoolInner {
                semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
                provisioner,
                config,
                ledger: Mutex::new(ledger),
                clock,
            }),
        })
    }

    /// Acquire a sandbox for the scope of the returned guard.
    ///
    /// Quota rejection is a fast-fail: it returns before ever touching the
    /// semaphore. Once admitted, the call waits for a concurrency slot
    /// (indefinitely, FIFO-ish), then provisions under the creation
    /// timeout. Every failure before success releases the slot and is
    /// recorded in the ledger; after success, release is the guard's job.
    pub async fn acquire(&self) -> Result<SandboxGuard<P>> {
        let inner = &self.inner;

        {
            let mut ledger = inner.ledger.lock();
            let (admitted, reason) = ledger.can_create(&inner.config, inner.clock.now());
            if !admitted {
                tracing::warn!(%reason, "sandbox creation blocked");
                return Err(Error::AdmissionRejected {
                    active: ledger.active,
                    hourly_count: ledger.hourly_count,
                    reason,
                });
            }
        }

        let permit = Arc::clone(&inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| Error::internal("pool semaphore closed"))?;

        let started = Instant::now();
        let sandbox = match timeout(inner.config.creation_timeout, inner.provisioner.provision())
            .await
        {
            Ok(Ok(sandbox)) => sandbox,
            Ok(Err(error)) => {
                tracing::error!(%error, "sandbox creation failed");
                {
                    let mut ledger = inner.ledger.lock();
                    ledger.record_failure();
                    inner.persist(&ledger);
                }
                drop(permit);
                return Err(Error::creation_failed(error.to_string(), error));
            }
            Err(_) => {
                tracing::error!(
                    timeout = ?inner.config.creation_timeout,
                    "sandbox creation timed out"
                );
                {
                    let mut ledger = inner.ledger.lock();
                    ledger.record_timeout();
                    ledger.record_failure();
                    inner.persist(&ledger);
                }
                drop(permit);
                return Err(Error::CreationTimeout {
                    timeout: inner.config.creation_timeout,
                });
            }
        };

        let id = Uuid::new_v4();
        {
            let mut ledger = inner.ledger.lock();
            ledger.record_creation(inner.clock.now());
            inner.persist(&ledger);
        }
        tracing::info!(sandbox = %id, elapsed = ?started.elapsed(), "sandbox provisioned");

        Ok(SandboxGuard::new(sandbox, permit, Arc::clone(inner), id))
    }

    /// Acquire a sandbox and run `work` against it.
    ///
    /// The work future is bounded by the execution timeout; provisioning
    /// plus work together by the request timeout. Successful work is
    /// recorded with its wall time, a work error as a failure, either
    /// timeout as a timeout. The sandbox is torn down on every path.
    pub async fn execute<T, F>(&self, work: F) -> Result<T>
    where
        T: Send,
        F: for<'a> FnOnce(&'a P::Sandbox) -> BoxFuture<'a, Result<T>> + Send,
    {
        let inner = &self.inner;
        let started = Instant::now();

        let attempt = async {
            let guard = self.acquire().await?;
            let outcome = timeout(inner.config.execution_timeout, work(guard.sandbox())).await;
            match outcome {
                Ok(Ok(value)) => {
                    let mut ledger = inner.ledger.lock();
                    ledger.record_execution(started.elapsed().as_secs_f64());
                    inner.persist(&ledger);
                    Ok(value)
                }
                Ok(Err(error)) => {
                    tracing::error!(%error, "sandbox work failed");
                    let mut ledger = inner.ledger.lock();
                    ledger.record_failure();
                    inner.persist(&ledger);
                    Err(error)
                }
                Err(_) => {
                    tracing::error!(
                        timeout = ?inner.config.execution_timeout,
                        "sandbox work timed out"
                    );
                    let mut ledger = inner.ledger.lock();
                    ledger.record_timeout();
                    inner.persist(&ledger);
                    Err(Error::ExecutionTimeout {
                        timeout: inner.config.execution_timeout,
                    })
                }
            }
            // guard drops here: teardown + closure record on every path
        };

        match timeout(inner.config.request_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    timeout = ?inner.config.request_timeout,
                    "request deadline exceeded"
                );
                let mut ledger = inner.ledger.lock();
                ledger.record_timeout();
                inner.persist(&ledger);
                Err(Error::ExecutionTimeout {
                    timeout: inner.config.request_timeout,
                })
            }
        }
    }

    /// Run a code snippet through the pool's provisioner.
    ///
    /// The code is advisory-scanned (logged, never blocked) and otherwise
    /// passed through uninterpreted.
    pub async fn run_code(&self, code: &str) -> Result<ExecutionReport> {
        let _flagged = advisory::scan(code);
        let inner = Arc::clone(&self.inner);
        let code: Arc<str> = Arc::from(code);
        self.execute(move |sandbox| {
            Box::pin(async move { inner.provisioner.run_code(sandbox, &code).await })
        })
        .await
    }

    /// Snapshot of all ledger counters merged with the configuration.
    ///
    /// Reads are serialized against mutations by the ledger lock, so the
    /// snapshot is never torn (it may be momentarily stale).
    #[must_use]
    pub fn metrics(&self) -> MetricsReport {
        let usage = self.inner.ledger.lock().clone();
        MetricsReport {
            usage,
            config: self.inner.config.clone(),
        }
    }

    /// Current health, recomputed from ledger state on every call.
    #[must_use]
    pub fn health(&self) -> PoolHealth {
        let mut ledger = self.inner.ledger.lock();
        PoolHealth::derive(&mut ledger, &self.inner.config, self.inner.clock.now())
    }

    /// The validated configuration this pool runs with.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }
}
