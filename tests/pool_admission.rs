//! Admission control end-to-end tests: hourly quota, concurrency ceiling,
//! and the fast-fail rejection path.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use sandbox_pool::{
    Clock, Error, ExecutionReport, ManualClock, PoolConfig, Provisioner, Result, SandboxPool,
};

// ---------------------------------------------------------------------------
// Test provisioner
// ---------------------------------------------------------------------------

struct InstantProvisioner {
    counter: AtomicU64,
}

impl InstantProvisioner {
    fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl Provisioner for InstantProvisioner {
    type Sandbox = u64;

    async fn provision(&self) -> Result<u64> {
        Ok(self.counter.fetch_add(1, Ordering::SeqCst))
    }

    async fn run_code(&self, sandbox: &u64, _code: &str) -> Result<ExecutionReport> {
        Ok(ExecutionReport::ok(format!("sandbox {sandbox}")))
    }

    async fn teardown(&self, _sandbox: u64) -> Result<()> {
        Ok(())
    }
}

fn config(max_concurrent: usize, max_per_hour: u64) -> PoolConfig {
    PoolConfig {
        max_concurrent,
        max_per_hour,
        ..Default::default()
    }
}

async fn settle() {
    // Let detached guard finalizers run
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// ---------------------------------------------------------------------------
// Hourly quota scenario
// ---------------------------------------------------------------------------

#[tokio::test]
async fn hourly_limit_rejects_then_resets_after_an_hour() {
    let clock = Arc::new(ManualClock::starting_now());
    let pool = SandboxPool::with_clock(
        InstantProvisioner::new(),
        config(2, 3),
        clock.clone() as Arc<dyn Clock>,
    )
    .unwrap();

    // Three sequential acquisitions exhaust the hourly budget
    for expected in 1..=3u64 {
        {
            let _guard = pool.acquire().await.unwrap();
            assert_eq!(pool.metrics().usage.hourly_count, expected);
        }
        settle().await;
    }

    // Fourth within the same hour is rejected, not blocked
    let err = pool.acquire().await.unwrap_err();
    match &err {
        Error::AdmissionRejected {
            reason,
            hourly_count,
            ..
        } => {
            assert!(reason.contains("Hourly limit reached"), "reason: {reason}");
            assert_eq!(*hourly_count, 3);
        }
        other => panic!("expected AdmissionRejected, got {other:?}"),
    }
    assert!(err.is_retryable());

    // After 61 simulated minutes the window rolls over
    clock.advance(ChronoDuration::minutes(61));
    {
        let _guard = pool.acquire().await.expect("window should have reset");
        assert_eq!(pool.metrics().usage.hourly_count, 1);
    }
    settle().await;
}

#[tokio::test]
async fn rejection_reason_reports_minutes_until_reset() {
    let clock = Arc::new(ManualClock::starting_now());
    let pool = SandboxPool::with_clock(
        InstantProvisioner::new(),
        config(1, 1),
        clock.clone() as Arc<dyn Clock>,
    )
    .unwrap();

    {
        let _guard = pool.acquire().await.unwrap();
    }
    settle().await;

    clock.advance(ChronoDuration::minutes(20));
    let err = pool.acquire().await.unwrap_err();
    let reason = err.to_string();
    assert!(reason.contains("Reset in 40 minutes"), "reason: {reason}");
}

// ---------------------------------------------------------------------------
// Concurrency ceiling: fast fail, no semaphore wait
// ---------------------------------------------------------------------------

#[tokio::test]
async fn saturated_pool_rejects_immediately_without_blocking() {
    let pool = SandboxPool::new(InstantProvisioner::new(), config(2, 20)).unwrap();

    let _g1 = pool.acquire().await.unwrap();
    let _g2 = pool.acquire().await.unwrap();

    let started = Instant::now();
    let err = pool.acquire().await.unwrap_err();
    let latency = started.elapsed();

    assert!(
        matches!(err, Error::AdmissionRejected { active: 2, .. }),
        "expected AdmissionRejected, got {err:?}"
    );
    assert!(
        err.to_string().contains("Max concurrent sandboxes reached"),
        "message: {err}"
    );
    // The ledger pre-check must return without waiting on the semaphore
    assert!(
        latency < Duration::from_millis(100),
        "rejection took {latency:?}"
    );
}

#[tokio::test]
async fn pool_recovers_after_release() {
    let pool = SandboxPool::new(InstantProvisioner::new(), config(1, 20)).unwrap();

    {
        let _guard = pool.acquire().await.unwrap();
        assert!(pool.acquire().await.is_err());
    }
    settle().await;

    pool.acquire()
        .await
        .expect("slot should be free after release");
}

// ---------------------------------------------------------------------------
// Health reporting under quota pressure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_degrades_while_saturated_and_recovers() {
    let pool = SandboxPool::new(InstantProvisioner::new(), config(1, 20)).unwrap();
    assert_eq!(pool.health().status, sandbox_pool::HealthState::Healthy);

    {
        let _guard = pool.acquire().await.unwrap();
        let health = pool.health();
        assert_eq!(health.status, sandbox_pool::HealthState::Degraded);
        assert!(!health.can_create_sandbox);
        assert_eq!(health.active_sandboxes, 1);
        assert_eq!(health.hourly_usage, "1/20");
    }
    settle().await;

    assert_eq!(pool.health().status, sandbox_pool::HealthState::Healthy);
}
