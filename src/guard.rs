//! Scoped sandbox acquisition with teardown-on-drop.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::OwnedSemaphorePermit;
use uuid::Uuid;

use crate::pool::PoolInner;
use crate::provision::Provisioner;

/// RAII handle to one provisioned sandbox.
///
/// Dropping the guard runs the finalization step exactly once, on every
/// exit path: best-effort teardown of the remote sandbox (errors logged,
/// never propagated), then the ledger closure record and snapshot flush,
/// then release of the concurrency slot. The sandbox is owned by the
/// guard's scope; it cannot be retained past it.
///
/// Must be dropped inside a tokio runtime (teardown is spawned as a task).
pub struct SandboxGuard<P: Provisioner> {
    sandbox: Option<P::Sandbox>,
    permit: Option<OwnedSemaphorePermit>,
    pool: Arc<PoolInner<P>>,
    id: Uuid,
    acquired_at: Instant,
}

impl<P: Provisioner> SandboxGuard<P> {
    pub(crate) fn new(
        sandbox: P::Sandbox,
        permit: OwnedSemaphorePermit,
        pool: Arc<PoolInner<P>>,
        id: Uuid,
    ) -> Self {
        Self {
            sandbox: Some(sandbox),
            permit: Some(permit),
            pool,
            id,
            acquired_at: Instant::now(),
        }
    }

    /// Identifier of this acquisition, for log correlation.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The provisioned sandbox handle.
    #[must_use]
    pub fn sandbox(&self) -> &P::Sandbox {
        self.sandbox.as_ref().expect("sandbox taken before drop")
    }
}

impl<P: Provisioner> std::ops::Deref for SandboxGuard<P> {
    type Target = P::Sandbox;

    fn deref(&self) -> &P::Sandbox {
        self.sandbox()
    }
}

impl<P: Provisioner> Drop for SandboxGuard<P> {
    fn drop(&mut self) {
        let (Some(sandbox), Some(permit)) = (self.sandbox.take(), self.permit.take()) else {
            return;
        };
        let pool = Arc::clone(&self.pool);
        let id = self.id;
        let held_for = self.acquired_at.elapsed();

        // Teardown is async; run it detached so the guard can be dropped
        // from any exit path, including unwinding and cancelled futures.
        tokio::spawn(async move {
            if let Err(error) = pool.provisioner.teardown(sandbox).await {
                tracing::error!(sandbox = %id, %error, "sandbox teardown failed");
            }
            {
                let mut ledger = pool.ledger.lock();
                ledger.record_closure();
                pool.persist(&ledger);
            }
            // The permit is released only after the closure is recorded,
            // so a waiter admitted on this slot observes consistent counts.
            drop(permit);
            tracing::debug!(sandbox = %id, ?held_for, "sandbox released");
        });
    }
}

impl<P: Provisioner> std::fmt::Debug for SandboxGuard<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxGuard")
            .field("id", &self.id)
            .field("acquired_at", &self.acquired_at)
            .finish()
    }
}
