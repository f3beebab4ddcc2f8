//! Provisioning seam for remote sandbox backends.

use async_trait::async_trait;

use crate::error::Result;
use crate::outcome::ExecutionReport;

/// A backend that can provision, drive, and tear down remote sandboxes.
///
/// The pool owns the lifecycle; implementations own the transport. Errors
/// returned from [`provision`](Provisioner::provision) are wrapped by the
/// pool and counted as failures; errors from
/// [`teardown`](Provisioner::teardown) are logged and suppressed.
#[async_trait]
pub trait Provisioner: Send + Sync + 'static {
    /// Handle to one provisioned sandbox.
    type Sandbox: Send + Sync + 'static;

    /// Provision a fresh sandbox. The pool bounds this call with its
    /// creation timeout.
    async fn provision(&self) -> Result<Self::Sandbox>;

    /// Run a code snippet inside the sandbox. The pool does not inspect
    /// `code`; it only bounds the call with its execution timeout.
    async fn run_code(&self, sandbox: &Self::Sandbox, code: &str) -> Result<ExecutionReport>;

    /// Tear the sandbox down, releasing the remote (billed) environment.
    async fn teardown(&self, sandbox: Self::Sandbox) -> Result<()>;
}

/// Shared backends delegate through the `Arc`, so callers can keep a
/// handle to the provisioner after handing one to the pool.
#[async_trait]
impl<P: Provisioner> Provisioner for std::sync::Arc<P> {
    type Sandbox = P::Sandbox;

    async fn provision(&self) -> Result<Self::Sandbox> {
        (**self).provision().await
    }

    async fn run_code(&self, sandbox: &Self::Sandbox, code: &str) -> Result<ExecutionReport> {
        (**self).run_code(sandbox, code).await
    }

    async fn teardown(&self, sandbox: Self::Sandbox) -> Result<()> {
        (**self).teardown(sandbox).await
    }
}
