//! Single-flight gate for generation operations.
//!
//! The remote service tolerates only one generation-related call at a
//! time per client process, so every guarded operation runs under a
//! single-permit semaphore. The permit is an RAII guard: it is released
//! when dropped, which covers every exit path including errors and
//! deadline timeouts.

use std::future::Future;
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use jimeng_common::GatePolicy;

use crate::error::ClientError;

/// Serializes generation operations within one process.
///
/// At most one guarded body executes at any instant. What happens to a
/// second caller is decided by the configured [`GatePolicy`]: `Reject`
/// fails it immediately with [`ClientError::Busy`], `Queue` parks it and
/// runs it after the in-flight operation completes, in FIFO order.
///
/// # Examples
///
/// ```
/// use jimeng_client::gate::ConcurrencyGate;
/// use jimeng_common::GatePolicy;
///
/// # async fn example() -> anyhow::Result<()> {
/// let gate = ConcurrencyGate::new(GatePolicy::Queue);
/// let value = gate.run(async { Ok::<_, anyhow::Error>(42) }).await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    permits: Arc<Semaphore>,
    policy: GatePolicy,
}

impl ConcurrencyGate {
    /// Creates a gate with a single permit and the given policy.
    #[must_use]
    pub fn new(policy: GatePolicy) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
            policy,
        }
    }

    /// The policy this gate applies to contending callers.
    #[must_use]
    pub const fn policy(&self) -> GatePolicy {
        self.policy
    }

    /// Whether an operation currently holds the gate.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.permits.available_permits() == 0
    }

    /// Acquires the gate according to the configured policy.
    ///
    /// The returned permit releases the gate when dropped. Prefer
    /// [`Self::run`] unless the guarded section cannot be expressed as a
    /// single future.
    ///
    /// # Errors
    ///
    /// Under the reject policy, returns [`ClientError::Busy`] when an
    /// operation is already in flight.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, ClientError> {
        match self.policy {
            GatePolicy::Reject => self.permits.clone().try_acquire_owned().map_err(|_| {
                warn!("rejecting generation request: another operation is in flight");
                ClientError::Busy
            }),
            GatePolicy::Queue => {
                if self.is_busy() {
                    debug!("generation request queued behind in-flight operation");
                }
                // The semaphore is never closed, so acquire_owned cannot
                // fail; tokio hands out permits in FIFO order.
                self.permits
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| ClientError::Busy)
            }
        }
    }

    /// Runs `operation` while holding the gate.
    ///
    /// The permit is dropped after the operation returns or fails, so the
    /// gate is free again on every exit path.
    ///
    /// # Errors
    ///
    /// Propagates [`ClientError::Busy`] under the reject policy, and any
    /// error the operation itself returns.
    pub async fn run<T>(
        &self,
        operation: impl Future<Output = anyhow::Result<T>> + Send,
    ) -> anyhow::Result<T> {
        let _permit = self.acquire().await?;
        operation.await
    }
}
