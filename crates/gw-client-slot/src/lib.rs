//! Process-wide slots for lazily constructed external client handles.
//!
//! A [`ClientSlot`] guards one expensive, asynchronous client construction
//! (opening a connection, waiting for a readiness signal) so that it runs at
//! most once per process, no matter how many callers race to trigger it.
//! Once a handle is stored it stays valid for the rest of the process; there
//! is no teardown path. Failed construction returns the slot to
//! `Uninitialized` so a later call can retry.
//!
//! The slot itself never logs and never retries; both are caller policy.

use std::future::Future;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Observable lifecycle of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Uninitialized,
    Initializing,
    Ready,
}

impl ReadyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadyState::Uninitialized => "uninitialized",
            ReadyState::Initializing => "initializing",
            ReadyState::Ready => "ready",
        }
    }
}

impl std::fmt::Display for ReadyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum SlotError {
    /// Construction or the readiness wait of the external client failed.
    #[error("`{slot}` client initialization failed: {source}")]
    Init {
        slot: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// An operation that needs the handle ran before the slot became ready.
    #[error("`{slot}` client is not initialized")]
    NotInitialized { slot: &'static str },
}

impl SlotError {
    pub fn slot(&self) -> &'static str {
        match self {
            SlotError::Init { slot, .. } | SlotError::NotInitialized { slot } => slot,
        }
    }
}

const UNINITIALIZED: u8 = 0;
const INITIALIZING: u8 = 1;
const READY: u8 = 2;

/// One lazily initialized handle to an external service client.
///
/// `T` is usually a trait object (`ClientSlot<dyn WalletSession>`); the slot
/// stores the handle as `Arc<T>` and hands out clones.
pub struct ClientSlot<T: ?Sized> {
    name: &'static str,
    state: AtomicU8,
    init_lock: Mutex<()>,
    cell: OnceLock<Arc<T>>,
}

impl<T: ?Sized> ClientSlot<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: AtomicU8::new(UNINITIALIZED),
            init_lock: Mutex::new(()),
            cell: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Lock-free readiness check with no side effects.
    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }

    pub fn state(&self) -> ReadyState {
        match self.state.load(Ordering::Acquire) {
            INITIALIZING => ReadyState::Initializing,
            READY => ReadyState::Ready,
            _ => ReadyState::Uninitialized,
        }
    }

    /// Return the stored handle, or `NotInitialized` if the slot is not ready.
    pub fn get(&self) -> Result<Arc<T>, SlotError> {
        self.cell
            .get()
            .cloned()
            .ok_or(SlotError::NotInitialized { slot: self.name })
    }

    /// Idempotent initialization: run `init` unless a handle is already
    /// stored, and store its result.
    ///
    /// Callers racing before the first completion queue on an internal mutex;
    /// the loser re-checks after acquisition, so `init` runs exactly once per
    /// successful initialization. On failure the slot reverts to
    /// `Uninitialized` and the next call may try again. The same reset applies
    /// when the winning caller's future is dropped mid-initialization, so the
    /// slot cannot stick in `Initializing`.
    pub async fn get_or_init<F, Fut>(&self, init: F) -> Result<Arc<T>, SlotError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Arc<T>>>,
    {
        if let Some(handle) = self.cell.get() {
            return Ok(handle.clone());
        }

        let _running = self.init_lock.lock().await;

        // A racing caller may have finished while we waited for the lock.
        if let Some(handle) = self.cell.get() {
            return Ok(handle.clone());
        }

        self.state.store(INITIALIZING, Ordering::Release);
        let rollback = InitRollback {
            state: &self.state,
            armed: true,
        };

        match init().await {
            Ok(handle) => {
                // The lock is held and the cell was checked above, so this
                // set is the only one.
                let _ = self.cell.set(handle.clone());
                rollback.disarm();
                self.state.store(READY, Ordering::Release);
                Ok(handle)
            }
            Err(source) => Err(SlotError::Init {
                slot: self.name,
                source,
            }),
        }
    }

    /// `get_or_init` with the handle discarded; completion means the slot is
    /// ready.
    pub async fn ensure_initialized<F, Fut>(&self, init: F) -> Result<(), SlotError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Arc<T>>>,
    {
        self.get_or_init(init).await.map(|_| ())
    }
}

impl<T: ?Sized> std::fmt::Debug for ClientSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSlot")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Restores `Uninitialized` unless disarmed, covering both the error path and
/// a caller future dropped between `Initializing` and completion.
struct InitRollback<'a> {
    state: &'a AtomicU8,
    armed: bool,
}

impl InitRollback<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InitRollback<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.store(UNINITIALIZED, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    async fn connect_counted(count: &AtomicUsize) -> anyhow::Result<Arc<String>> {
        count.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new("handle".to_owned()))
    }

    #[tokio::test]
    async fn second_ensure_skips_constructor() -> anyhow::Result<()> {
        let slot: ClientSlot<String> = ClientSlot::new("wallet");
        let count = AtomicUsize::new(0);

        let first = slot.get_or_init(|| connect_counted(&count)).await?;
        let second = slot.get_or_init(|| connect_counted(&count)).await?;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        Ok(())
    }

    #[tokio::test]
    async fn ready_flips_once_after_success() -> anyhow::Result<()> {
        let slot: ClientSlot<String> = ClientSlot::new("wallet");
        assert!(!slot.is_ready());
        assert_eq!(slot.state(), ReadyState::Uninitialized);

        let count = AtomicUsize::new(0);
        slot.ensure_initialized(|| connect_counted(&count)).await?;

        assert!(slot.is_ready());
        assert_eq!(slot.state(), ReadyState::Ready);
        Ok(())
    }

    #[tokio::test]
    async fn get_before_init_is_not_initialized() {
        let slot: ClientSlot<String> = ClientSlot::new("storage");

        let err = slot.get().unwrap_err();
        assert!(matches!(err, SlotError::NotInitialized { slot: "storage" }));
        assert_eq!(err.slot(), "storage");
        // The failed read must not disturb the slot.
        assert_eq!(slot.state(), ReadyState::Uninitialized);
    }

    #[tokio::test]
    async fn failed_init_resets_state_and_allows_retry() -> anyhow::Result<()> {
        let slot: ClientSlot<String> = ClientSlot::new("wallet");
        let count = AtomicUsize::new(0);

        let err = slot
            .get_or_init(|| async {
                count.fetch_add(1, Ordering::SeqCst);
                bail!("gateway unreachable")
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SlotError::Init { slot: "wallet", .. }));
        assert_eq!(err.slot(), "wallet");
        assert!(err.to_string().contains("wallet"));
        assert!(!slot.is_ready());
        assert_eq!(slot.state(), ReadyState::Uninitialized);

        // No lockout: the next attempt runs the constructor again.
        slot.get_or_init(|| connect_counted(&count)).await?;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(slot.is_ready());
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_ensure_constructs_once() -> anyhow::Result<()> {
        let slot: ClientSlot<String> = ClientSlot::new("wallet");
        let count = AtomicUsize::new(0);

        let slow_connect = || async {
            count.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_millis(20)).await;
            Ok(Arc::new("handle".to_owned()))
        };

        let (first, second) = tokio::join!(
            slot.get_or_init(slow_connect),
            slot.get_or_init(slow_connect),
        );

        let first = first?;
        let second = second?;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(slot.is_ready());
        Ok(())
    }

    #[tokio::test]
    async fn dropped_init_future_does_not_wedge_slot() -> anyhow::Result<()> {
        let slot: ClientSlot<String> = ClientSlot::new("wallet");

        let stalled = slot.get_or_init(|| async {
            std::future::pending::<()>().await;
            Ok(Arc::new("never".to_owned()))
        });
        assert!(timeout(Duration::from_millis(20), stalled).await.is_err());

        // The dropped attempt must have released the slot for retry.
        assert_eq!(slot.state(), ReadyState::Uninitialized);

        let count = AtomicUsize::new(0);
        slot.get_or_init(|| connect_counted(&count)).await?;
        assert!(slot.is_ready());
        Ok(())
    }
}
