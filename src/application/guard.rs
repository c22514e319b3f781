use crate::error::{LedgerError, Result};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

static NEXT_GUARD_ID: AtomicU64 = AtomicU64::new(0);

tokio::task_local! {
    /// Guards entered by the current task, innermost last.
    static ENTERED: Vec<u64>;
}

/// Serializes mutating ledger operations and rejects nested ones.
///
/// Calls from different tasks queue on the inner mutex. A call made while the
/// same task is already inside this guard (for example from a token callback
/// during a transfer) fails immediately with [`LedgerError::Reentrant`]
/// instead of deadlocking.
///
/// Nesting is tracked per task, so a callback must run on the calling task;
/// one that spawns a new task and waits on it will block until the outer call
/// finishes.
#[derive(Debug)]
pub struct ReentrancyGuard {
    id: u64,
    lock: Mutex<()>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self {
            id: NEXT_GUARD_ID.fetch_add(1, Ordering::Relaxed),
            lock: Mutex::new(()),
        }
    }

    /// Whether the current task is inside this guard.
    pub fn is_entered(&self) -> bool {
        ENTERED
            .try_with(|entered| entered.contains(&self.id))
            .unwrap_or(false)
    }

    /// Runs `op` with the guard held.
    pub async fn run<F, T>(&self, op: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let mut entered = ENTERED.try_with(Clone::clone).unwrap_or_default();
        if entered.contains(&self.id) {
            return Err(LedgerError::Reentrant);
        }
        entered.push(self.id);

        let _held = self.lock.lock().await;
        ENTERED.scope(entered, op).await
    }
}

impl Default for ReentrancyGuard {
    fn default() -> Self {
        Self::new()
    }
}
