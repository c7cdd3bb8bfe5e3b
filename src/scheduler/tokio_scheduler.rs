use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering as AtomicOrdering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    runtime,
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    time::{self, Instant},
};

use super::{Action, Scheduler};
use crate::errors::{panic_message, SchedulerError};

struct Entry {
    due: Instant,
    seq: u64,
    action: Action,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

struct Inner {
    tx: UnboundedSender<Entry>,
    epoch: Instant,
    seq: AtomicU64,
}

/// Scheduler running work on a Tokio runtime.
///
/// Every `TokioScheduler` owns one driver task that keeps the queued actions
/// ordered by due time and scheduling order and runs them from that task.
/// Clones share the driver. The driver stops once every clone is dropped and
/// its queue is drained.
///
/// Work runs synchronously inside the driver task, so long-running work
/// delays every other action of the same scheduler.
#[derive(Clone)]
pub struct TokioScheduler {
    inner: Arc<Inner>,
}

impl TokioScheduler {
    /// Creates a scheduler on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NoRuntime`] when called outside of a Tokio
    /// runtime.
    pub fn new() -> Result<Self, SchedulerError> {
        let handle = runtime::Handle::try_current()?;
        Ok(Self::with_handle(&handle))
    }

    /// Creates a scheduler whose driver task runs on `handle`.
    #[must_use]
    pub fn with_handle(handle: &runtime::Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        handle.spawn(drive(rx));

        TokioScheduler {
            inner: Arc::new(Inner {
                tx,
                epoch: Instant::now(),
                seq: AtomicU64::new(0),
            }),
        }
    }
}

impl Scheduler for TokioScheduler {
    fn now(&self) -> Duration {
        Instant::now().duration_since(self.inner.epoch)
    }

    fn enqueue(&self, action: Action, delay: Duration) {
        let entry = Entry {
            due: Instant::now() + delay,
            seq: self.inner.seq.fetch_add(1, AtomicOrdering::Relaxed),
            action,
        };
        if let Err(mpsc::error::SendError(entry)) = self.inner.tx.send(entry) {
            tracing::warn!("scheduler driver is gone, dropping action");
            // Nothing will run it, make that visible to the handle.
            if let Err(e) = entry.action.subscription().close() {
                tracing::warn!(%e, "failed to cancel dropped action");
            }
        }
    }
}

impl fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("now", &self.now())
            .finish()
    }
}

async fn drive(mut rx: UnboundedReceiver<Entry>) {
    let mut queue: BinaryHeap<Reverse<Entry>> = BinaryHeap::new();
    let mut open = true;

    loop {
        let next_due = queue.peek().map(|Reverse(e)| e.due);
        if !open && next_due.is_none() {
            break;
        }

        tokio::select! {
            biased;

            entry = rx.recv(), if open => match entry {
                Some(entry) => queue.push(Reverse(entry)),
                None => open = false,
            },
            () = time::sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                let now = Instant::now();
                while queue.peek().map_or(false, |Reverse(e)| e.due <= now) {
                    if let Some(Reverse(entry)) = queue.pop() {
                        // The driver outlives panicking work.
                        let executed =
                            panic::catch_unwind(AssertUnwindSafe(|| entry.action.execute()));
                        if let Err(payload) = executed {
                            tracing::error!(
                                panic = %panic_message(payload.as_ref()),
                                "scheduled action panicked"
                            );
                        }
                    }
                }
            }
        }
    }
    tracing::debug!("scheduler driver stopped");
}
