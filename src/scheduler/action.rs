use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
    time::Duration,
};

use super::SchedulerRef;
use crate::subscription::teardown::{Subscription, Teardown};

type Work = Box<dyn FnOnce(&Action) + Send>;

struct Pending {
    work: Option<Work>,
    scheduler: Option<SchedulerRef>,
}

// Shared by an action and every continuation it scheduled.
struct Chain {
    // Handle returned by the first `schedule`; continuations hang off it.
    root: Subscription,
    root_settled: AtomicBool,
}

impl Chain {
    // The root handle closes once the first work ran and no continuation is
    // pending or running.
    fn close_if_idle(&self) {
        if self.root_settled.load(Ordering::Acquire) && self.root.nested_len() == 0 {
            if let Err(e) = self.root.close() {
                tracing::warn!(%e, "failed to close finished action chain");
            }
        }
    }
}

struct ActionInner {
    pending: Mutex<Pending>,
    subscription: Subscription,
    chain: Arc<Chain>,
}

/// One cancellable unit of scheduled work.
///
/// Schedulers receive actions through [`Scheduler::enqueue`] and call
/// [`execute`](Action::execute) when they are due. Inside the work the action
/// is passed back, so the work can schedule a continuation with
/// [`schedule`](Action::schedule).
///
/// [`Scheduler::enqueue`]: super::Scheduler::enqueue
pub struct Action {
    inner: Arc<ActionInner>,
}

impl Action {
    pub(crate) fn new(scheduler: SchedulerRef, work: Work) -> Self {
        let subscription = Subscription::new();
        let chain = Arc::new(Chain {
            root: subscription.clone(),
            root_settled: AtomicBool::new(false),
        });
        Self::with_chain(scheduler, work, subscription, chain)
    }

    fn with_chain(
        scheduler: SchedulerRef,
        work: Work,
        subscription: Subscription,
        chain: Arc<Chain>,
    ) -> Self {
        let inner = Arc::new(ActionInner {
            pending: Mutex::new(Pending {
                work: Some(work),
                scheduler: Some(scheduler),
            }),
            subscription,
            chain,
        });

        // Cancelling releases the work and its state right away instead of
        // when the scheduler gets to the action. A continuation leaving the
        // chain, executed or cancelled, may be the last one keeping the root
        // handle open.
        let weak: Weak<ActionInner> = Arc::downgrade(&inner);
        let release = Teardown::logic(move || {
            if let Some(inner) = weak.upgrade() {
                let action = Action { inner };
                action.release();
                if !action.is_root() {
                    action.inner.chain.close_if_idle();
                }
            }
        });
        if let Err(e) = inner.subscription.add(release) {
            tracing::warn!(%e, "failed to release cancelled action");
        }

        Action { inner }
    }

    /// Subscription cancelling this action.
    #[must_use]
    pub fn subscription(&self) -> &Subscription {
        &self.inner.subscription
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.subscription.is_closed()
    }

    /// Schedules a continuation on the scheduler running this action.
    ///
    /// The continuation gets its own handle, which is also chained to the
    /// handle of the original `schedule` call, so cancelling the original
    /// cancels the continuation too.
    pub fn schedule<S, F>(&self, work: F, delay: Duration, state: S) -> Subscription
    where
        S: Send + 'static,
        F: FnOnce(S, &Action) + Send + 'static,
    {
        let Some(scheduler) = self.lock().scheduler.clone() else {
            // Already cancelled.
            return Subscription::closed();
        };

        let handle = Subscription::new();
        let action = Action::with_chain(
            Arc::clone(&scheduler),
            Box::new(move |action: &Action| work(state, action)),
            handle.clone(),
            Arc::clone(&self.inner.chain),
        );

        if let Err(e) = self.inner.chain.root.add(handle.clone()) {
            tracing::warn!(%e, "failed to chain continuation");
        }
        if handle.is_closed() {
            tracing::debug!("continuation cancelled before it was scheduled");
            return handle;
        }

        tracing::trace!(?delay, "scheduling continuation");
        scheduler.enqueue(action, delay);
        handle
    }

    /// Runs the work of this action, unless it was cancelled or already ran.
    ///
    /// Returns `true` if the work ran. Called by schedulers once the action is
    /// due.
    pub fn execute(&self) -> bool {
        if self.is_closed() {
            tracing::trace!("skipping cancelled action");
            return false;
        }
        let work = self.lock().work.take();
        let Some(work) = work else {
            return false;
        };

        let _done = Executed(self);
        work(self);
        true
    }

    fn is_root(&self) -> bool {
        self.inner.subscription == self.inner.chain.root
    }

    fn release(&self) {
        let pending = {
            let mut pending = self.lock();
            (pending.work.take(), pending.scheduler.take())
        };
        // User state is dropped outside of the lock.
        drop(pending);
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// Settles an action after its work ran or unwound. Continuations close right
// away; the original handle stays open while continuations are pending and
// closes when the last of them settles.
struct Executed<'a>(&'a Action);

impl Drop for Executed<'_> {
    fn drop(&mut self) {
        let action = self.0;
        action.release();

        if action.is_root() {
            action.inner.chain.root_settled.store(true, Ordering::Release);
            action.inner.chain.close_if_idle();
        } else if let Err(e) = action.inner.subscription.close() {
            tracing::warn!(%e, "failed to close executed action");
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("closed", &self.is_closed())
            .field("root", &self.is_root())
            .finish()
    }
}
