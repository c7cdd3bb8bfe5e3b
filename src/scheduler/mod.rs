//! Deferred execution of work for observables.
//!
//! A [`Scheduler`] accepts an [`Action`] and a delay and runs the action no
//! earlier than that delay. Observables use schedulers through
//! [`SchedulerExt::schedule`], which packs work and its state into an action
//! and hands back a [`Subscription`] that cancels it.
//!
//! Three schedulers are provided:
//!
//! - [`ImmediateScheduler`] runs work synchronously on the calling thread.
//! - [`VirtualTimeScheduler`] queues work on a virtual clock that is moved
//!   forward by hand, which makes time-dependent behavior testable.
//! - [`TokioScheduler`] queues work on a Tokio runtime.
//!
//! Work can schedule itself again through [`Action::schedule`]:
//!
//! ```
//! use std::time::Duration;
//! use rxr_core::scheduler::{Action, SchedulerExt, VirtualTimeScheduler};
//!
//! fn countdown(n: u32, action: &Action) {
//!     println!("{n}");
//!     if n > 0 {
//!         action.schedule(countdown, Duration::from_millis(10), n - 1);
//!     }
//! }
//!
//! let scheduler = VirtualTimeScheduler::new();
//! let handle = scheduler.schedule(countdown, Duration::ZERO, 3);
//!
//! scheduler.advance_by(Duration::from_millis(15));
//! // Stops the countdown before it reaches zero.
//! handle.close().unwrap();
//! assert_eq!(scheduler.flush(), 0);
//! ```

mod action;
mod immediate;
mod tokio_scheduler;
mod virtual_time;

pub use action::Action;
pub use immediate::ImmediateScheduler;
pub use tokio_scheduler::TokioScheduler;
pub use virtual_time::VirtualTimeScheduler;

use std::{sync::Arc, time::Duration};

use crate::subscription::teardown::Subscription;

/// Shared, type-erased scheduler as stored by observables.
pub type SchedulerRef = Arc<dyn Scheduler>;

/// Facility running actions after a delay.
///
/// Implementations decide where and when actions run, but must never run one
/// before its delay elapsed, and must run actions that are due at the same
/// time in the order they were enqueued. Cancelled actions skip themselves in
/// [`Action::execute`], so implementations need not track cancellation.
pub trait Scheduler: Send + Sync {
    /// Current time of this scheduler, measured from its own epoch.
    fn now(&self) -> Duration;

    /// Queues `action` to run once `delay` has elapsed.
    fn enqueue(&self, action: Action, delay: Duration);
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn enqueue(&self, action: Action, delay: Duration) {
        (**self).enqueue(action, delay);
    }
}

/// Scheduling entry point for every cloneable scheduler, including
/// [`SchedulerRef`].
pub trait SchedulerExt: Scheduler + Clone + 'static {
    /// Schedules `work` to run with `state` once `delay` has elapsed.
    ///
    /// The returned subscription cancels the work while it is pending, and
    /// any continuation the work scheduled through [`Action::schedule`].
    /// Closing it after the work ran is a no-op.
    fn schedule<S, F>(&self, work: F, delay: Duration, state: S) -> Subscription
    where
        S: Send + 'static,
        F: FnOnce(S, &Action) + Send + 'static,
    {
        let scheduler: SchedulerRef = Arc::new(self.clone());
        let action = Action::new(
            Arc::clone(&scheduler),
            Box::new(move |action: &Action| work(state, action)),
        );
        let handle = action.subscription().clone();

        tracing::trace!(?delay, "scheduling action");
        scheduler.enqueue(action, delay);
        handle
    }
}

impl<T: Scheduler + Clone + 'static> SchedulerExt for T {}
