//! Observable that emits no values and only completes.
//!
//! ```
//! use std::{sync::Arc, time::Duration};
//! use rxr_core::{
//!     observable::empty, scheduler::VirtualTimeScheduler, subscribe::Handlers, Subscribeable,
//! };
//!
//! // Completes before `subscribe` returns.
//! empty::create::<()>(None).subscribe(Handlers::new().complete(|| println!("done")));
//!
//! // Completes once the scheduler runs the completion.
//! let scheduler = VirtualTimeScheduler::new();
//! let observable = empty::create::<()>(Some(Arc::new(scheduler.clone())));
//! observable.subscribe(Handlers::new().complete(|| println!("done later")));
//! scheduler.flush();
//! ```

use std::time::Duration;

use crate::{
    observable::Observable,
    observer::Observer,
    scheduler::{Action, SchedulerExt, SchedulerRef},
    subscribe::Subscriber,
    teardown::Teardown,
};

/// Creates an observable that completes without emitting any value.
///
/// Without a scheduler, `complete` is called synchronously inside `subscribe`
/// and the returned subscription is already closed.
///
/// With a scheduler, `subscribe` only schedules the completion with a zero
/// delay. Closing the returned subscription before the scheduler runs it means
/// `complete` is never called.
pub fn create<T: Send + 'static>(scheduler: Option<SchedulerRef>) -> Observable<T> {
    match scheduler {
        None => Observable::new(|mut subscriber: Subscriber<T>| {
            subscriber.complete();
            Teardown::Nil
        }),
        Some(scheduler) => Observable::new(move |subscriber: Subscriber<T>| {
            Teardown::Wrapped(scheduler.schedule(dispatch_complete, Duration::ZERO, subscriber))
        }),
    }
}

fn dispatch_complete<T>(mut subscriber: Subscriber<T>, _: &Action) {
    subscriber.complete();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{scheduler::VirtualTimeScheduler, subscribe::Handlers, Subscribeable};

    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn counting_handlers(count: &Arc<AtomicUsize>) -> Handlers<u8> {
        let count = Arc::clone(count);
        Handlers::new()
            .next(|_| panic!("empty observable emitted a value"))
            .complete(move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
    }

    #[test]
    fn scheduled_completion_is_cancellable() {
        let completes = Arc::new(AtomicUsize::new(0));
        let scheduler = VirtualTimeScheduler::new();
        let observable = create::<u8>(Some(Arc::new(scheduler.clone())));

        let subscription = observable.subscribe(counting_handlers(&completes));
        assert_eq!(scheduler.pending(), 1);

        subscription.close().unwrap();
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.flush(), 0);
        assert_eq!(completes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn each_subscription_completes_independently() {
        let completes = Arc::new(AtomicUsize::new(0));
        let scheduler = VirtualTimeScheduler::new();
        let observable = create::<u8>(Some(Arc::new(scheduler.clone())));

        let first = observable.subscribe(counting_handlers(&completes));
        let second = observable.subscribe(counting_handlers(&completes));
        first.close().unwrap();

        assert_eq!(scheduler.flush(), 1);
        assert_eq!(completes.load(Ordering::SeqCst), 1);
        assert!(second.is_closed());
    }
}
