//! The `observable` module provides `Observable`, the cold producer of a
//! notification sequence, and the `empty` observable built on top of it.

pub mod empty;

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use crate::{
    config,
    errors::ObservableError,
    observer::Observer,
    scheduler::SchedulerRef,
    subscription::{
        subscribe::{Subscribeable, Subscriber},
        teardown::{Subscription, Teardown},
    },
};

type SubscribeFn<T> = Box<dyn Fn(Subscriber<T>) -> Teardown + Send + Sync>;

/// The `Observable` struct represents a lazy source of values.
///
/// An `Observable` only stores its subscribe logic. Nothing happens until
/// [`subscribe`] is called; every call runs the logic again, independently,
/// for the new `Subscriber`.
///
/// The logic returns a [`Teardown`] that is registered on the subscriber's
/// subscription, so it runs exactly once: when the subscriber completes or
/// errors, or when the returned `Subscription` is closed, whichever comes
/// first.
///
/// # Example: synchronous `Observable`
///
/// ```
/// use rxr_core::{Observable, Observer, Subscribeable, subscribe::Subscriber, teardown::Teardown};
///
/// // Emits values from 1 to 3 and completes.
/// let observable = Observable::new(|mut subscriber| {
///     for i in 1..=3 {
///         subscriber.next(i);
///     }
///     subscriber.complete();
///     Teardown::Nil
/// });
///
/// // Observables are cold, nothing is emitted before this call.
/// observable.subscribe(Subscriber::new(
///     |v: i32| println!("Emitted {}", v),
///     |e| eprintln!("{}", e),
///     || println!("Completed"),
/// ));
/// ```
///
/// # Example: asynchronous `Observable` with unsubscribe
///
/// ```
/// use std::{sync::{Arc, atomic::{AtomicBool, Ordering}}, time::Duration};
/// use rxr_core::{Observable, Observer, Subscribeable, subscribe::Subscriber, teardown::Teardown};
///
/// let observable = Observable::new(|mut subscriber| {
///     let done = Arc::new(AtomicBool::new(false));
///     let done_c = Arc::clone(&done);
///
///     std::thread::spawn(move || {
///         for i in 0.. {
///             // Stop producing once unsubscribed.
///             if done_c.load(Ordering::Acquire) {
///                 break;
///             }
///             subscriber.next(i);
///             std::thread::sleep(Duration::from_millis(1));
///         }
///     });
///
///     Teardown::logic(move || done.store(true, Ordering::Release))
/// });
///
/// let subscription = observable.subscribe(Subscriber::on_next(|v: u64| println!("{}", v)));
/// std::thread::sleep(Duration::from_millis(10));
///
/// // Stops the subscriber and signals the thread to finish.
/// subscription.close().unwrap();
/// ```
///
/// [`subscribe`]: Subscribeable::subscribe
pub struct Observable<T> {
    subscribe_fn: SubscribeFn<T>,
}

impl<T> Observable<T> {
    /// Creates a new `Observable` with the provided subscribe function.
    ///
    /// The function receives the `Subscriber` of one subscription and returns
    /// the teardown releasing whatever it acquired for it. It may move the
    /// subscriber into a thread, a task, or scheduled work.
    ///
    /// Creating an `Observable` performs no work.
    pub fn new(sf: impl Fn(Subscriber<T>) -> Teardown + Send + Sync + 'static) -> Self {
        Observable {
            subscribe_fn: Box::new(sf),
        }
    }
}

impl<T: Send + 'static> Observable<T> {
    /// Observable that completes right away without emitting.
    ///
    /// See [`empty::create`].
    #[must_use]
    pub fn empty() -> Self {
        empty::create(None)
    }

    /// Observable that completes without emitting, with the completion
    /// delivered through `scheduler`.
    ///
    /// See [`empty::create`].
    #[must_use]
    pub fn empty_on(scheduler: SchedulerRef) -> Self {
        empty::create(Some(scheduler))
    }
}

impl<T> Subscribeable for Observable<T> {
    type ObsType = T;

    fn subscribe(&self, s: impl Into<Subscriber<T>>) -> Subscription {
        let subscriber = s.into();
        let subscription = subscriber.subscription().clone();
        let mut fallback = subscriber.clone();

        match panic::catch_unwind(AssertUnwindSafe(|| (self.subscribe_fn)(subscriber))) {
            Ok(teardown) => {
                // Fails only if the subscription already closed and the
                // teardown, run right away, failed.
                if let Err(e) = subscription.add(teardown) {
                    config::report_unhandled_error(Arc::new(e));
                }
            }
            Err(payload) => {
                if fallback.is_stopped() {
                    panic::resume_unwind(payload);
                }
                let e = ObservableError::panicked(payload.as_ref());
                tracing::debug!(%e, "routing subscribe panic to the error path");
                fallback.error(Arc::new(e));
            }
        }
        subscription
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable").finish_non_exhaustive()
    }
}
