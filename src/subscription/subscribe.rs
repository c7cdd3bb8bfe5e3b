use std::{
    collections::VecDeque,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use crate::{
    config::{self, Notification},
    errors::{SharedError, UnsubscriptionError},
    observer::Observer,
    subscription::teardown::Subscription,
};

/// A trait for types that can be subscribed to, allowing consumers to receive
/// values emitted by an observable stream.
pub trait Subscribeable {
    /// The type of items emitted by the observable stream.
    type ObsType;

    /// Subscribes to the observable stream and specifies how to handle emitted values.
    ///
    /// Accepts either a ready [`Subscriber`] or a raw [`Handlers`] set, which is
    /// turned into a `Subscriber` first.
    ///
    /// The returned `Subscription` controls this attachment only: closing it
    /// stops the subscriber and releases everything the observable acquired
    /// for it.
    fn subscribe(&self, s: impl Into<Subscriber<Self::ObsType>>) -> Subscription;
}

type NextFn<T> = Box<dyn FnMut(T) + Send>;
type ErrorFn = Box<dyn FnOnce(SharedError) + Send>;
type CompleteFn = Box<dyn FnOnce() + Send>;

/// Raw set of notification handlers, any of which may be missing.
///
/// ```
/// use rxr_core::subscribe::{Handlers, Subscriber};
///
/// let subscriber: Subscriber<i32> = Handlers::new()
///     .next(|v| println!("got {v}"))
///     .complete(|| println!("done"))
///     .into();
/// ```
pub struct Handlers<T> {
    next_fn: Option<NextFn<T>>,
    error_fn: Option<ErrorFn>,
    complete_fn: Option<CompleteFn>,
}

impl<T> Handlers<T> {
    #[must_use]
    pub fn new() -> Self {
        Handlers {
            next_fn: None,
            error_fn: None,
            complete_fn: None,
        }
    }

    #[must_use]
    pub fn next(mut self, next_fn: impl FnMut(T) + Send + 'static) -> Self {
        self.next_fn = Some(Box::new(next_fn));
        self
    }

    #[must_use]
    pub fn error(mut self, error_fn: impl FnOnce(SharedError) + Send + 'static) -> Self {
        self.error_fn = Some(Box::new(error_fn));
        self
    }

    #[must_use]
    pub fn complete(mut self, complete_fn: impl FnOnce() + Send + 'static) -> Self {
        self.complete_fn = Some(Box::new(complete_fn));
        self
    }
}

impl<T> Default for Handlers<T> {
    fn default() -> Self {
        Self::new()
    }
}

// Values waiting for the `next` handler, and whether some call is already
// delivering them.
struct Emission<T> {
    queue: VecDeque<T>,
    draining: bool,
}

struct SubscriberInner<T> {
    handlers: Mutex<Handlers<T>>,
    emission: Mutex<Emission<T>>,
    stopped: AtomicBool,
    subscription: Subscription,
}

/// A type that acts as an observer, allowing users to handle emitted values, errors,
/// and completion when subscribing to an `Observable`.
///
/// A `Subscriber` delivers at most one terminal notification. After `error` or
/// `complete` ran, or after its subscription was closed, every notification
/// is ignored. The terminal handler always runs before the subscriber's
/// resources are released.
///
/// Clones share the same state, so an observable can keep a clone on a thread
/// or inside scheduled work. Values are delivered one at a time and in call
/// order: a `next` made while the handler is running, from inside the handler
/// or from another thread, is queued and delivered by the call that is already
/// running the handler, right after the current value.
pub struct Subscriber<T> {
    inner: Arc<SubscriberInner<T>>,
}

impl<T> Subscriber<T> {
    /// Creates a new `Subscriber` instance with custom handling functions for emitted
    /// values, errors, and completion.
    pub fn new(
        next_fn: impl FnMut(T) + Send + 'static,
        error_fn: impl FnOnce(SharedError) + Send + 'static,
        complete_fn: impl FnOnce() + Send + 'static,
    ) -> Self {
        Handlers::new()
            .next(next_fn)
            .error(error_fn)
            .complete(complete_fn)
            .into()
    }

    /// Create a new Subscriber with the provided `next` function.
    ///
    /// The `next` closure is called when the observable emits a new item.
    pub fn on_next(next_fn: impl FnMut(T) + Send + 'static) -> Self {
        Handlers::new().next(next_fn).into()
    }

    /// Set the completion function for the Subscriber.
    ///
    /// The provided closure will be called when the observable completes its
    /// emission sequence.
    pub fn on_complete(&mut self, complete_fn: impl FnOnce() + Send + 'static) {
        self.handlers().complete_fn = Some(Box::new(complete_fn));
    }

    /// Set the error-handling function for the Subscriber.
    ///
    /// Without one, errors reaching this subscriber are reported as unhandled
    /// through [`config`](crate::config).
    pub fn on_error(&mut self, error_fn: impl FnOnce(SharedError) + Send + 'static) {
        self.handlers().error_fn = Some(Box::new(error_fn));
    }

    /// Returns `true` once the subscriber received a terminal notification or
    /// its subscription was closed.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire) || self.inner.subscription.is_closed()
    }

    /// Subscription owning the resources of this subscriber's attachment.
    #[must_use]
    pub fn subscription(&self) -> &Subscription {
        &self.inner.subscription
    }

    /// Stops the subscriber without notifying it and closes its subscription.
    ///
    /// # Errors
    ///
    /// Returns the teardown failures of the subscription.
    pub fn unsubscribe(&self) -> Result<(), UnsubscriptionError> {
        self.inner.stopped.store(true, Ordering::Release);
        self.inner.subscription.close()
    }

    fn handlers(&self) -> MutexGuard<'_, Handlers<T>> {
        self.inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn emission(&self) -> MutexGuard<'_, Emission<T>> {
        self.inner
            .emission
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // Moves into the stopped state; only one caller ever wins.
    fn stop(&self) -> bool {
        !self.inner.subscription.is_closed()
            && self
                .inner
                .stopped
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    fn take_handlers(&self) -> Handlers<T> {
        std::mem::take(&mut *self.handlers())
    }
}

impl<T> Observer for Subscriber<T> {
    type NextFnType = T;

    fn next(&mut self, v: Self::NextFnType) {
        if self.is_stopped() {
            config::report_stopped_notification(Notification::Next);
            return;
        }
        {
            let mut emission = self.emission();
            emission.queue.push_back(v);
            if emission.draining {
                return;
            }
            emission.draining = true;
        }

        // The handler runs without any lock held so it can call back into
        // this subscriber or close its subscription.
        let mut drain = Drain {
            subscriber: &*self,
            next_fn: self.handlers().next_fn.take(),
            finished: false,
        };
        while let Some(v) = drain.pop() {
            if let Some(next_fn) = drain.next_fn.as_mut() {
                next_fn(v);
            }
        }
    }

    fn error(&mut self, e: SharedError) {
        if !self.stop() {
            config::report_stopped_notification(Notification::Error);
            return;
        }
        let handlers = self.take_handlers();
        let _close = CloseOnDrop(self.subscription());

        match handlers.error_fn {
            Some(error_fn) => error_fn(e),
            None => config::report_unhandled_error(e),
        }
    }

    fn complete(&mut self) {
        if !self.stop() {
            config::report_stopped_notification(Notification::Complete);
            return;
        }
        let handlers = self.take_handlers();
        let _close = CloseOnDrop(self.subscription());

        if let Some(complete_fn) = handlers.complete_fn {
            complete_fn();
        }
    }
}

// Owns the `next` handler while one call delivers the queued values. The
// handler goes back into the subscriber under the emission lock, so a caller
// that starts draining afterwards always finds it. If the handler unwinds,
// values still queued wait for the next `next` call.
struct Drain<'a, T> {
    subscriber: &'a Subscriber<T>,
    next_fn: Option<NextFn<T>>,
    finished: bool,
}

impl<T> Drain<'_, T> {
    fn pop(&mut self) -> Option<T> {
        let subscriber = self.subscriber;
        let mut emission = subscriber.emission();
        if subscriber.is_stopped() {
            let discarded = std::mem::take(&mut emission.queue);
            self.finish(&mut emission);
            // User values are dropped outside of the lock.
            drop(emission);
            drop(discarded);
            return None;
        }
        let v = emission.queue.pop_front();
        if v.is_none() {
            self.finish(&mut emission);
        }
        v
    }

    fn finish(&mut self, emission: &mut Emission<T>) {
        if !self.subscriber.is_stopped() {
            let mut handlers = self.subscriber.handlers();
            if handlers.next_fn.is_none() {
                handlers.next_fn = self.next_fn.take();
            }
        }
        emission.draining = false;
        self.finished = true;
    }
}

impl<T> Drop for Drain<'_, T> {
    fn drop(&mut self) {
        if !self.finished {
            let subscriber = self.subscriber;
            let mut emission = subscriber.emission();
            self.finish(&mut emission);
        }
    }
}

// Closes the subscription after the terminal handler, also when it unwinds.
struct CloseOnDrop<'a>(&'a Subscription);

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.0.close() {
            tracing::warn!(%e, "teardown failed after terminal notification");
            config::report_unhandled_error(Arc::new(e));
        }
    }
}

impl<T> From<Handlers<T>> for Subscriber<T> {
    fn from(handlers: Handlers<T>) -> Self {
        Subscriber {
            inner: Arc::new(SubscriberInner {
                handlers: Mutex::new(handlers),
                emission: Mutex::new(Emission {
                    queue: VecDeque::new(),
                    draining: false,
                }),
                stopped: AtomicBool::new(false),
                subscription: Subscription::new(),
            }),
        }
    }
}

impl<T> Default for Subscriber<T> {
    /// Subscriber without any handlers.
    fn default() -> Self {
        Handlers::new().into()
    }
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Subscriber {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("stopped", &self.is_stopped())
            .field("subscription", &self.inner.subscription)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    #[test]
    fn next_after_complete_is_ignored() {
        let nexts = Arc::new(AtomicUsize::new(0));
        let nexts_c = Arc::clone(&nexts);
        let mut s: Subscriber<u32> = Handlers::new()
            .next(move |_| {
                nexts_c.fetch_add(1, Ordering::SeqCst);
            })
            .into();

        s.next(1);
        s.complete();
        s.next(2);

        assert_eq!(nexts.load(Ordering::SeqCst), 1);
        assert!(s.is_stopped());
        assert!(s.subscription().is_closed());
    }

    #[test]
    fn next_handler_panic_keeps_subscriber_usable() {
        let nexts = Arc::new(AtomicUsize::new(0));
        let nexts_c = Arc::clone(&nexts);
        let mut s = Subscriber::on_next(move |v: u32| {
            if v == 1 {
                panic!("bad value");
            }
            nexts_c.fetch_add(1, Ordering::SeqCst);
        });

        let mut s_cl = s.clone();
        let r = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || s_cl.next(1)));
        assert!(r.is_err());

        s.next(2);
        assert_eq!(nexts.load(Ordering::SeqCst), 1);
        assert!(!s.is_stopped());
    }

    #[test]
    fn complete_handler_panic_still_closes() {
        let mut s: Subscriber<()> = Handlers::new().complete(|| panic!("complete")).into();

        let mut s_cl = s.clone();
        let r = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || s_cl.complete()));
        assert!(r.is_err());
        assert!(s.subscription().is_closed());

        // Second terminal call is ignored, no panic.
        s.complete();
    }

    #[test]
    fn complete_from_inside_next() {
        let completes = Arc::new(AtomicUsize::new(0));
        let completes_c = Arc::clone(&completes);

        let slot: Arc<Mutex<Option<Subscriber<u32>>>> = Arc::new(Mutex::new(None));
        let slot_c = Arc::clone(&slot);

        let mut s: Subscriber<u32> = Handlers::new()
            .next(move |_| {
                // Completes its own subscriber from inside `next`.
                let me = slot_c.lock().unwrap().take();
                if let Some(mut me) = me {
                    me.complete();
                }
            })
            .complete(move || {
                completes_c.fetch_add(1, Ordering::SeqCst);
            })
            .into();
        *slot.lock().unwrap() = Some(s.clone());

        s.next(1);
        s.next(2);

        assert_eq!(completes.load(Ordering::SeqCst), 1);
        assert!(s.is_stopped());
    }

    #[test]
    fn next_from_inside_next_is_delivered_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_c = Arc::clone(&seen);

        let slot: Arc<Mutex<Option<Subscriber<u32>>>> = Arc::new(Mutex::new(None));
        let slot_c = Arc::clone(&slot);

        let mut s = Subscriber::on_next(move |v: u32| {
            seen_c.lock().unwrap().push(v);
            if v == 1 {
                let me = slot_c.lock().unwrap().clone();
                if let Some(mut me) = me {
                    me.next(2);
                    // Not delivered yet, the current value is still being handled.
                    assert_eq!(*seen_c.lock().unwrap(), vec![1]);
                }
            }
        });
        *slot.lock().unwrap() = Some(s.clone());

        s.next(1);
        s.next(3);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn next_from_several_threads_loses_nothing() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_c = Arc::clone(&seen);
        let s = Subscriber::on_next(move |v: (u32, u32)| {
            seen_c.lock().unwrap().push(v);
            std::thread::yield_now();
        });

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let mut s = s.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        s.next((t, i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1000);
        for t in 0..4 {
            let from_thread: Vec<u32> = seen
                .iter()
                .filter(|(thread, _)| *thread == t)
                .map(|(_, i)| *i)
                .collect();
            assert_eq!(from_thread, (0..250).collect::<Vec<_>>());
        }
    }

    #[test]
    fn complete_from_inside_next_drops_queued_values() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_c = Arc::clone(&seen);

        let slot: Arc<Mutex<Option<Subscriber<u32>>>> = Arc::new(Mutex::new(None));
        let slot_c = Arc::clone(&slot);

        let mut s = Subscriber::on_next(move |v: u32| {
            seen_c.lock().unwrap().push(v);
            let me = slot_c.lock().unwrap().take();
            if let Some(mut me) = me {
                me.next(2);
                me.complete();
            }
        });
        *slot.lock().unwrap() = Some(s.clone());

        s.next(1);
        s.next(3);

        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert!(s.is_stopped());
    }

    #[test]
    fn unsubscribe_stops_silently() {
        let completes = Arc::new(AtomicUsize::new(0));
        let completes_c = Arc::clone(&completes);
        let mut s: Subscriber<u32> = Handlers::new()
            .complete(move || {
                completes_c.fetch_add(1, Ordering::SeqCst);
            })
            .into();

        s.unsubscribe().unwrap();
        s.complete();

        assert_eq!(completes.load(Ordering::SeqCst), 0);
        assert!(s.is_stopped());
    }
}
