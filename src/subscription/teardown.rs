use std::{
    fmt,
    future::Future,
    mem,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
};

use tokio::runtime;

use crate::errors::{panic_message, BoxError, TeardownError, UnsubscriptionError};

/// A single unit of cleanup owned by a [`Subscription`].
///
/// Teardowns are returned from an `Observable`'s subscribe logic and added to
/// subscriptions with [`Subscription::add`]. Each unit runs at most once.
pub enum Teardown {
    /// No cleanup.
    Nil,

    /// A nested subscription, closed together with its parent.
    Wrapped(Subscription),

    /// Cleanup defined by a function.
    Logic(Box<dyn FnOnce() + Send>),

    /// Cleanup defined by a function that can fail. Its error is collected into
    /// the parent's [`UnsubscriptionError`].
    Fallible(Box<dyn FnOnce() -> Result<(), BoxError> + Send>),

    /// Asynchronous cleanup represented by a future. It is spawned on the Tokio
    /// runtime the subscription was created on, or on the current runtime.
    Future(Pin<Box<dyn Future<Output = ()> + Send>>),
}

impl Teardown {
    pub fn logic(f: impl FnOnce() + Send + 'static) -> Self {
        Teardown::Logic(Box::new(f))
    }

    pub fn fallible(f: impl FnOnce() -> Result<(), BoxError> + Send + 'static) -> Self {
        Teardown::Fallible(Box::new(f))
    }

    pub fn future(f: impl Future<Output = ()> + Send + 'static) -> Self {
        Teardown::Future(Box::pin(f))
    }

    fn run(self, runtime_handle: Option<&runtime::Handle>, errors: &mut Vec<TeardownError>) {
        match self {
            Teardown::Nil => (),
            Teardown::Wrapped(subscription) => {
                if let Err(e) = subscription.close() {
                    errors.extend(e.into_errors());
                }
            }
            Teardown::Logic(fnc) => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(fnc)) {
                    errors.push(TeardownError::Panicked {
                        message: panic_message(payload.as_ref()),
                    });
                }
            }
            Teardown::Fallible(fnc) => match panic::catch_unwind(AssertUnwindSafe(fnc)) {
                Ok(Ok(())) => (),
                Ok(Err(e)) => errors.push(TeardownError::Failed(e)),
                Err(payload) => errors.push(TeardownError::Panicked {
                    message: panic_message(payload.as_ref()),
                }),
            },
            Teardown::Future(future) => {
                let handle = runtime_handle
                    .cloned()
                    .or_else(|| runtime::Handle::try_current().ok());
                match handle {
                    Some(handle) => {
                        handle.spawn(future);
                    }
                    None => errors.push(TeardownError::NoRuntime),
                }
            }
        }
    }
}

impl From<Subscription> for Teardown {
    fn from(subscription: Subscription) -> Self {
        Teardown::Wrapped(subscription)
    }
}

impl From<()> for Teardown {
    fn from(_: ()) -> Self {
        Teardown::Nil
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Teardown::Nil => write!(f, "Nil"),
            Teardown::Wrapped(s) => f.debug_tuple("Wrapped").field(s).finish(),
            Teardown::Logic(_) => write!(f, "Logic(..)"),
            Teardown::Fallible(_) => write!(f, "Fallible(..)"),
            Teardown::Future(_) => write!(f, "Future(..)"),
        }
    }
}

struct State {
    teardowns: Vec<Teardown>,
    // Parents are held weakly so a child never keeps its parent alive.
    parents: Vec<Weak<Inner>>,
}

struct Inner {
    closed: AtomicBool,
    state: Mutex<State>,
    runtime_handle: Option<runtime::Handle>,
}

/// Composable, cancellable handle to the resources of one subscription.
///
/// A `Subscription` owns any number of [`Teardown`] units and runs each of
/// them exactly once, the first time [`close`] is called. Clones are cheap and
/// refer to the same subscription; equality is identity.
///
/// Units added after the subscription closed are torn down right away instead
/// of being retained.
///
/// [`close`]: Subscription::close
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<Inner>,
}

impl Subscription {
    /// Creates an open subscription with no teardowns.
    #[must_use]
    pub fn new() -> Self {
        Self::with_closed(false)
    }

    /// Creates a subscription that is already closed.
    ///
    /// Closing it again has no effect; anything added to it is torn down
    /// immediately.
    #[must_use]
    pub fn closed() -> Self {
        Self::with_closed(true)
    }

    fn with_closed(closed: bool) -> Self {
        Subscription {
            inner: Arc::new(Inner {
                closed: AtomicBool::new(closed),
                state: Mutex::new(State {
                    teardowns: Vec::new(),
                    parents: Vec::new(),
                }),
                runtime_handle: runtime::Handle::try_current().ok(),
            }),
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Registers a teardown unit.
    ///
    /// If this subscription is already closed the unit is torn down
    /// immediately and its failure, if any, is returned. Adding a subscription
    /// to itself, adding an already closed subscription, or adding
    /// [`Teardown::Nil`] does nothing.
    ///
    /// # Errors
    ///
    /// Returns the teardown failure when the unit had to run immediately.
    pub fn add(&self, teardown: impl Into<Teardown>) -> Result<(), UnsubscriptionError> {
        let teardown = teardown.into();

        let child = match &teardown {
            Teardown::Nil => return Ok(()),
            Teardown::Wrapped(child) if child == self || child.is_closed() => return Ok(()),
            Teardown::Wrapped(child) => Some(child.clone()),
            _ => None,
        };

        let teardown = {
            let mut state = self.lock();
            // Checked under the lock so a concurrent `close` cannot miss the unit.
            if self.is_closed() {
                Some(teardown)
            } else {
                state.teardowns.push(teardown);
                None
            }
        };

        match teardown {
            None => {
                if let Some(child) = child {
                    self.link_child(&child);
                }
                Ok(())
            }
            Some(teardown) => {
                let mut errors = Vec::new();
                teardown.run(self.inner.runtime_handle.as_ref(), &mut errors);
                UnsubscriptionError::check(errors)
            }
        }
    }

    // A child closing concurrently either takes its parent list after the
    // link was pushed and detaches itself, or is seen closed here and
    // detached by this call.
    fn link_child(&self, child: &Subscription) {
        let closed = {
            let mut child_state = child.lock();
            let closed = child.is_closed();
            if !closed {
                child_state.parents.push(Arc::downgrade(&self.inner));
            }
            closed
        };
        if closed {
            self.detach(&child.inner);
        }
    }

    /// Detaches `child` from this subscription without closing it.
    pub fn remove(&self, child: &Subscription) {
        self.detach(&child.inner);
        child
            .lock()
            .parents
            .retain(|p| !ptr_eq_weak(p, &self.inner));
    }

    /// Closes the subscription, tearing down every owned unit in the order it
    /// was added.
    ///
    /// Only the first call does anything. A failing unit never prevents the
    /// others from running; all failures are returned together.
    ///
    /// # Errors
    ///
    /// Returns an [`UnsubscriptionError`] listing every teardown that failed.
    pub fn close(&self) -> Result<(), UnsubscriptionError> {
        if self
            .inner
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        let (teardowns, parents) = {
            let mut state = self.lock();
            (
                mem::take(&mut state.teardowns),
                mem::take(&mut state.parents),
            )
        };

        for parent in parents.iter().filter_map(Weak::upgrade) {
            Subscription { inner: parent }.detach(&self.inner);
        }

        let count = teardowns.len();
        let mut errors = Vec::new();
        for teardown in teardowns {
            teardown.run(self.inner.runtime_handle.as_ref(), &mut errors);
        }

        if !errors.is_empty() {
            tracing::debug!(
                teardowns = count,
                failed = errors.len(),
                "subscription closed with teardown errors"
            );
        }
        UnsubscriptionError::check(errors)
    }

    /// Number of nested subscriptions still owned by this one.
    pub(crate) fn nested_len(&self) -> usize {
        self.lock()
            .teardowns
            .iter()
            .filter(|t| matches!(t, Teardown::Wrapped(_)))
            .count()
    }

    fn detach(&self, child: &Arc<Inner>) {
        let removed = {
            let mut state = self.lock();
            let at = state.teardowns.iter().position(|t| match t {
                Teardown::Wrapped(s) => Arc::ptr_eq(&s.inner, child),
                _ => false,
            });
            at.map(|i| state.teardowns.remove(i))
        };
        // Dropped outside of the lock.
        drop(removed);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn ptr_eq_weak(weak: &Weak<Inner>, inner: &Arc<Inner>) -> bool {
    std::ptr::eq(weak.as_ptr(), Arc::as_ptr(inner))
}

impl From<Teardown> for Subscription {
    /// Open subscription owning `teardown`. A wrapped subscription is returned
    /// as is.
    fn from(teardown: Teardown) -> Self {
        match teardown {
            Teardown::Wrapped(subscription) => subscription,
            Teardown::Nil => Subscription::new(),
            teardown => {
                let subscription = Subscription::new();
                subscription.lock().teardowns.push(teardown);
                subscription
            }
        }
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Subscription {}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .field("teardowns", &self.lock().teardowns.len())
            .finish()
    }
}
