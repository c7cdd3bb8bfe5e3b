//! `rxr_core` is the subscription and scheduling core of a push-based reactive
//! stream library.
//!
//! An [`Observable`] is a lazy producer. Subscribing attaches a [`Subscriber`]
//! to it, runs the observable's logic for that subscriber and hands back a
//! [`Subscription`]. The subscriber receives any number of values followed by
//! at most one terminal notification, either `error` or `complete`, and the
//! resources acquired for the subscription are released exactly once: after
//! the terminal notification, or when the subscription is closed, whichever
//! comes first.
//!
//! Work that should run later goes through a [`Scheduler`]. Scheduled work is
//! cancelled by closing the `Subscription` returned from
//! [`schedule`](SchedulerExt::schedule).
//!
//! ```
//! use std::sync::Arc;
//! use rxr_core::{
//!     scheduler::VirtualTimeScheduler, subscribe::Handlers, Observable, Subscribeable,
//! };
//!
//! let scheduler = VirtualTimeScheduler::new();
//! let observable: Observable<u32> = Observable::empty_on(Arc::new(scheduler.clone()));
//!
//! let subscription = observable.subscribe(Handlers::new().complete(|| println!("completed")));
//!
//! // Nothing ran yet; closing now means `complete` never runs.
//! subscription.close().unwrap();
//! assert_eq!(scheduler.flush(), 0);
//! ```
//!
//! [`Subscriber`]: subscribe::Subscriber
//! [`Subscription`]: teardown::Subscription
//! [`Scheduler`]: scheduler::Scheduler

pub mod config;
mod errors;
pub mod observable;
mod observer;
pub mod scheduler;
mod subscription;

pub use errors::{
    BoxError, ObservableError, SchedulerError, SharedError, TeardownError, UnsubscriptionError,
};
pub use observable::Observable;
pub use observer::Observer;
pub use scheduler::{Scheduler, SchedulerExt};
pub use subscription::subscribe::Subscribeable;
pub use subscription::*;
