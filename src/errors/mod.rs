//! Error types used by observables, subscriptions and schedulers.
//!
//! - [`ObservableError`]: failures the core delivers through a subscriber's
//!   error path.
//! - [`TeardownError`] / [`UnsubscriptionError`]: failures collected while a
//!   subscription closes.
//! - [`SchedulerError`]: failures constructing a scheduler.

mod observable_errors;
mod subscription_errors;

pub use observable_errors::*;
pub use subscription_errors::*;

pub(crate) use observable_errors::panic_message;
