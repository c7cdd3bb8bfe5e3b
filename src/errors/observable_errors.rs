use std::any::Any;
use std::error::Error;
use std::sync::Arc;

use thiserror::Error;

/// Error value delivered through [`Observer::error`].
///
/// Errors are shared behind an `Arc` so the same failure can be handed to
/// several observers without cloning the underlying error.
///
/// [`Observer::error`]: crate::Observer::error
pub type SharedError = Arc<dyn Error + Send + Sync>;

/// Boxed error returned by fallible teardown closures.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Errors raised by the core itself and pushed to a `Subscriber`'s error path.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ObservableError {
    /// The observable's subscribe logic panicked while it was being subscribed to.
    #[error("observable panicked during subscribe: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },
}

impl ObservableError {
    pub(crate) fn panicked(payload: &(dyn Any + Send)) -> Self {
        ObservableError::Panicked {
            message: panic_message(payload),
        }
    }
}

// Panic payloads are almost always `&str` or `String`.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
