//! # Process-wide configuration.
//!
//! [`Config`] decides what happens to faults that have no caller to return
//! them to: errors pushed to a subscriber without an error handler, and
//! notifications sent to a subscriber that already stopped.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use rxr_core::config::{self, Config};
//!
//! let mut cfg = Config::default();
//! cfg.on_unhandled_error = Some(Arc::new(|e| eprintln!("unhandled: {e}")));
//! config::set(cfg);
//!
//! assert!(config::get().on_unhandled_error.is_some());
//! config::reset();
//! ```

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::errors::SharedError;

/// Hook receiving errors that reached a subscriber with no error handler.
pub type ErrorHook = Arc<dyn Fn(SharedError) + Send + Sync>;

/// Hook receiving notifications sent to an already stopped subscriber.
pub type NotificationHook = Arc<dyn Fn(Notification) + Send + Sync>;

/// Kind of notification that arrived after a subscriber stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notification {
    Next,
    Error,
    Complete,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Next => write!(f, "next"),
            Notification::Error => write!(f, "error"),
            Notification::Complete => write!(f, "complete"),
        }
    }
}

/// Global fault-reporting configuration.
///
/// `None` hooks fall back to logging through `tracing`: unhandled errors at
/// `error` level, stopped notifications at `trace` level.
#[derive(Clone, Default)]
pub struct Config {
    /// Called with errors that no subscriber handled.
    pub on_unhandled_error: Option<ErrorHook>,
    /// Called when a notification reaches a stopped subscriber.
    pub on_stopped_notification: Option<NotificationHook>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("on_unhandled_error", &self.on_unhandled_error.is_some())
            .field(
                "on_stopped_notification",
                &self.on_stopped_notification.is_some(),
            )
            .finish()
    }
}

static CONFIG: RwLock<Config> = RwLock::new(Config {
    on_unhandled_error: None,
    on_stopped_notification: None,
});

/// Installs `config` for the whole process, replacing the previous one.
pub fn set(config: Config) {
    *CONFIG.write().unwrap_or_else(PoisonError::into_inner) = config;
}

/// Returns a copy of the current configuration.
#[must_use]
pub fn get() -> Config {
    CONFIG
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Restores the default configuration.
pub fn reset() {
    set(Config::default());
}

pub(crate) fn report_unhandled_error(error: SharedError) {
    // Clone the hook out so it runs without the lock held.
    let hook = get().on_unhandled_error;
    match hook {
        Some(hook) => hook(error),
        None => tracing::error!(%error, "unhandled error reached a subscriber"),
    }
}

pub(crate) fn report_stopped_notification(kind: Notification) {
    let hook = get().on_stopped_notification;
    match hook {
        Some(hook) => hook(kind),
        None => tracing::trace!(notification = %kind, "notification ignored, subscriber is stopped"),
    }
}
