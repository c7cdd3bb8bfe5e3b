use std::fmt;

use thiserror::Error;

use super::BoxError;

/// Failure of a single teardown unit while a `Subscription` was closing.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TeardownError {
    /// A fallible teardown closure returned an error.
    #[error("teardown failed: {0}")]
    Failed(#[source] BoxError),

    /// A teardown closure panicked.
    #[error("teardown panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },

    /// A future teardown was registered outside of a Tokio runtime, so there
    /// was nowhere to spawn it.
    #[error("future teardown registered outside of a Tokio runtime")]
    NoRuntime,
}

/// Aggregate of every teardown failure seen while closing a `Subscription`.
///
/// Closing never stops at the first failing child; all children are torn down
/// and their failures collected here, in teardown order. Failures of nested
/// subscriptions are flattened into the same list.
#[derive(Debug)]
pub struct UnsubscriptionError {
    errors: Vec<TeardownError>,
}

impl UnsubscriptionError {
    pub(crate) fn new(errors: Vec<TeardownError>) -> Self {
        UnsubscriptionError { errors }
    }

    /// Turns collected failures into a result, `Ok` when nothing failed.
    pub(crate) fn check(errors: Vec<TeardownError>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self::new(errors))
        }
    }

    /// Failures in the order their teardown units ran.
    #[must_use]
    pub fn errors(&self) -> &[TeardownError] {
        &self.errors
    }

    #[must_use]
    pub fn into_errors(self) -> Vec<TeardownError> {
        self.errors
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for UnsubscriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error(s) occurred during unsubscription",
            self.errors.len()
        )?;
        for (i, e) in self.errors.iter().enumerate() {
            write!(f, "\n  {}) {}", i + 1, e)?;
        }
        Ok(())
    }
}

impl std::error::Error for UnsubscriptionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .first()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Errors raised when constructing a scheduler.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// `TokioScheduler` was created outside of a Tokio runtime.
    #[error("Tokio scheduler must be created inside a Tokio runtime")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_every_failure() {
        let e = UnsubscriptionError::new(vec![
            TeardownError::Panicked {
                message: "first".to_string(),
            },
            TeardownError::NoRuntime,
        ]);

        assert_eq!(e.len(), 2);
        assert_eq!(
            e.to_string(),
            "2 error(s) occurred during unsubscription\n  1) teardown panicked: first\n  2) future teardown registered outside of a Tokio runtime"
        );
    }

    #[test]
    fn check_empty_is_ok() {
        assert!(UnsubscriptionError::check(Vec::new()).is_ok());
        assert!(UnsubscriptionError::check(vec![TeardownError::NoRuntime]).is_err());
    }
}
