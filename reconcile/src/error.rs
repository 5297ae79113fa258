//! Error classification and failure outcomes for retry and polling

use std::time::Duration;

/// How a collaborator error should be treated by the retry and poll loops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Retryable,
    Fatal,
}

/// Errors that know whether they are worth retrying
pub trait Classify {
    fn classify(&self) -> Classification;

    fn is_retryable(&self) -> bool {
        self.classify() == Classification::Retryable
    }
}

/// Classifier supplied per resource family for error types that cannot
/// classify themselves
pub trait ErrorClassifier<E>: Send + Sync {
    fn classify(&self, error: &E) -> Classification;
}

impl<E, F> ErrorClassifier<E> for F
where
    F: Fn(&E) -> Classification + Send + Sync,
{
    fn classify(&self, error: &E) -> Classification {
        self(error)
    }
}

/// Error returned by a single submit or read attempt
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("retryable error: {0}")]
    Retryable(E),

    #[error("{0}")]
    Fatal(E),
}

impl<E> RetryError<E> {
    /// Classify an error using its own [`Classify`] implementation
    pub fn classified(error: E) -> Self
    where
        E: Classify,
    {
        match error.classify() {
            Classification::Retryable => RetryError::Retryable(error),
            Classification::Fatal => RetryError::Fatal(error),
        }
    }

    /// Classify an error with an external classifier
    pub fn with_classifier<C>(error: E, classifier: &C) -> Self
    where
        C: ErrorClassifier<E> + ?Sized,
    {
        match classifier.classify(&error) {
            Classification::Retryable => RetryError::Retryable(error),
            Classification::Fatal => RetryError::Fatal(error),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, RetryError::Retryable(_))
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::Retryable(e) | RetryError::Fatal(e) => e,
        }
    }
}

/// Terminal outcome of [`crate::retry`]
#[derive(Debug, thiserror::Error)]
pub enum RetryFailure<E> {
    #[error("{0}")]
    Fatal(E),

    #[error("gave up after {attempts} attempts in {timeout:?}: {last}")]
    Timeout {
        attempts: u32,
        timeout: Duration,
        last: E,
    },
}

impl<E> RetryFailure<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RetryFailure::Timeout { .. })
    }

    /// The error of the final attempt
    pub fn into_inner(self) -> E {
        match self {
            RetryFailure::Fatal(e) => e,
            RetryFailure::Timeout { last, .. } => last,
        }
    }
}

/// Terminal outcome of [`crate::wait_for`] other than success
#[derive(Debug, thiserror::Error)]
pub enum WaitError<E> {
    #[error("invalid poll configuration: {0}")]
    InvalidConfig(String),

    #[error("reading state of {resource_id} failed: {error}")]
    Fatal { resource_id: String, error: E },

    #[error("{resource_id} reached failure state {state:?}")]
    Failed { resource_id: String, state: String },

    #[error(
        "timeout after {timeout:?} waiting for {resource_id} to reach {target:?} (last state: {last_state:?})"
    )]
    Timeout {
        resource_id: String,
        target: Vec<String>,
        last_state: Option<String>,
        last_error: Option<String>,
        timeout: Duration,
    },

    #[error("unexpected state {state:?} for {resource_id}, expected one of {expected:?}")]
    UnexpectedState {
        resource_id: String,
        state: String,
        expected: Vec<String>,
    },

    #[error("{resource_id} not found after {checks} consecutive checks")]
    NotFound { resource_id: String, checks: u32 },
}

impl<E> WaitError<E> {
    /// True when the resource was still in a pending state at the deadline,
    /// so callers may choose to keep watching instead of failing
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, WaitError::Fatal { .. })
    }

    pub fn resource_id(&self) -> Option<&str> {
        match self {
            WaitError::InvalidConfig(_) => None,
            WaitError::Fatal { resource_id, .. }
            | WaitError::Failed { resource_id, .. }
            | WaitError::Timeout { resource_id, .. }
            | WaitError::UnexpectedState { resource_id, .. }
            | WaitError::NotFound { resource_id, .. } => Some(resource_id),
        }
    }
}
