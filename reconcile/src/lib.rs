//! reconcile - asynchronous operation reconciliation
//!
//! Helpers for control planes whose mutations return before the work is
//! done: a retry wrapper that separates transient from fatal errors, and a
//! state poller that refreshes a resource until it reaches a terminal state.

pub mod context;
pub mod error;
pub mod poller;
pub mod ratelimit;
pub mod retry;
pub mod state;

pub use context::{ElapsedGuard, OperationContext};
pub use error::{Classification, Classify, ErrorClassifier, RetryError, RetryFailure, WaitError};
pub use poller::wait_for;
pub use ratelimit::{NoopLimiter, RateLimiter, TokenBucketLimiter, DEFAULT_ACTION_LIMIT};
pub use retry::{retry, retry_classified, RetryPolicy};
pub use state::{
    PollConfig, ResourceState, StateClass, READ_RETRY_TIMEOUT, WRITE_RETRY_TIMEOUT,
};
