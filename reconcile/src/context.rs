//! Operation context carrying the log id of one create/read/update/delete
//!
//! Every log line emitted while reconciling an operation carries the same
//! `log_id`, so interleaved output from concurrent operations can be told
//! apart.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct OperationContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    log_id: String,
    operation: String,
    started: Instant,
}

impl OperationContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self::with_log_id(operation, Uuid::new_v4().to_string())
    }

    pub fn with_log_id(operation: impl Into<String>, log_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                log_id: log_id.into(),
                operation: operation.into(),
                started: Instant::now(),
            }),
        }
    }

    pub fn log_id(&self) -> &str {
        &self.inner.log_id
    }

    pub fn operation(&self) -> &str {
        &self.inner.operation
    }

    pub fn elapsed(&self) -> Duration {
        self.inner.started.elapsed()
    }

    /// Span to instrument the operation's futures with
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "operation",
            log_id = %self.inner.log_id,
            operation = %self.inner.operation
        )
    }

    /// Logs the elapsed time of the operation when dropped
    pub fn elapsed_guard(&self) -> ElapsedGuard {
        ElapsedGuard {
            context: self.clone(),
        }
    }
}

pub struct ElapsedGuard {
    context: OperationContext,
}

impl Drop for ElapsedGuard {
    fn drop(&mut self) {
        tracing::debug!(
            "[ELAPSED] {} {} elapsed {}ms",
            self.context.log_id(),
            self.context.operation(),
            self.context.elapsed().as_millis()
        );
    }
}
