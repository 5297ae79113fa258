//! State poller: refresh a resource on a fixed cadence until it settles

use std::fmt::Display;
use std::future::Future;
use tokio::time::{sleep_until, timeout_at, Instant};

use crate::error::{RetryError, WaitError};
use crate::state::{instant_after, PollConfig, ResourceState, StateClass};

/// Poll `refresh` until the observed status is a target state.
///
/// `refresh` performs exactly one read. It returns `Ok(None)` when the
/// resource does not exist, a [`RetryError::Retryable`] for transient read
/// failures (polling continues) and a [`RetryError::Fatal`] to abort.
///
/// Reads are bounded by the deadline and sleeps are clamped to it, so the
/// call returns no later than `config.timeout` after it started.
/// `config.delay` counts against that window.
pub async fn wait_for<T, E, F, Fut>(
    resource_id: &str,
    config: &PollConfig,
    mut refresh: F,
) -> Result<ResourceState<T>, WaitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<ResourceState<T>>, RetryError<E>>>,
    E: Display,
{
    config.validate().map_err(WaitError::InvalidConfig)?;

    let started = Instant::now();
    let deadline = instant_after(started, config.timeout);
    let mut tracker = Tracker::default();

    tracing::debug!(
        "Waiting for {} to reach {:?} (timeout {:?}, interval {:?})",
        resource_id,
        config.target,
        config.timeout,
        config.interval
    );

    if !config.delay.is_zero() {
        sleep_until(std::cmp::min(instant_after(started, config.delay), deadline)).await;
    }

    loop {
        if Instant::now() >= deadline {
            return Err(tracker.deadline_error(resource_id, config));
        }
        tracker.ticks += 1;

        let observed = match timeout_at(deadline, refresh()).await {
            Ok(observed) => observed,
            Err(_) => {
                tracing::warn!("State read for {} did not finish before the deadline", resource_id);
                return Err(tracker.deadline_error(resource_id, config));
            }
        };

        match observed {
            Err(RetryError::Fatal(error)) => {
                tracing::error!("Reading state of {} failed: {}", resource_id, error);
                return Err(WaitError::Fatal {
                    resource_id: resource_id.to_string(),
                    error,
                });
            }
            Err(RetryError::Retryable(error)) => {
                tracing::warn!(
                    "Transient error reading {} (tick {}): {}",
                    resource_id,
                    tracker.ticks,
                    error
                );
                tracker.target_streak = 0;
                tracker.last_error = Some(error.to_string());
            }
            Ok(None) => {
                if config.missing_is_target {
                    tracing::info!("{} is gone after {} ticks", resource_id, tracker.ticks);
                    return Ok(ResourceState::absent(resource_id));
                }
                tracker.target_streak = 0;
                tracker.not_found += 1;
                tracing::debug!(
                    "{} not found ({}/{})",
                    resource_id,
                    tracker.not_found,
                    config.not_found_checks
                );
                if tracker.not_found >= config.not_found_checks {
                    return Err(WaitError::NotFound {
                        resource_id: resource_id.to_string(),
                        checks: tracker.not_found,
                    });
                }
            }
            Ok(Some(state)) => {
                tracker.not_found = 0;
                tracker.last_error = None;
                let class = config.classify(&state.status);
                tracing::debug!(
                    "{} is {:?} ({:?}) on tick {}",
                    resource_id,
                    state.status,
                    class,
                    tracker.ticks
                );

                match class {
                    StateClass::Target => {
                        tracker.target_streak += 1;
                        if tracker.target_streak >= config.continuous_target_occurrence {
                            tracing::info!(
                                "{} reached {:?} after {} ticks in {:?}",
                                resource_id,
                                state.status,
                                tracker.ticks,
                                started.elapsed()
                            );
                            return Ok(state);
                        }
                        tracker.observe(state.status, false);
                    }
                    StateClass::Failure => {
                        tracing::error!("{} entered failure state {:?}", resource_id, state.status);
                        return Err(WaitError::Failed {
                            resource_id: resource_id.to_string(),
                            state: state.status,
                        });
                    }
                    StateClass::Pending => {
                        tracker.target_streak = 0;
                        tracker.observe(state.status, false);
                    }
                    StateClass::Unexpected => {
                        tracing::warn!(
                            "{} is in unexpected state {:?}, expected one of {:?}",
                            resource_id,
                            state.status,
                            config.expected_states()
                        );
                        tracker.target_streak = 0;
                        tracker.observe(state.status, true);
                    }
                }
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(tracker.deadline_error(resource_id, config));
        }
        sleep_until(std::cmp::min(instant_after(now, config.interval), deadline)).await;
    }
}

/// Loop bookkeeping owned by a single wait
#[derive(Default)]
struct Tracker {
    ticks: u32,
    not_found: u32,
    target_streak: u32,
    last_state: Option<String>,
    last_unexpected: bool,
    last_error: Option<String>,
}

impl Tracker {
    fn observe(&mut self, status: String, unexpected: bool) {
        self.last_state = Some(status);
        self.last_unexpected = unexpected;
    }

    fn deadline_error<E>(&mut self, resource_id: &str, config: &PollConfig) -> WaitError<E> {
        match (self.last_unexpected, self.last_state.take()) {
            (true, Some(state)) => WaitError::UnexpectedState {
                resource_id: resource_id.to_string(),
                state,
                expected: config.expected_states(),
            },
            (_, last_state) => {
                tracing::error!(
                    "Timeout after {:?} waiting for {} (last state {:?}, {} ticks)",
                    config.timeout,
                    resource_id,
                    last_state,
                    self.ticks
                );
                WaitError::Timeout {
                    resource_id: resource_id.to_string(),
                    target: config.target.clone(),
                    last_state,
                    last_error: self.last_error.take(),
                    timeout: config.timeout,
                }
            }
        }
    }
}
