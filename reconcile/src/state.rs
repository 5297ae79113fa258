//! Observed resource state and the poll configuration that classifies it

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Read retry timeout used by describe calls when the caller does not pick one
pub const READ_RETRY_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// Write retry timeout used by mutating calls when the caller does not pick one
pub const WRITE_RETRY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Stand-in for "never" when a timeout is too large to add to an instant
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// `start + span`, saturating at a far-future instant instead of overflowing
pub(crate) fn instant_after(start: Instant, span: Duration) -> Instant {
    start
        .checked_add(span)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

/// Snapshot of a remote resource taken on one poll tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState<T> {
    pub resource_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<T>,
}

impl<T> ResourceState<T> {
    pub fn new(resource_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            status: status.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: T) -> Self {
        self.detail = Some(detail);
        self
    }

    /// State reported when an absent resource satisfies the wait
    pub fn absent(resource_id: impl Into<String>) -> Self {
        Self::new(resource_id, "")
    }
}

/// Where an observed status falls for a given [`PollConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    Pending,
    Target,
    Failure,
    Unexpected,
}

/// Caller-supplied parameters for one [`crate::wait_for`] call.
///
/// Status vocabularies are plain strings: each resource family brings its
/// own (`"running"`/`"isolated"`, `"0"`/`"1"`/`"2"`, `"RUNNING"`, ...).
/// An empty `pending` set means every status outside `target` and
/// `failure` is still in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    #[serde(default)]
    pub failure: Vec<String>,
    pub interval: Duration,
    pub timeout: Duration,
    #[serde(default)]
    pub delay: Duration,
    #[serde(default = "default_not_found_checks")]
    pub not_found_checks: u32,
    #[serde(default)]
    pub missing_is_target: bool,
    #[serde(default = "default_continuous_target_occurrence")]
    pub continuous_target_occurrence: u32,
}

fn default_not_found_checks() -> u32 {
    20
}

fn default_continuous_target_occurrence() -> u32 {
    1
}

impl PollConfig {
    /// Poll once a second for up to [`READ_RETRY_TIMEOUT`] until the status
    /// is one of `target`
    pub fn new<I, S>(target: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pending: Vec::new(),
            target: target.into_iter().map(Into::into).collect(),
            failure: Vec::new(),
            interval: Duration::from_secs(1),
            timeout: READ_RETRY_TIMEOUT,
            delay: Duration::ZERO,
            not_found_checks: default_not_found_checks(),
            missing_is_target: false,
            continuous_target_occurrence: default_continuous_target_occurrence(),
        }
    }

    pub fn pending<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending = states.into_iter().map(Into::into).collect();
        self
    }

    pub fn failure<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failure = states.into_iter().map(Into::into).collect();
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    pub fn missing_is_target(mut self, missing_is_target: bool) -> Self {
        self.missing_is_target = missing_is_target;
        self
    }

    pub fn continuous_target_occurrence(mut self, occurrences: u32) -> Self {
        self.continuous_target_occurrence = occurrences;
        self
    }

    /// Target wins over failure, failure over pending
    pub fn classify(&self, status: &str) -> StateClass {
        if self.target.iter().any(|s| s == status) {
            StateClass::Target
        } else if self.failure.iter().any(|s| s == status) {
            StateClass::Failure
        } else if self.pending.is_empty() || self.pending.iter().any(|s| s == status) {
            StateClass::Pending
        } else {
            StateClass::Unexpected
        }
    }

    /// States a caller may legitimately observe, used in error reports
    pub fn expected_states(&self) -> Vec<String> {
        self.pending
            .iter()
            .chain(self.target.iter())
            .chain(self.failure.iter())
            .cloned()
            .collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.target.is_empty() && !self.missing_is_target {
            return Err("no target states given".to_string());
        }
        if self.interval.is_zero() {
            return Err("poll interval must be positive".to_string());
        }
        if self.timeout.is_zero() {
            return Err("timeout must be positive".to_string());
        }
        if self.not_found_checks == 0 {
            return Err("not_found_checks must be at least 1".to_string());
        }
        if self.continuous_target_occurrence == 0 {
            return Err("continuous_target_occurrence must be at least 1".to_string());
        }
        if let Some(state) = self
            .target
            .iter()
            .find(|s| self.pending.contains(s) || self.failure.contains(s))
        {
            return Err(format!("state {:?} is both a target and non-target state", state));
        }
        if let Some(state) = self.failure.iter().find(|s| self.pending.contains(s)) {
            return Err(format!("state {:?} is both pending and failure", state));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn instant_after_saturates_on_huge_spans() {
        let now = Instant::now();
        assert_eq!(
            instant_after(now, Duration::from_secs(5)),
            now + Duration::from_secs(5)
        );
        let one_year = Duration::from_secs(365 * 24 * 60 * 60);
        assert!(instant_after(now, Duration::MAX) > now + one_year);
        assert!(instant_after(now, Duration::from_secs(u64::MAX / 2)) > now);
    }

    #[test]
    fn classify_with_explicit_pending_set() {
        let config = PollConfig::new(["SUCCESS"])
            .pending(["INITIAL", "RUNNING"])
            .failure(["FAILED", "KILLED"]);

        assert_eq!(config.classify("SUCCESS"), StateClass::Target);
        assert_eq!(config.classify("RUNNING"), StateClass::Pending);
        assert_eq!(config.classify("KILLED"), StateClass::Failure);
        assert_eq!(config.classify("PAUSED"), StateClass::Unexpected);
    }

    #[test]
    fn empty_pending_set_treats_unknown_states_as_pending() {
        let config = PollConfig::new(["0"]).failure(["1"]);

        assert_eq!(config.classify("0"), StateClass::Target);
        assert_eq!(config.classify("1"), StateClass::Failure);
        assert_eq!(config.classify("2"), StateClass::Pending);
        assert_eq!(config.classify(""), StateClass::Pending);
    }

    #[test]
    fn defaults_match_state_change_conventions() {
        let config = PollConfig::new(["running"]);
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.timeout, READ_RETRY_TIMEOUT);
        assert_eq!(config.not_found_checks, 20);
        assert_eq!(config.continuous_target_occurrence, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_overlapping_vocabularies() {
        let config = PollConfig::new(["running"]).pending(["running", "creating"]);
        assert!(config.validate().unwrap_err().contains("running"));

        let config = PollConfig::new(["ok"]).pending(["busy"]).failure(["busy"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_degenerate_timing() {
        assert!(PollConfig::new(["a"])
            .interval(Duration::ZERO)
            .validate()
            .is_err());
        assert!(PollConfig::new(["a"])
            .timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(PollConfig::new(Vec::<String>::new()).validate().is_err());
        assert!(PollConfig::new(Vec::<String>::new())
            .missing_is_target(true)
            .validate()
            .is_ok());
    }

    #[test]
    fn resource_state_builders() {
        let state: ResourceState<u32> = ResourceState::new("ins-1", "RUNNING");
        assert_eq!(state.status, "RUNNING");
        assert_eq!(state.detail, None);
        assert_eq!(state.clone().with_detail(7).detail, Some(7));
        assert_eq!(ResourceState::<u32>::absent("ins-1").status, "");
    }
}
