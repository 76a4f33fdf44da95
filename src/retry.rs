//! Retry policy for logical operations.
//!
//! A [`RetryBudget`] counts failures inside a sliding time window and [`execute`] uses it to
//! decide whether a failed operation may be attempted again, optionally running a recovery
//! step (usually a reconnect) in between. The budget is the only thing that ends a retry
//! loop: there is no separate attempt cap.
use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use log::debug;

use crate::{
    protocol::{ErrorKind, WireError},
    utilities::lock,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub window: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
        }
    }
}

/// Policy for the request/response half of a connection.
pub const COMMAND_RETRY_POLICY: RetryPolicy = RetryPolicy::new(3, Duration::from_secs(5));

/// Policy for the push-stream half of a connection.
pub const WATCH_RETRY_POLICY: RetryPolicy = RetryPolicy::new(5, Duration::from_secs(5));

#[derive(Debug)]
struct BudgetState {
    failures: u32,
    last_failure: Instant,
}

impl BudgetState {
    fn reset_if_window_passed(&mut self, window: Duration) {
        if self.last_failure.elapsed() > window {
            self.failures = 0;
        }
    }
}

/// Sliding-window failure counter.
#[derive(Debug)]
pub struct RetryBudget {
    policy: RetryPolicy,
    state: Mutex<BudgetState>,
}

impl RetryBudget {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(BudgetState {
                failures: 0,
                last_failure: Instant::now(),
            }),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Whether another attempt is permitted.
    pub fn allow(&self) -> bool {
        let mut state = lock(&self.state);
        state.reset_if_window_passed(self.policy.window);
        state.failures < self.policy.max_attempts
    }

    pub fn record_failure(&self) {
        let mut state = lock(&self.state);
        state.reset_if_window_passed(self.policy.window);
        state.failures = state.failures.saturating_add(1);
        state.last_failure = Instant::now();
    }

    pub fn record_success(&self) {
        let mut state = lock(&self.state);
        state.failures = 0;
        state.last_failure = Instant::now();
    }

    /// Failures counted in the current window.
    pub fn failures(&self) -> u32 {
        let mut state = lock(&self.state);
        state.reset_if_window_passed(self.policy.window);
        state.failures
    }
}

/// Run `operation` until it succeeds, its error is not in `retry_on`, or `budget` denies
/// another attempt. `before_retry` runs ahead of every retry; if it fails, its error is
/// returned straight away.
pub fn execute<T, Op, Recover>(
    budget: &RetryBudget,
    retry_on: &[ErrorKind],
    mut operation: Op,
    mut before_retry: Recover,
) -> Result<T, WireError>
where
    Op: FnMut() -> Result<T, WireError>,
    Recover: FnMut() -> Result<(), WireError>,
{
    loop {
        let err = match operation() {
            Ok(value) => {
                budget.record_success();
                return Ok(value);
            }
            Err(err) => err,
        };

        budget.record_failure();

        if !retry_on.contains(&err.kind()) || !budget.allow() {
            return Err(err);
        }

        debug!("retrying after failure: {err}");
        before_retry()?;
    }
}

/// Recovery step for operations with nothing to restore between attempts.
pub fn no_recovery() -> Result<(), WireError> {
    Ok(())
}
