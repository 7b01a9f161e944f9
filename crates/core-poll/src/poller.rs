//! Bounded Poller: repeatedly fetch a remote resource until it settles
//!
//! Remote services in a dataspace accept a request, create a resource in a
//! non-terminal state, and only reveal the outcome when the resource is
//! fetched again later. The poller drives that loop for any such resource:
//!
//! - `fetch` retrieves the current representation of the resource
//! - `classify` maps it to [`Classification::Pending`], `Success` or `Failure`
//! - pending results sleep for the configured interval and retry
//! - the loop ends after `max_attempts` fetches with [`PollOutcome::Timeout`]
//!
//! A failing `fetch` is never retried: it means the request itself is wrong
//! (bad URL, rejected credentials, unparseable body), not that the resource
//! is still in progress.
//!
//! # Example
//!
//! ```
//! use dsx_core_poll::{Classification, PollConfig, PollOutcome, Poller};
//! use std::time::Duration;
//!
//! let poller = Poller::new(PollConfig::new(5, Duration::ZERO).unwrap());
//! let mut states = vec!["REQUESTED", "REQUESTED", "FINALIZED"].into_iter();
//!
//! let outcome = poller.poll(
//!     "negotiation",
//!     || states.next().ok_or("exhausted"),
//!     |state: &&str| match *state {
//!         "FINALIZED" => Classification::Success("agr-1"),
//!         "TERMINATED" => Classification::Failure("terminated".into()),
//!         other => Classification::pending(other),
//!     },
//! );
//!
//! assert_eq!(outcome, PollOutcome::Success("agr-1"));
//! ```

use super::error::PollError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Attempt budget and pacing for one polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    max_attempts: u32,
    interval: Duration,
}

impl PollConfig {
    /// Interval used by every call site unless configured otherwise
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

    /// Attempts used unless configured otherwise (one minute at the default interval)
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

    /// Create a validated configuration.
    ///
    /// `max_attempts` must be at least 1 (a single immediate fetch, no retry).
    pub fn new(max_attempts: u32, interval: Duration) -> Result<Self, PollError> {
        if max_attempts == 0 {
            return Err(PollError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            interval,
        })
    }

    /// Maximum number of fetches performed by one loop
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sleep between two pending observations
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Longest time spent sleeping before the loop gives up
    pub fn sleep_budget(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }

    /// Per-request network timeout to use for fetches inside this loop.
    ///
    /// A single attempt never runs longer than the inter-attempt interval,
    /// so the requested timeout is clamped to it. A zero interval leaves the
    /// requested timeout untouched.
    pub fn fetch_timeout(&self, requested: Duration) -> Duration {
        if self.interval.is_zero() {
            requested
        } else {
            requested.min(self.interval)
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            interval: Self::DEFAULT_INTERVAL,
        }
    }
}

/// Verdict of a classifier on one fetched representation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification<T> {
    /// Not settled yet; carries the observed state label when known
    Pending(Option<String>),
    /// Reached the success terminal
    Success(T),
    /// Reached a failure terminal (e.g. TERMINATED, FAILED, REJECTED)
    Failure(String),
}

impl<T> Classification<T> {
    /// Pending with a known state label
    pub fn pending(state: impl Into<String>) -> Self {
        Classification::Pending(Some(state.into()))
    }
}

/// Result of one polling loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T, E> {
    /// The resource reached its success terminal
    Success(T),

    /// The resource reached a failure terminal
    Failure(String),

    /// Fetching the resource failed; the loop stopped without retrying
    FetchFailed(E),

    /// Attempts ran out while the resource was still pending
    Timeout {
        attempts: u32,
        last_state: Option<String>,
    },
}

impl<T, E> PollOutcome<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Success(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PollOutcome::Timeout { .. })
    }

    /// Transform the success payload, keeping every other outcome as-is
    pub fn map<U, F>(self, f: F) -> PollOutcome<U, E>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            PollOutcome::Success(value) => PollOutcome::Success(f(value)),
            PollOutcome::Failure(reason) => PollOutcome::Failure(reason),
            PollOutcome::FetchFailed(err) => PollOutcome::FetchFailed(err),
            PollOutcome::Timeout {
                attempts,
                last_state,
            } => PollOutcome::Timeout {
                attempts,
                last_state,
            },
        }
    }
}

type SleepFn = Arc<dyn Fn(Duration) + Send + Sync>;

/// Sequential, attempt-bounded poller.
///
/// Cloning is cheap; the sleep function is shared.
#[derive(Clone)]
pub struct Poller {
    config: PollConfig,
    sleep: SleepFn,
}

impl fmt::Debug for Poller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Poller {
    /// Create a poller that blocks the calling thread between attempts
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            sleep: Arc::new(std::thread::sleep),
        }
    }

    /// Replace the sleep function (tests use this to observe pacing)
    pub fn with_sleep<F>(mut self, sleep: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.sleep = Arc::new(sleep);
        self
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Run the loop until a terminal classification, a fetch failure, or
    /// the attempt budget is spent.
    ///
    /// `resource` only labels log events.
    pub fn poll<S, T, E, F, C>(
        &self,
        resource: &str,
        mut fetch: F,
        mut classify: C,
    ) -> PollOutcome<T, E>
    where
        F: FnMut() -> Result<S, E>,
        C: FnMut(&S) -> Classification<T>,
        E: fmt::Display,
    {
        let max_attempts = self.config.max_attempts;
        let mut last_state = None;

        for attempt in 1..=max_attempts {
            debug!(resource, attempt, max_attempts, "Polling");

            let snapshot = match fetch() {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(resource, attempt, error = %err, "Fetch failed, not retrying");
                    return PollOutcome::FetchFailed(err);
                }
            };

            match classify(&snapshot) {
                Classification::Success(value) => {
                    debug!(resource, attempt, "Reached success terminal");
                    return PollOutcome::Success(value);
                }
                Classification::Failure(reason) => {
                    warn!(resource, attempt, %reason, "Reached failure terminal");
                    return PollOutcome::Failure(reason);
                }
                Classification::Pending(state) => {
                    if let Some(ref label) = state {
                        info!(resource, state = %label, "State");
                    }
                    if state.is_some() {
                        last_state = state;
                    }
                }
            }

            if attempt < max_attempts {
                (self.sleep)(self.config.interval);
            }
        }

        warn!(
            resource,
            attempts = max_attempts,
            waited_secs = self.config.sleep_budget().as_secs_f64(),
            "Polling timed out"
        );
        PollOutcome::Timeout {
            attempts: max_attempts,
            last_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant(max_attempts: u32) -> Poller {
        Poller::new(PollConfig::new(max_attempts, Duration::ZERO).unwrap())
    }

    fn classify_str(state: &&'static str) -> Classification<&'static str> {
        match *state {
            "DONE" => Classification::Success("payload"),
            "DEAD" => Classification::Failure("dead".to_string()),
            other => Classification::pending(other),
        }
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = PollConfig::new(0, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, PollError::InvalidConfig(_)));
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn test_default_config() {
        let config = PollConfig::default();
        assert_eq!(config.max_attempts(), 30);
        assert_eq!(config.interval(), Duration::from_secs(2));
        assert_eq!(config.sleep_budget(), Duration::from_secs(58));
    }

    #[test]
    fn test_fetch_timeout_clamped_to_interval() {
        let config = PollConfig::new(10, Duration::from_secs(2)).unwrap();
        assert_eq!(config.fetch_timeout(Duration::from_secs(30)), Duration::from_secs(2));
        assert_eq!(
            config.fetch_timeout(Duration::from_millis(500)),
            Duration::from_millis(500)
        );

        let zero = PollConfig::new(1, Duration::ZERO).unwrap();
        assert_eq!(zero.fetch_timeout(Duration::from_secs(30)), Duration::from_secs(30));
    }

    #[test]
    fn test_single_attempt_no_sleep() {
        let sleeps = Arc::new(AtomicU32::new(0));
        let counter = sleeps.clone();
        let poller = Poller::new(PollConfig::new(1, Duration::from_secs(60)).unwrap())
            .with_sleep(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        let outcome: PollOutcome<&str, String> =
            poller.poll("health", || Ok("BOOTING"), classify_str);

        assert_eq!(
            outcome,
            PollOutcome::Timeout {
                attempts: 1,
                last_state: Some("BOOTING".to_string())
            }
        );
        assert_eq!(sleeps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_success_after_pending() {
        let fetches = Cell::new(0);
        let mut states = vec!["REQ", "REQ", "DONE", "REQ"].into_iter();

        let outcome: PollOutcome<&str, String> = instant(10).poll(
            "negotiation",
            || {
                fetches.set(fetches.get() + 1);
                Ok(states.next().unwrap())
            },
            classify_str,
        );

        assert_eq!(outcome, PollOutcome::Success("payload"));
        assert_eq!(fetches.get(), 3);
    }

    #[test]
    fn test_failure_terminal_stops() {
        let fetches = Cell::new(0);
        let mut states = vec!["REQ", "DEAD", "DONE"].into_iter();

        let outcome: PollOutcome<&str, String> = instant(10).poll(
            "transfer",
            || {
                fetches.set(fetches.get() + 1);
                Ok(states.next().unwrap())
            },
            classify_str,
        );

        assert_eq!(outcome, PollOutcome::Failure("dead".to_string()));
        assert_eq!(fetches.get(), 2);
    }

    #[test]
    fn test_fetch_error_not_retried() {
        let fetches = Cell::new(0);

        let outcome: PollOutcome<&str, String> = instant(10).poll(
            "credential",
            || {
                fetches.set(fetches.get() + 1);
                Err::<&'static str, _>("HTTP 404".to_string())
            },
            classify_str,
        );

        assert_eq!(outcome, PollOutcome::FetchFailed("HTTP 404".to_string()));
        assert_eq!(fetches.get(), 1);
    }

    #[test]
    fn test_sleeps_only_between_attempts() {
        let sleeps = Arc::new(AtomicU32::new(0));
        let counter = sleeps.clone();
        let poller = Poller::new(PollConfig::new(4, Duration::from_millis(250)).unwrap())
            .with_sleep(move |d| {
                assert_eq!(d, Duration::from_millis(250));
                counter.fetch_add(1, Ordering::SeqCst);
            });

        let outcome: PollOutcome<&str, String> =
            poller.poll("transfer", || Ok("STARTING"), classify_str);

        assert!(outcome.is_timeout());
        assert_eq!(sleeps.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_timeout_keeps_last_known_state() {
        let mut states = vec!["A", "B"].into_iter();
        let outcome: PollOutcome<&str, String> = instant(3).poll(
            "negotiation",
            || Ok(states.next().unwrap_or("UNLABELLED")),
            |state: &&str| match *state {
                "UNLABELLED" => Classification::Pending(None),
                other => Classification::pending(other),
            },
        );

        assert_eq!(
            outcome,
            PollOutcome::Timeout {
                attempts: 3,
                last_state: Some("B".to_string())
            }
        );
    }

    #[test]
    fn test_map_preserves_non_success() {
        let ok: PollOutcome<u32, String> = PollOutcome::Success(2);
        assert_eq!(ok.map(|v| v * 10), PollOutcome::Success(20));

        let timeout: PollOutcome<u32, String> = PollOutcome::Timeout {
            attempts: 5,
            last_state: None,
        };
        assert!(timeout.map(|v| v + 1).is_timeout());
    }

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Pending,
        Success,
        Failure,
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            6 => Just(Step::Pending),
            1 => Just(Step::Success),
            1 => Just(Step::Failure),
        ]
    }

    proptest! {
        #[test]
        fn prop_stops_at_first_terminal(
            steps in proptest::collection::vec(step(), 1..40),
            max_attempts in 1u32..50,
        ) {
            let fetches = Cell::new(0usize);
            let outcome: PollOutcome<usize, String> = instant(max_attempts).poll(
                "prop",
                || {
                    let i = fetches.get();
                    fetches.set(i + 1);
                    Ok(steps.get(i).copied().unwrap_or(Step::Pending))
                },
                |s: &Step| match s {
                    Step::Pending => Classification::Pending(None),
                    Step::Success => Classification::Success(fetches.get()),
                    Step::Failure => Classification::Failure("x".to_string()),
                },
            );

            let first_terminal = steps
                .iter()
                .position(|s| !matches!(s, Step::Pending))
                .map(|i| i + 1);

            match first_terminal {
                Some(n) if n as u32 <= max_attempts => {
                    prop_assert_eq!(fetches.get(), n);
                    prop_assert!(!outcome.is_timeout());
                    if let PollOutcome::Success(at) = outcome {
                        prop_assert_eq!(at, n);
                    }
                }
                _ => {
                    prop_assert_eq!(fetches.get(), max_attempts as usize);
                    let is_timeout = matches!(
                        outcome,
                        PollOutcome::Timeout { attempts, .. } if attempts == max_attempts
                    );
                    prop_assert!(is_timeout);
                }
            }
        }
    }
}
